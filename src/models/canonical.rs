// src/models/canonical.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::core::{into_record, Record};

/// One canonical form and every variant known to denote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMapping {
    pub canonical: String,
    pub variations: Vec<String>,
}

impl CanonicalMapping {
    pub fn new(canonical: impl Into<String>, variations: Vec<String>) -> Self {
        Self {
            canonical: canonical.into(),
            variations,
        }
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.variations.iter().any(|v| v == variant)
    }

    pub fn to_record(&self) -> Record {
        into_record(json!({
            "canonical": self.canonical,
            "variations": self.variations,
        }))
    }

    pub fn from_record(record: &Record) -> Option<Self> {
        let canonical = record.get("canonical")?.as_str()?.to_string();
        let variations = record
            .get("variations")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            canonical,
            variations,
        })
    }
}
