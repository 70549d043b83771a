// src/writers/location.rs
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::upsert::upsert;
use crate::canonical::LocationCanonicalizer;
use crate::models::core::{into_record, Collection};
use crate::storage::Warehouse;
use crate::utils::helpers::{clean_string, slugify_string};

/// Location types whose names are canonicalized against the country table.
const CANONICAL_TYPES: [&str; 1] = ["country"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationInput {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub location_type: Option<String>,
}

/// Writes a location and returns its id, or `None` when the cleaned name is
/// too short to be a location.
pub async fn write_location(
    warehouse: &dyn Warehouse,
    canonicalizer: &LocationCanonicalizer,
    location: &LocationInput,
    source_id: &str,
) -> Result<Option<String>> {
    let mut name = clean_string(location.name.as_deref());
    if name.chars().count() <= 1 {
        return Ok(None);
    }

    let is_canonical_type = location
        .location_type
        .as_deref()
        .map_or(false, |t| CANONICAL_TYPES.contains(&t));
    if is_canonical_type {
        if let Some(canonical) = canonicalizer.canonical_location_name(Some(&name)).await? {
            name = canonical;
        }
    }

    let record = into_record(json!({
        "slug": slugify_string(&name),
        "name": name,
        "type": location.location_type.clone().map_or(Value::Null, Value::String),
        "source_id": source_id,
    }));
    let (id, created) = upsert(warehouse, Collection::Locations, &["slug"], record).await?;
    debug!(
        "Location - {}: {}",
        if created { "created" } else { "updated" },
        name
    );
    Ok(Some(id))
}
