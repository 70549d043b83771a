// src/canonical/reference.rs
//! Read-only reference table of canonical entities (countries). Supplies the
//! full names used by the constraint rules and the canonical selector.
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    /// Canonical name returned to callers.
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    /// Codes and acronyms, e.g. alpha-2 and alpha-3.
    #[serde(default)]
    pub short_forms: Vec<String>,
}

impl ReferenceEntity {
    /// The canonical name followed by the official name, if different.
    pub fn full_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(
            self.official_name
                .as_deref()
                .filter(|official| *official != self.name),
        )
    }

    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        self.full_names()
            .chain(self.short_forms.iter().map(String::as_str))
    }
}

/// Reference entities indexed by every name they are known under.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    entities: Vec<ReferenceEntity>,
    by_full_name: HashMap<String, usize>,
    by_short_form: HashMap<String, usize>,
}

impl ReferenceData {
    pub fn new(entities: Vec<ReferenceEntity>) -> Self {
        let mut by_full_name = HashMap::new();
        let mut by_short_form = HashMap::new();
        for (idx, entity) in entities.iter().enumerate() {
            for name in entity.full_names() {
                if let Some(previous) = by_full_name.insert(name.to_string(), idx) {
                    if previous != idx {
                        warn!(
                            "Reference name '{}' is shared by '{}' and '{}'",
                            name, entities[previous].name, entity.name
                        );
                    }
                }
            }
            for short in &entity.short_forms {
                by_short_form.entry(short.clone()).or_insert(idx);
            }
        }
        Self {
            entities,
            by_full_name,
            by_short_form,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entities: Vec<ReferenceEntity> =
            serde_json::from_str(raw).context("Failed to parse reference data")?;
        Ok(Self::new(entities))
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read reference data {}", path.display()))?;
        let data = Self::from_json_str(&raw)
            .with_context(|| format!("Invalid reference data in {}", path.display()))?;
        info!(
            "Loaded {} reference entities from {}",
            data.len(),
            path.display()
        );
        Ok(data)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[ReferenceEntity] {
        &self.entities
    }

    /// Index of the entity whose canonical or official name is `name`.
    pub fn entity_for_full_name(&self, name: &str) -> Option<usize> {
        self.by_full_name.get(name).copied()
    }

    pub fn entity_for_short_form(&self, name: &str) -> Option<usize> {
        self.by_short_form.get(name).copied()
    }

    /// Index of the entity known under `name` in any form. Full names win
    /// over short forms.
    pub fn entity_for_known_name(&self, name: &str) -> Option<usize> {
        self.entity_for_full_name(name)
            .or_else(|| self.entity_for_short_form(name))
    }

    pub fn is_full_name(&self, name: &str) -> bool {
        self.by_full_name.contains_key(name)
    }

    pub fn canonical_name(&self, idx: usize) -> Option<&str> {
        self.entities.get(idx).map(|e| e.name.as_str())
    }

    /// Canonical names in table order. Seeds an empty training corpus.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"name": "United States", "official_name": "United States of America", "short_forms": ["US", "USA"]},
        {"name": "Brazil", "official_name": "Federative Republic of Brazil", "short_forms": ["BR", "BRA"]},
        {"name": "Thailand", "short_forms": ["TH", "THA"]}
    ]"#;

    #[test]
    fn test_lookup_by_every_name_form() {
        let data = ReferenceData::from_json_str(SAMPLE).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.entity_for_full_name("United States of America"), Some(0));
        assert_eq!(data.entity_for_full_name("US"), None);
        assert_eq!(data.entity_for_short_form("USA"), Some(0));
        assert_eq!(data.entity_for_known_name("THA"), Some(2));
        assert_eq!(data.canonical_name(1), Some("Brazil"));
        assert!(data.is_full_name("Thailand"));
        assert!(!data.is_full_name("Thailandd"));
    }

    #[test]
    fn test_full_names_skip_missing_or_duplicate_official_name() {
        let entity = ReferenceEntity {
            name: "Chad".to_string(),
            official_name: Some("Chad".to_string()),
            short_forms: vec!["TD".to_string()],
        };
        assert_eq!(entity.full_names().collect::<Vec<_>>(), vec!["Chad"]);
        assert_eq!(entity.known_names().collect::<Vec<_>>(), vec!["Chad", "TD"]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(ReferenceData::from_json_str("{").is_err());
    }
}
