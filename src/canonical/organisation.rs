// src/canonical/organisation.rs
use anyhow::{Context, Result};
use log::debug;
use serde_json::json;

use crate::models::core::{into_record, Collection};
use crate::models::CanonicalMapping;
use crate::storage::Warehouse;

/// Canonical organisation name from the precomputed clusters. Names that no
/// cluster contains are their own canonical form; there is no retraining.
pub async fn canonical_organisation_name(
    warehouse: &dyn Warehouse,
    name: &str,
) -> Result<String> {
    let filter = into_record(json!({ "variations": [name] }));
    let row = warehouse
        .find_one(Collection::OrganisationClusters, &filter)
        .await
        .with_context(|| format!("Failed to look up organisation cluster for '{}'", name))?;

    match row.as_ref().and_then(CanonicalMapping::from_record) {
        Some(mapping) => {
            debug!("[ORG_CLUSTERS] '{}' -> '{}'", name, mapping.canonical);
            Ok(mapping.canonical)
        }
        None => Ok(name.to_string()),
    }
}
