// src/writers/trial.rs
use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::upsert::upsert;
use crate::models::core::{into_record, Collection};
use crate::storage::Warehouse;
use crate::utils::helpers::{
    clean_identifiers, find_list_of_identifiers, get_optimal_title, safe_prepend, slugify_string,
    validate_remote_url,
};

/// Registries in the order their identifiers are preferred as the trial key.
const REGISTRY_PRIORITY: [&str; 8] = [
    "nct", "euctr", "isrctn", "actrn", "jprn", "chictr", "drks", "who",
];

/// Registries whose sources sometimes drop the identifier prefix.
const REGISTRY_PREFIXES: [(&str, &str); 2] = [("euctr", "EUCTR"), ("isrctn", "ISRCTN")];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialInput {
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    pub public_title: Option<String>,
    pub brief_summary: Option<String>,
    pub scientific_title: Option<String>,
    pub source_url: Option<String>,
}

/// Preferred identifier among cleaned `identifiers`, as (registry, id).
pub fn primary_identifier(identifiers: &BTreeMap<String, String>) -> Option<(&str, &str)> {
    REGISTRY_PRIORITY
        .iter()
        .find_map(|registry| {
            identifiers
                .get_key_value(*registry)
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
        .or_else(|| {
            identifiers
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
}

fn with_registry_prefixes(identifiers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    identifiers
        .iter()
        .map(|(registry, id)| {
            let id = REGISTRY_PREFIXES
                .iter()
                .find(|(r, _)| *r == registry.as_str())
                .and_then(|(_, prefix)| safe_prepend(prefix, Some(id.trim())))
                .unwrap_or_else(|| id.clone());
            (registry.clone(), id)
        })
        .collect()
}

/// Writes a trial keyed on its preferred registry identifier. Identifiers
/// mentioned in the summary are added when their registry is not already
/// present. Trials without any valid identifier are skipped.
pub async fn write_trial(
    warehouse: &dyn Warehouse,
    trial: &TrialInput,
    source_id: &str,
) -> Result<Option<String>> {
    let mut identifiers = clean_identifiers(&with_registry_prefixes(&trial.identifiers));
    if let Some(summary) = trial.brief_summary.as_deref() {
        for (registry, id) in find_list_of_identifiers(summary) {
            identifiers.entry(registry).or_insert(id);
        }
    }
    let Some((registry, primary)) = primary_identifier(&identifiers) else {
        warn!("Trial from {} has no valid identifier, skipping", source_id);
        return Ok(None);
    };
    let slug = slugify_string(primary);
    debug!("Trial key {}:{}", registry, primary);

    let title = get_optimal_title(&[
        trial.public_title.as_deref(),
        trial.scientific_title.as_deref(),
    ]);
    let source_url = trial
        .source_url
        .as_deref()
        .filter(|url| validate_remote_url(Some(*url)));

    let record = into_record(json!({
        "slug": slug,
        "identifiers": identifiers,
        "public_title": title,
        "scientific_title": trial.scientific_title,
        "source_url": source_url,
        "source_id": source_id,
    }));
    let (id, created) = upsert(warehouse, Collection::Trials, &["slug"], record).await?;
    debug!(
        "Trial - {}: {}",
        if created { "created" } else { "updated" },
        title
    );
    Ok(Some(id))
}
