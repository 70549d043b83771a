// src/writers/person.rs
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::upsert::upsert;
use crate::models::core::{into_record, Collection};
use crate::storage::Warehouse;
use crate::utils::helpers::{clean_string, slugify_array, slugify_string};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(rename = "type", default)]
    pub person_type: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Role in the related trial, e.g. "principal_investigator".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub context: Value,
}

fn stored_facts(row: Option<&crate::models::Record>) -> Vec<String> {
    row.and_then(|r| r.get("facts"))
        .and_then(Value::as_array)
        .map(|facts| {
            facts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Writes a person and, when `trial_id` is given, the person's relationship
/// to that trial. Facts (trial id and phone numbers) accumulate across writes.
pub async fn write_person(
    warehouse: &dyn Warehouse,
    person: &PersonInput,
    source_id: &str,
    trial_id: Option<&str>,
) -> Result<Option<String>> {
    let name = clean_string(person.name.as_deref());
    if name.chars().count() <= 1 {
        return Ok(None);
    }
    let slug = slugify_string(&name);

    let existing = warehouse
        .find_one(Collection::Persons, &into_record(json!({ "slug": slug })))
        .await?;
    let mut facts = stored_facts(existing.as_ref());
    facts.extend(trial_id.map(str::to_string));
    facts.extend(person.phones.iter().cloned());
    let facts = slugify_array(&facts);

    let record = into_record(json!({
        "slug": slug,
        "name": name,
        "type": person.person_type,
        "data": person.data,
        "facts": facts,
        "source_id": source_id,
    }));
    let (person_id, created) = upsert(warehouse, Collection::Persons, &["slug"], record).await?;

    if let Some(trial_id) = trial_id {
        let relationship = into_record(json!({
            "trial_id": trial_id,
            "person_id": person_id,
            "role": person.role,
            "context": person.context,
        }));
        upsert(
            warehouse,
            Collection::TrialsPersons,
            &["trial_id", "person_id"],
            relationship,
        )
        .await?;
    }

    debug!(
        "Person - {}: {}",
        if created { "created" } else { "updated" },
        name
    );
    Ok(Some(person_id))
}
