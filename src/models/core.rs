// src/models/core.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stored row. Field names map to JSON values, so every collection can be
/// served by the same keyed-table interface.
pub type Record = Map<String, Value>;

/// Field holding the opaque identifier assigned by the idempotent upsert.
pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// The named collections the engine touches. Nothing else in the warehouse is
/// reachable through the storage interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Locations,
    Organisations,
    OrganisationClusters,
    Persons,
    Trials,
    TrialsPersons,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Locations,
        Collection::Organisations,
        Collection::OrganisationClusters,
        Collection::Persons,
        Collection::Trials,
        Collection::TrialsPersons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Locations => "locations",
            Collection::Organisations => "organisations",
            Collection::OrganisationClusters => "organisation_clusters",
            Collection::Persons => "persons",
            Collection::Trials => "trials",
            Collection::TrialsPersons => "trials_persons",
        }
    }

    /// Fields the storage layer keeps unique. The idempotent upsert relies on
    /// this constraint to stop concurrent writers from racing into duplicates.
    pub fn natural_key(&self) -> &'static [&'static str] {
        match self {
            Collection::Locations
            | Collection::Organisations
            | Collection::Persons
            | Collection::Trials => &["slug"],
            Collection::TrialsPersons => &["trial_id", "person_id"],
            Collection::OrganisationClusters => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Converts a `json!({...})` literal into a record. Non-object values yield an
/// empty record.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Reads a string field from a record.
pub fn get_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}
