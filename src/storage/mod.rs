// src/storage/mod.rs
//! Keyed-table storage collaborator.
//!
//! Filters use containment semantics, the same as PostgreSQL's `jsonb @>`:
//! a scalar filter value must equal the stored value, an array filter value
//! must be contained in the stored array, and an empty filter matches every
//! row. This lets `organisation_clusters` be read by variant with the same
//! keyed read used for slugs.
//!
//! Precondition for callers of [`crate::writers::upsert::upsert`]: the
//! implementation must serialize the find-then-write pair per natural key,
//! either through a unique constraint on [`Collection::natural_key`] or a
//! locking read. The engine performs no cross-process mutual exclusion itself.
pub mod memory;
pub mod postgres;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::core::{Collection, Record};

pub use memory::MemoryWarehouse;
pub use postgres::PostgresWarehouse;

/// A write applied inside [`Warehouse::transaction`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert {
        collection: Collection,
        record: Record,
    },
    Update {
        collection: Collection,
        record: Record,
        key_fields: Vec<String>,
    },
    Delete {
        collection: Collection,
        filter: Record,
    },
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn find_one(&self, collection: Collection, filter: &Record) -> Result<Option<Record>>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Record,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>>;

    async fn count(&self, collection: Collection, filter: &Record) -> Result<usize>;

    async fn insert(&self, collection: Collection, record: Record) -> Result<()>;

    /// Merges `record` into every row whose `key_fields` equal the record's
    /// values for those fields. Returns the number of rows touched.
    async fn update(
        &self,
        collection: Collection,
        record: Record,
        key_fields: &[String],
    ) -> Result<u64>;

    async fn delete(&self, collection: Collection, filter: &Record) -> Result<u64>;

    /// Applies all operations between one begin and one commit. Either every
    /// operation is visible afterwards or none is.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()>;
}

/// Builds the match predicate for `key_fields` out of `record`.
pub fn key_filter<S: AsRef<str>>(record: &Record, key_fields: &[S]) -> Result<Record> {
    if key_fields.is_empty() {
        bail!("Upsert requires at least one key field");
    }
    let mut filter = Record::new();
    for field in key_fields {
        let field = field.as_ref();
        match record.get(field) {
            Some(value) if !value.is_null() => {
                filter.insert(field.to_string(), value.clone());
            }
            _ => bail!("Record is missing key field '{}'", field),
        }
    }
    Ok(filter)
}

/// Containment test shared by the in-memory store and its tests.
pub fn matches_filter(record: &Record, filter: &Record) -> bool {
    filter.iter().all(|(field, expected)| match record.get(field) {
        Some(actual) => contains_value(actual, expected),
        None => false,
    })
}

fn contains_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(items), Value::Array(wanted)) => wanted
            .iter()
            .all(|w| items.iter().any(|item| contains_value(item, w))),
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            expected_map.iter().all(|(k, v)| match actual_map.get(k) {
                Some(a) => contains_value(a, v),
                None => false,
            })
        }
        _ => actual == expected,
    }
}

/// Reads every row matching `filter`, `bufsize` rows per query.
pub async fn iter_rows(
    warehouse: &dyn Warehouse,
    collection: Collection,
    filter: &Record,
    bufsize: usize,
) -> Result<Vec<Record>> {
    let bufsize = bufsize.max(1);
    let total = warehouse.count(collection, filter).await?;
    let mut rows = Vec::with_capacity(total);
    let mut offset = 0;
    while offset < total {
        let page = warehouse.find(collection, filter, offset, bufsize).await?;
        if page.is_empty() {
            break;
        }
        offset += page.len();
        rows.extend(page);
    }
    Ok(rows)
}
