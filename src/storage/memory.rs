// src/storage/memory.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{key_filter, matches_filter, Warehouse, WriteOp};
use crate::models::core::{Collection, Record};

type Tables = HashMap<Collection, Vec<Record>>;

/// In-process warehouse with the same filter semantics as the PostgreSQL one.
/// Rows keep insertion order, which gives `find` a stable paging order.
pub struct MemoryWarehouse {
    tables: Mutex<Tables>,
    enforce_natural_keys: bool,
}

impl MemoryWarehouse {
    /// Store without uniqueness constraints.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            enforce_natural_keys: false,
        }
    }

    /// Store that rejects inserts duplicating [`Collection::natural_key`],
    /// mirroring the unique indexes created by `PostgresWarehouse::ensure_schema`.
    pub fn with_natural_keys() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            enforce_natural_keys: true,
        }
    }

    /// Snapshot of every row in a collection.
    pub async fn rows(&self, collection: Collection) -> Vec<Record> {
        let tables = self.tables.lock().await;
        tables.get(&collection).cloned().unwrap_or_default()
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_insert(
    tables: &mut Tables,
    collection: Collection,
    record: Record,
    enforce_natural_keys: bool,
) -> Result<()> {
    let rows = tables.entry(collection).or_default();
    let natural_key = collection.natural_key();
    if enforce_natural_keys && !natural_key.is_empty() {
        if let Ok(filter) = key_filter(&record, natural_key) {
            if rows.iter().any(|row| matches_filter(row, &filter)) {
                bail!(
                    "duplicate key value violates unique constraint on {} ({})",
                    collection,
                    natural_key.join(", ")
                );
            }
        }
    }
    rows.push(record);
    Ok(())
}

fn apply_update(
    tables: &mut Tables,
    collection: Collection,
    record: &Record,
    key_fields: &[String],
) -> Result<u64> {
    let filter = key_filter(record, key_fields)?;
    let mut touched = 0;
    if let Some(rows) = tables.get_mut(&collection) {
        for row in rows.iter_mut().filter(|row| matches_filter(row, &filter)) {
            for (field, value) in record {
                row.insert(field.clone(), value.clone());
            }
            touched += 1;
        }
    }
    Ok(touched)
}

fn apply_delete(tables: &mut Tables, collection: Collection, filter: &Record) -> u64 {
    match tables.get_mut(&collection) {
        Some(rows) => {
            let before = rows.len();
            rows.retain(|row| !matches_filter(row, filter));
            (before - rows.len()) as u64
        }
        None => 0,
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn find_one(&self, collection: Collection, filter: &Record) -> Result<Option<Record>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&collection)
            .and_then(|rows| rows.iter().find(|row| matches_filter(row, filter)))
            .cloned())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Record,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, filter))
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection, filter: &Record) -> Result<usize> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|row| matches_filter(row, filter)).count())
            .unwrap_or(0))
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<()> {
        let mut tables = self.tables.lock().await;
        apply_insert(&mut tables, collection, record, self.enforce_natural_keys)
    }

    async fn update(
        &self,
        collection: Collection,
        record: Record,
        key_fields: &[String],
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        apply_update(&mut tables, collection, &record, key_fields)
    }

    async fn delete(&self, collection: Collection, filter: &Record) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(apply_delete(&mut tables, collection, filter))
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        // Work on a copy so a failing operation leaves the committed state intact.
        let mut staged = tables.clone();
        let op_count = ops.len();
        for op in ops {
            match op {
                WriteOp::Insert { collection, record } => {
                    apply_insert(&mut staged, collection, record, self.enforce_natural_keys)?;
                }
                WriteOp::Update {
                    collection,
                    record,
                    key_fields,
                } => {
                    apply_update(&mut staged, collection, &record, &key_fields)?;
                }
                WriteOp::Delete { collection, filter } => {
                    apply_delete(&mut staged, collection, &filter);
                }
            }
        }
        *tables = staged;
        debug!("Committed in-memory transaction with {} operations", op_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::into_record;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_find_and_page() {
        let store = MemoryWarehouse::new();
        for i in 0..5 {
            store
                .insert(Collection::Locations, into_record(json!({"slug": format!("l{}", i)})))
                .await
                .unwrap();
        }
        let all = Record::new();
        assert_eq!(store.count(Collection::Locations, &all).await.unwrap(), 5);
        let page = store.find(Collection::Locations, &all, 3, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["slug"], "l3");

        let rows = crate::storage::iter_rows(&store, Collection::Locations, &all, 2)
            .await
            .unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn test_update_merges_fields_on_key_match() {
        let store = MemoryWarehouse::new();
        store
            .insert(
                Collection::Locations,
                into_record(json!({"id": "a", "slug": "boston", "name": "boston"})),
            )
            .await
            .unwrap();
        let touched = store
            .update(
                Collection::Locations,
                into_record(json!({"slug": "boston", "name": "Boston"})),
                &["slug".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(touched, 1);
        let row = store
            .find_one(Collection::Locations, &into_record(json!({"slug": "boston"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["name"], "Boston");
        assert_eq!(row["id"], "a");
    }

    #[tokio::test]
    async fn test_natural_key_constraint() {
        let store = MemoryWarehouse::with_natural_keys();
        let record = into_record(json!({"slug": "boston"}));
        store.insert(Collection::Locations, record.clone()).await.unwrap();
        assert!(store.insert(Collection::Locations, record).await.is_err());
        assert_eq!(store.rows(Collection::Locations).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_state_untouched() {
        let store = MemoryWarehouse::with_natural_keys();
        store
            .insert(Collection::Organisations, into_record(json!({"slug": "acme"})))
            .await
            .unwrap();
        let result = store
            .transaction(vec![
                WriteOp::Delete {
                    collection: Collection::OrganisationClusters,
                    filter: Record::new(),
                },
                WriteOp::Insert {
                    collection: Collection::Organisations,
                    record: into_record(json!({"slug": "acme"})),
                },
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.rows(Collection::Organisations).await.len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_replaces_collection() {
        let store = MemoryWarehouse::new();
        store
            .insert(
                Collection::OrganisationClusters,
                into_record(json!({"canonical": "old", "variations": ["old"]})),
            )
            .await
            .unwrap();
        store
            .transaction(vec![
                WriteOp::Delete {
                    collection: Collection::OrganisationClusters,
                    filter: Record::new(),
                },
                WriteOp::Insert {
                    collection: Collection::OrganisationClusters,
                    record: into_record(json!({"canonical": "new", "variations": ["new", "nu"]})),
                },
            ])
            .await
            .unwrap();
        let rows = store.rows(Collection::OrganisationClusters).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["canonical"], "new");
    }
}
