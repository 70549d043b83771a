// src/writers/upsert.rs
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::models::core::{get_str, Collection, Record, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::storage::{key_filter, Warehouse};

/// Inserts `record` or updates the row matching it on `key_fields`.
///
/// Returns the row id and whether a new row was created. A new row gets a
/// fresh id and `created_at`; an existing row keeps both. If the insert loses
/// a race against another writer of the same key (the storage rejects the
/// duplicate), the winner's row is updated instead.
pub async fn upsert(
    warehouse: &dyn Warehouse,
    collection: Collection,
    key_fields: &[&str],
    mut record: Record,
) -> Result<(String, bool)> {
    let filter = key_filter(&record, key_fields)?;
    let now = Value::String(Utc::now().to_rfc3339());
    record.insert(UPDATED_AT_FIELD.to_string(), now.clone());

    let existing = warehouse
        .find_one(collection, &filter)
        .await
        .with_context(|| format!("Failed to check existing row in {}", collection))?;

    if let Some(existing) = existing {
        let id = update_existing(warehouse, collection, key_fields, &existing, record).await?;
        return Ok((id, false));
    }

    let id = Uuid::new_v4().simple().to_string();
    let mut new_row = record.clone();
    new_row.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    new_row.insert(CREATED_AT_FIELD.to_string(), now);

    match warehouse.insert(collection, new_row).await {
        Ok(()) => {
            debug!("[{}] Inserted new row {}", collection, id);
            Ok((id, true))
        }
        Err(insert_err) => {
            let winner = warehouse
                .find_one(collection, &filter)
                .await
                .with_context(|| format!("Failed to re-read {} after insert conflict", collection))?;
            match winner {
                Some(existing) => {
                    warn!(
                        "[{}] Concurrent insert for the same key, updating existing row ({})",
                        collection, insert_err
                    );
                    let id =
                        update_existing(warehouse, collection, key_fields, &existing, record).await?;
                    Ok((id, false))
                }
                None => Err(insert_err).with_context(|| format!("Failed to insert into {}", collection)),
            }
        }
    }
}

async fn update_existing(
    warehouse: &dyn Warehouse,
    collection: Collection,
    key_fields: &[&str],
    existing: &Record,
    mut record: Record,
) -> Result<String> {
    let id = match get_str(existing, ID_FIELD) {
        Some(id) => id.to_string(),
        None => {
            let id = Uuid::new_v4().simple().to_string();
            warn!("[{}] Existing row has no id, assigning {}", collection, id);
            id
        }
    };
    record.remove(CREATED_AT_FIELD);
    record.insert(ID_FIELD.to_string(), Value::String(id.clone()));

    let key_fields: Vec<String> = key_fields.iter().map(|f| f.to_string()).collect();
    warehouse
        .update(collection, record, &key_fields)
        .await
        .with_context(|| format!("Failed to update row {} in {}", id, collection))?;
    debug!("[{}] Updated existing row {}", collection, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::into_record;
    use crate::storage::MemoryWarehouse;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let warehouse = MemoryWarehouse::with_natural_keys();
        let record = into_record(json!({"slug": "boston", "name": "Boston"}));
        let (first, created) = upsert(&warehouse, Collection::Locations, &["slug"], record.clone())
            .await
            .unwrap();
        assert!(created);
        let (second, created) = upsert(&warehouse, Collection::Locations, &["slug"], record)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);

        let rows = warehouse.rows(Collection::Locations).await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains_key(CREATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_created_at() {
        let warehouse = MemoryWarehouse::new();
        warehouse
            .insert(
                Collection::Trials,
                into_record(json!({"id": "t-1", "slug": "nct00000001", "created_at": "2016-01-01T00:00:00+00:00"})),
            )
            .await
            .unwrap();
        let (id, created) = upsert(
            &warehouse,
            Collection::Trials,
            &["slug"],
            into_record(json!({"slug": "nct00000001", "id": "other", "title": "A trial"})),
        )
        .await
        .unwrap();
        assert_eq!(id, "t-1");
        assert!(!created);
        let rows = warehouse.rows(Collection::Trials).await;
        assert_eq!(rows[0]["created_at"], "2016-01-01T00:00:00+00:00");
        assert_eq!(rows[0]["title"], "A trial");
    }

    #[tokio::test]
    async fn test_composite_key() {
        let warehouse = MemoryWarehouse::with_natural_keys();
        let rel = |role: &str| into_record(json!({"trial_id": "t1", "person_id": "p1", "role": role}));
        upsert(&warehouse, Collection::TrialsPersons, &["trial_id", "person_id"], rel("investigator"))
            .await
            .unwrap();
        upsert(&warehouse, Collection::TrialsPersons, &["trial_id", "person_id"], rel("contact"))
            .await
            .unwrap();
        let rows = warehouse.rows(Collection::TrialsPersons).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["role"], "contact");
    }

    #[tokio::test]
    async fn test_missing_key_field_is_an_error() {
        let warehouse = MemoryWarehouse::new();
        let result = upsert(
            &warehouse,
            Collection::Locations,
            &["slug"],
            into_record(json!({"name": "Boston"})),
        )
        .await;
        assert!(result.is_err());
        assert!(warehouse.rows(Collection::Locations).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_create_one_row() {
        let warehouse = MemoryWarehouse::with_natural_keys();
        let record = into_record(json!({"slug": "acme", "name": "Acme"}));
        let (a, b) = tokio::join!(
            upsert(&warehouse, Collection::Organisations, &["slug"], record.clone()),
            upsert(&warehouse, Collection::Organisations, &["slug"], record.clone()),
        );
        let (id_a, _) = a.unwrap();
        let (id_b, _) = b.unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(warehouse.rows(Collection::Organisations).await.len(), 1);
    }
}
