// src/storage/postgres.rs
//! PostgreSQL warehouse. Every collection is a table of JSONB documents:
//!
//! ```sql
//! CREATE TABLE locations (row_id BIGSERIAL PRIMARY KEY, data JSONB NOT NULL);
//! ```
//!
//! Filters are passed as a JSONB document and matched with `data @> $1`.
//! Natural keys are protected by unique expression indexes, which is what
//! serializes concurrent find-then-write pairs from the upsert.
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;
use tokio_postgres::GenericClient;

use super::{key_filter, Warehouse, WriteOp};
use crate::models::core::{Collection, Record};
use crate::utils::db_connect::PgPool;

pub struct PostgresWarehouse {
    pool: PgPool,
}

impl PostgresWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the collection tables and their natural-key indexes.
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for ensure_schema")?;
        for collection in Collection::ALL {
            let sql = schema_sql(collection);
            conn.batch_execute(&sql)
                .await
                .with_context(|| format!("Failed to create schema for {}", collection))?;
            debug!("Ensured table and indexes for {}", collection);
        }
        info!("Warehouse schema is up to date ({} collections)", Collection::ALL.len());
        Ok(())
    }
}

fn schema_sql(collection: Collection) -> String {
    let table = collection.as_str();
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            row_id BIGSERIAL PRIMARY KEY,
            data JSONB NOT NULL
         );
         CREATE INDEX IF NOT EXISTS {table}_data_idx ON {table} USING GIN (data jsonb_path_ops);"
    );
    let natural_key = collection.natural_key();
    if !natural_key.is_empty() {
        let columns: Vec<String> = natural_key
            .iter()
            .map(|field| format!("(data->>'{}')", field))
            .collect();
        sql.push_str(&format!(
            "\nCREATE UNIQUE INDEX IF NOT EXISTS {table}_natural_key_idx ON {table} ({});",
            columns.join(", ")
        ));
    }
    sql
}

fn row_to_record(row: &tokio_postgres::Row) -> Record {
    match row.get::<_, Value>("data") {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

async fn execute_op<C: GenericClient + Sync>(client: &C, op: &WriteOp) -> Result<u64> {
    match op {
        WriteOp::Insert { collection, record } => {
            let data = Value::Object(record.clone());
            let sql = format!("INSERT INTO {} (data) VALUES ($1)", collection.as_str());
            client
                .execute(sql.as_str(), &[&data])
                .await
                .with_context(|| format!("Failed to insert into {}", collection))
        }
        WriteOp::Update {
            collection,
            record,
            key_fields,
        } => {
            let filter = Value::Object(key_filter(record, key_fields)?);
            let data = Value::Object(record.clone());
            let sql = format!(
                "UPDATE {} SET data = data || $1 WHERE data @> $2",
                collection.as_str()
            );
            client
                .execute(sql.as_str(), &[&data, &filter])
                .await
                .with_context(|| format!("Failed to update {}", collection))
        }
        WriteOp::Delete { collection, filter } => {
            let filter = Value::Object(filter.clone());
            let sql = format!("DELETE FROM {} WHERE data @> $1", collection.as_str());
            client
                .execute(sql.as_str(), &[&filter])
                .await
                .with_context(|| format!("Failed to delete from {}", collection))
        }
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn find_one(&self, collection: Collection, filter: &Record) -> Result<Option<Record>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_one")?;
        let filter = Value::Object(filter.clone());
        let sql = format!(
            "SELECT data FROM {} WHERE data @> $1 ORDER BY row_id LIMIT 1",
            collection.as_str()
        );
        let row = conn
            .query_opt(sql.as_str(), &[&filter])
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Record,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find")?;
        let filter = Value::Object(filter.clone());
        let offset = offset as i64;
        let limit = limit as i64;
        let sql = format!(
            "SELECT data FROM {} WHERE data @> $1 ORDER BY row_id OFFSET $2 LIMIT $3",
            collection.as_str()
        );
        let rows = conn
            .query(sql.as_str(), &[&filter, &offset, &limit])
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn count(&self, collection: Collection, filter: &Record) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for count")?;
        let filter = Value::Object(filter.clone());
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE data @> $1",
            collection.as_str()
        );
        let row = conn
            .query_one(sql.as_str(), &[&filter])
            .await
            .with_context(|| format!("Failed to count {}", collection))?;
        let total: i64 = row.get("total");
        Ok(total.max(0) as usize)
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for insert")?;
        execute_op(&*conn, &WriteOp::Insert { collection, record }).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        record: Record,
        key_fields: &[String],
    ) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for update")?;
        let op = WriteOp::Update {
            collection,
            record,
            key_fields: key_fields.to_vec(),
        };
        execute_op(&*conn, &op).await
    }

    async fn delete(&self, collection: Collection, filter: &Record) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for delete")?;
        let op = WriteOp::Delete {
            collection,
            filter: filter.clone(),
        };
        execute_op(&*conn, &op).await
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for transaction")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start transaction")?;

        for op in &ops {
            if let Err(e) = execute_op(&transaction, op).await {
                error!("Transaction aborted: {:#}", e);
                // Dropping the transaction rolls it back.
                return Err(e);
            }
        }

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;
        debug!("Committed transaction with {} operations", ops.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_has_natural_key_index() {
        let sql = schema_sql(Collection::TrialsPersons);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS trials_persons"));
        assert!(sql.contains(
            "trials_persons_natural_key_idx ON trials_persons ((data->>'trial_id'), (data->>'person_id'))"
        ));
    }

    #[test]
    fn test_schema_sql_without_natural_key() {
        let sql = schema_sql(Collection::OrganisationClusters);
        assert!(sql.contains("organisation_clusters_data_idx"));
        assert!(!sql.contains("UNIQUE"));
    }
}
