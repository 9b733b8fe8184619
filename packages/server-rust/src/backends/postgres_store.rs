//! [`Store`] over the `PostgreSQL` wire protocol (`PostgreSQL`, `CockroachDB`).
//!
//! Each store id maps to its own table `(key TEXT PRIMARY KEY, value BYTEA)`,
//! created on connect if missing.

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use sidecar_core::Record;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::traits::{BackendError, Store};

pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    /// Connects to `address` (either `host:port` or a full `postgres://` URL),
    /// selects `database`, and ensures the table for `store_id` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store id is not a usable table name, the
    /// connection fails, or the table cannot be created.
    pub async fn connect(address: &str, database: &str, store_id: &str) -> anyhow::Result<Self> {
        if store_id.is_empty() || store_id.contains('"') || store_id.contains('\0') {
            bail!("store id {store_id:?} cannot be used as a table name");
        }

        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("postgres://{address}/{database}")
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .with_context(|| format!("failed to connect store {store_id}"))?;

        let table = format!("\"{store_id}\"");
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, value BYTEA NOT NULL)"
        ))
        .execute(&pool)
        .await
        .with_context(|| format!("failed to create table for store {store_id}"))?;

        Ok(Self { pool, table })
    }
}

fn other(err: sqlx::Error) -> BackendError {
    BackendError::Other(err.into())
}

#[async_trait]
impl Store for PostgresStore {
    async fn save(&self, records: &[Record]) -> Result<(), BackendError> {
        let sql = format!(
            "INSERT INTO {} (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            self.table
        );
        let mut tx = self.pool.begin().await.map_err(other)?;
        for record in records {
            sqlx::query(&sql)
                .bind(&record.key)
                .bind(&record.value)
                .execute(&mut *tx)
                .await
                .map_err(other)?;
        }
        tx.commit().await.map_err(other)
    }

    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        let rows = sqlx::query(&format!("SELECT key, value FROM {} ORDER BY key", self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(other)?;
        rows.iter()
            .map(|row| {
                Ok(Record::new(
                    row.try_get::<String, _>("key").map_err(other)?,
                    row.try_get::<Vec<u8>, _>("value").map_err(other)?,
                ))
            })
            .collect()
    }

    async fn get(&self, key: &str) -> Result<Record, BackendError> {
        let row = sqlx::query(&format!("SELECT value FROM {} WHERE key = $1", self.table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)?;
        match row {
            Some(row) => Ok(Record::new(
                key,
                row.try_get::<Vec<u8>, _>("value").map_err(other)?,
            )),
            None => Err(BackendError::RecordNotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        sqlx::query(&format!("DELETE FROM {} WHERE key = $1", self.table))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(other)?;
        Ok(())
    }
}
