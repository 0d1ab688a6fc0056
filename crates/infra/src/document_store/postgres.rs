//! Postgres-backed document store.
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`
//! with the body in a JSONB column. Server timestamps are produced by
//! Postgres (`now()`), not by this process.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::{missing_document, Document, DocumentStore, DocumentWrite, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    fields JSONB NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (collection, id)
)
"#;

// `$4` is the list of field names to stamp with the transaction time.
const STAMPS: &str =
    "COALESCE((SELECT jsonb_object_agg(k, to_jsonb(now())) FROM unnest($4::text[]) AS k), '{}'::jsonb)";

/// Postgres document store.
///
/// Uses the SQLx connection pool, which is cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Wrap an existing pool. Call [`PostgresDocumentStore::ensure_schema`]
    /// before first use.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and create the table if it does not exist.
    ///
    /// `acquire_timeout` bounds how long a query waits for a pooled connection.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect to Postgres: {e}")))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn write_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Write(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn put(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError> {
        debug!(collection, id, "put document");

        let sql = format!(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3::jsonb || {STAMPS})
            ON CONFLICT (collection, id)
            DO UPDATE SET fields = EXCLUDED.fields
            "#
        );
        sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(write.fields))
            .bind(write.server_timestamps)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError> {
        debug!(collection, id, "update document");

        let sql = format!(
            r#"
            UPDATE documents
            SET fields = fields || $3::jsonb || {STAMPS}
            WHERE collection = $1 AND id = $2
            "#
        );
        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(write.fields))
            .bind(write.server_timestamps)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(missing_document(collection, id));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT fields
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        match row
            .try_get::<Value, _>("fields")
            .map_err(|e| StoreError::Codec(e.to_string()))?
        {
            Value::Object(doc) => Ok(Some(doc)),
            other => Err(StoreError::Codec(format!(
                "{collection}/{id} is not a JSON object: {other}"
            ))),
        }
    }
}
