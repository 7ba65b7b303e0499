//! `sqlx`-backed `OriginStore` (component J), grounded on the teacher's
//! `ConnectionPool`/`DatabaseConfig` (`src/database/connection_pool.rs`):
//! same pool-sizing knobs, same SQLite pragma posture, generalised from a
//! fixed CAD schema to one `<collection>(pk TEXT PRIMARY KEY, doc TEXT)`
//! table per collection storing the whole document as `DictCodec` JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::codec::{DictCodec, DocValue, ScalarCodec};
use crate::error::OriginError;
use crate::store::{OriginResult, OriginStore};

/// Connection configuration, mirroring the pool knobs the teacher
/// exposes on `DatabaseConfig` — trimmed to what a sqlite-backed origin
/// actually needs here.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub enable_wal: bool,
    pub busy_timeout: Duration,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
            enable_wal: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

pub struct SqlxOriginStore {
    pool: SqlitePool,
}

impl SqlxOriginStore {
    pub async fn connect(config: OriginConfig) -> OriginResult<Self> {
        let connect_options: SqliteConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| OriginError::Backend(e.to_string()))?;
        let connect_options = connect_options
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout);
        let connect_options = if config.enable_wal {
            connect_options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        } else {
            connect_options
        };

        let pool = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Creates the backing table for `collection` if it does not exist
    /// yet. Called once per collection at registry setup, not per call.
    pub async fn ensure_collection(&self, collection: &str) -> OriginResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{collection}\" (pk TEXT PRIMARY KEY, doc TEXT NOT NULL)"
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl OriginStore for SqlxOriginStore {
    async fn find_one(
        &self,
        collection: &str,
        _pk_field: &str,
        pk: &str,
        ignore: &[String],
    ) -> OriginResult<Option<DocValue>> {
        let query = format!("SELECT doc FROM \"{collection}\" WHERE pk = ?1");
        let row = sqlx::query(&query)
            .bind(pk)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let doc_text: String = row.try_get("doc").map_err(|e| OriginError::Backend(e.to_string()))?;

        let codec = DictCodec;
        let mut value = codec
            .decode(&doc_text)
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        if let Some(map) = value.as_object() {
            if !ignore.is_empty() {
                let mut filtered = map.clone();
                for field in ignore {
                    filtered.remove(field);
                }
                value = DocValue::Object(filtered);
            }
        }

        Ok(Some(value))
    }

    async fn update_set(
        &self,
        collection: &str,
        _pk_field: &str,
        pk: &str,
        set: DocValue,
    ) -> OriginResult<()> {
        let Some(patch) = set.as_object().cloned() else {
            return Err(OriginError::Backend(
                "update_set requires an object-shaped patch".to_string(),
            ));
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        let query = format!("SELECT doc FROM \"{collection}\" WHERE pk = ?1");
        let existing: Option<String> = sqlx::query(&query)
            .bind(pk)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?
            .map(|row| row.try_get::<String, _>("doc"))
            .transpose()
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        let codec = DictCodec;
        let mut merged: BTreeMap<String, DocValue> = match existing {
            Some(text) => codec
                .decode(&text)
                .map_err(|e| OriginError::Backend(e.to_string()))?
                .into_object()
                .unwrap_or_default(),
            None => BTreeMap::new(),
        };
        for (field, value) in patch {
            merged.insert(field, value);
        }

        let encoded = codec.encode(&DocValue::Object(merged));
        let upsert = format!(
            "INSERT INTO \"{collection}\" (pk, doc) VALUES (?1, ?2) \
             ON CONFLICT(pk) DO UPDATE SET doc = excluded.doc"
        );
        sqlx::query(&upsert)
            .bind(pk)
            .bind(&encoded)
            .execute(&mut *tx)
            .await
            .map_err(|e| OriginError::Backend(e.to_string()))?;

        tx.commit().await.map_err(|e| OriginError::Backend(e.to_string()))?;
        Ok(())
    }
}
