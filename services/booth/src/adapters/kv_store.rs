//! services/booth/src/adapters/kv_store.rs
//!
//! Concrete implementations of the `KeyValueStore` port: a SQLite table accessed
//! through `sqlx`, and an in-memory map for tests and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use dream_booth_core::ports::{KeyValueStore, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// SQLite result codes for a full database and an oversized value.
const SQLITE_FULL: &str = "13";
const SQLITE_TOOBIG: &str = "18";

fn validate_key(key: &str) -> PortResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PortError::Unexpected(format!("invalid storage key '{}'", key)))
    }
}

fn quota_error(key: &str, needed: u64, quota: u64) -> PortError {
    PortError::QuotaExceeded(format!(
        "writing '{}' needs {} bytes but the quota is {} bytes",
        key, needed, quota
    ))
}

fn write_error(key: &str, e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some(SQLITE_FULL) | Some(SQLITE_TOOBIG)) {
            return PortError::QuotaExceeded(format!("writing '{}': {}", key, db.message()));
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// SQLite-backed store
//=========================================================================================

/// Stores every key as one row of the `kv` table.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file at `path` and runs migrations.
    ///
    /// `max_pages` caps the database size through SQLite's `max_page_count`;
    /// writes past it fail with `PortError::QuotaExceeded`.
    pub async fn open(path: impl AsRef<Path>, max_pages: Option<u32>) -> Result<Self, sqlx::Error> {
        let mut options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        if let Some(pages) = max_pages {
            options = options.pragma("max_page_count", pages.to_string());
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(FromRow)]
struct KvRecord {
    value: String,
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        validate_key(key)?;
        let record = sqlx::query_as::<_, KvRecord>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.map(|r| r.value))
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        validate_key(key)?;
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(key, e))?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        validate_key(key)?;
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

#[derive(Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Seeds a raw value, bypassing validation and quota. Used to stage legacy data.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        validate_key(key)?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        validate_key(key)?;
        let mut values = self.values.lock().await;
        if let Some(quota) = self.quota_bytes {
            let others: u64 = values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            let needed = others + value.len() as u64;
            if needed > quota {
                return Err(quota_error(key, needed, quota));
            }
        }
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        validate_key(key)?;
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db"), None).await.unwrap();

        assert_eq!(store.get("settings").await.unwrap(), None);
        store.set("settings", "{\"a\":1}").await.unwrap();
        store.set("settings", "{\"a\":2}").await.unwrap();
        assert_eq!(store.get("settings").await.unwrap().as_deref(), Some("{\"a\":2}"));

        store.remove("settings").await.unwrap();
        assert_eq!(store.get("settings").await.unwrap(), None);
        // Removing twice is fine.
        store.remove("settings").await.unwrap();
    }

    #[tokio::test]
    async fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        let first = SqliteKvStore::open(&path, None).await.unwrap();
        first.set("history", "[1,2,3]").await.unwrap();
        first.close().await;

        let second = SqliteKvStore::open(&path, None).await.unwrap();
        assert_eq!(second.get("history").await.unwrap().as_deref(), Some("[1,2,3]"));
    }

    #[tokio::test]
    async fn sqlite_store_reports_a_full_database_as_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db"), Some(16)).await.unwrap();

        store.set("small", "ok").await.unwrap();
        let big = "x".repeat(256 * 1024);
        let err = store.set("history", &big).await.unwrap_err();
        assert!(matches!(err, PortError::QuotaExceeded(_)), "{err:?}");
        // The earlier value is untouched.
        assert_eq!(store.get("small").await.unwrap().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let store = MemoryKvStore::new();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.set("", "x").await.is_err());
    }

    #[tokio::test]
    async fn memory_store_quota() {
        let store = MemoryKvStore::with_quota(4);
        store.set("k", "1234").await.unwrap();
        assert!(matches!(
            store.set("j", "1").await.unwrap_err(),
            PortError::QuotaExceeded(_)
        ));
    }
}
