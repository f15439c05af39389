//! Persistence backends for the rolling history.
//!
//! The history is stored as a single text blob under a namespaced key. The
//! backend knows nothing about its contents; decoding and pruning happen in
//! [`history`](crate::history).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

/// Keyed text-blob storage surviving process restarts.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Read the blob stored under `key`, if any.
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Replace the blob stored under `key`.
    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// SQLite-backed blob store.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:apexstats.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // A single connection keeps `sqlite::memory:` databases shared across queries.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the blob table if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for Storage {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM kv_blobs WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_blobs (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-process blob store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob directly, bypassing any encoding.
    pub async fn insert(&self, key: &str, value: &str) {
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.insert(key, value).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[tokio::test]
    async fn test_load_missing_key() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        let value = storage.load("absent").await.unwrap();

        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        assert_ok!(storage.save("history", r#"{"a":1}"#).await);

        let value = storage.load("history").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage.save("history", "first").await.unwrap();
        storage.save("history", "second").await.unwrap();
        storage.save("other", "untouched").await.unwrap();

        assert_eq!(storage.load("history").await.unwrap().as_deref(), Some("second"));
        assert_eq!(storage.load("other").await.unwrap().as_deref(), Some("untouched"));
    }

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();

        assert!(backend.load("k").await.unwrap().is_none());
        backend.save("k", "v").await.unwrap();
        assert_eq!(backend.load("k").await.unwrap().as_deref(), Some("v"));
    }
}
