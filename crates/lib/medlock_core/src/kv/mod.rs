//! Key-value store abstraction.
//!
//! Sessions, OAuth state, downstream session mappings and audit entries all
//! live behind [`KvStore`]. Writes are per-key last-write-wins; nothing spans
//! more than one key.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryKvStore;
pub use postgres::PgKvStore;

/// Key-value store errors.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Minimal key-value contract with optional per-entry TTL.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Insert or overwrite a value. `ttl = None` keeps it until deleted.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Remove a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Remove `key` only while it still holds `expected`, as one step.
    /// Returns whether an entry was removed.
    async fn delete_if(&self, key: &str, expected: &str) -> Result<bool, KvError>;

    /// List live keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// Read a JSON value from the store.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, KvError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a value to the store as JSON.
pub async fn put_json<T: serde::Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), KvError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl).await
}
