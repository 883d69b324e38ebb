//! PostgreSQL-backed key-value store.
//!
//! Rows live in `kv_entries`, partitioned by a namespace so the token and
//! audit stores can share one table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{KvError, KvStore};

/// Durable store over a `PgPool`. Expired rows read as absent and are removed
/// by [`PgKvStore::purge_expired`].
#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
    namespace: String,
}

impl PgKvStore {
    pub fn new(pool: PgPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// Delete expired rows in this namespace. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, KvError> {
        let result = sqlx::query(
            "DELETE FROM kv_entries \
             WHERE namespace = $1 AND expires_at IS NOT NULL AND expires_at <= now()",
        )
        .bind(&self.namespace)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// A TTL past chrono's range is stored without expiry.
fn expiry_from_ttl(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl?).ok()?;
    Utc::now().checked_add_signed(ttl)
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT value FROM kv_entries \
             WHERE namespace = $1 AND key = $2 \
               AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let expires_at = expiry_from_ttl(ttl);
        sqlx::query(
            "INSERT INTO kv_entries (namespace, key, value, expires_at, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (namespace, key) \
             DO UPDATE SET value = EXCLUDED.value, \
                           expires_at = EXCLUDED.expires_at, \
                           updated_at = now()",
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = $1 AND key = $2")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_if(&self, key: &str, expected: &str) -> Result<bool, KvError> {
        let result = sqlx::query(
            "DELETE FROM kv_entries \
             WHERE namespace = $1 AND key = $2 AND value = $3 \
               AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT key FROM kv_entries \
             WHERE namespace = $1 AND starts_with(key, $2) \
               AND (expires_at IS NULL OR expires_at > now()) \
             ORDER BY key",
        )
        .bind(&self.namespace)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}
