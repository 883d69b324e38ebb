//! KV-backed audit trail.
//!
//! Entries are write-only from the gateway's point of view; they expire after
//! the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::kv::{self, KvError, KvStore};
use crate::models::audit::AuditEntry;

/// Audit retention: 30 days.
pub const AUDIT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Key prefix for audit entries.
pub const AUDIT_PREFIX: &str = "audit:";

/// Writes audit entries to a dedicated store.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn KvStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Record an action performed by `user_id`.
    pub async fn record(
        &self,
        user_id: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<AuditEntry, KvError> {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            action: action.to_string(),
            details,
        };
        let key = format!("{AUDIT_PREFIX}{}", entry.id);
        kv::put_json(self.store.as_ref(), &key, &entry, Some(AUDIT_RETENTION)).await?;
        Ok(entry)
    }
}
