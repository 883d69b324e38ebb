//! Audit log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit record, stored under `audit:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Value,
}
