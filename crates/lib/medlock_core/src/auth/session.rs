//! Identity session store.
//!
//! Sessions are JSON records under `session:{id}` in the token store. A
//! record past its expiry is deleted by the lookup that discovers it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::kv::{self, KvError, KvStore};
use crate::models::auth::{IdentitySession, ProviderUser};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key prefix for session records.
pub const SESSION_PREFIX: &str = "session:";

fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Creates, resolves and revokes identity sessions.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Session lifetime applied to new sessions.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session for a provider user. Returns `(session_id, record)`.
    pub async fn create(
        &self,
        user: &ProviderUser,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, IdentitySession), KvError> {
        // Records carry millisecond precision.
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| KvError::Unavailable("session ttl out of range".into()))?;
        let session = IdentitySession {
            user_id: user.id.clone(),
            username: user.display_name(),
            email: user.email.clone(),
            access_token: access_token.to_string(),
            created_at: now,
            expires_at,
        };
        let session_id = Uuid::new_v4().to_string();
        self.insert(&session_id, &session).await?;
        Ok((session_id, session))
    }

    /// Store a prepared record under `session_id` with the configured TTL.
    pub async fn insert(&self, session_id: &str, session: &IdentitySession) -> Result<(), KvError> {
        kv::put_json(
            self.store.as_ref(),
            &session_key(session_id),
            session,
            Some(self.ttl),
        )
        .await
    }

    /// Resolve a session id to its record.
    ///
    /// Unknown ids yield [`AuthError::Invalid`]; expired records are deleted
    /// inline and yield [`AuthError::Expired`]; store failures surface as
    /// [`AuthError::StoreUnavailable`] so callers can fail closed.
    pub async fn resolve(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IdentitySession, AuthError> {
        let key = session_key(session_id);
        let raw = self.store.get(&key).await?.ok_or(AuthError::Invalid)?;

        let session: IdentitySession = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                debug!("discarding unreadable session record: {e}");
                return Err(AuthError::Invalid);
            }
        };

        if session.is_expired(now) {
            self.store.delete(&key).await?;
            return Err(AuthError::Expired);
        }

        Ok(session)
    }

    /// Delete a session. Missing sessions are ignored.
    pub async fn revoke(&self, session_id: &str) -> Result<(), KvError> {
        self.store.delete(&session_key(session_id)).await
    }
}
