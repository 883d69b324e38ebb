//! Session-sticky routing of JSON-RPC traffic to the downstream MCP handler.
//!
//! Each identity is pinned to at most one downstream session. The mapping is
//! written after a successful `initialize` and read on every other message.
//! With no mapping, continuation messages carry a deterministic fallback id
//! so the downstream reports "session not found" and the client re-initializes.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::kv::{KvError, KvStore};

/// Header carrying the downstream session id, in both directions.
pub const MCP_SESSION_HEADER: &str = "mcp-session-id";

/// Default mapping retention: 7 days.
pub const DEFAULT_MAPPING_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Key prefix for downstream session mappings.
pub const MAPPING_PREFIX: &str = "mcp-session:";

const INITIALIZE_METHOD: &str = "initialize";

/// How an inbound body relates to the downstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A JSON-RPC `initialize` request.
    Initialize,
    /// Any other well-formed JSON payload.
    Continuation,
    /// Not JSON; forwarded untouched for the downstream parser to reject.
    Unparsed,
}

/// Classify a request body.
pub fn classify(body: &[u8]) -> MessageKind {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => {
            let is_init = value
                .get("method")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|m| m == INITIALIZE_METHOD);
            if is_init {
                MessageKind::Initialize
            } else {
                MessageKind::Continuation
            }
        }
        Err(_) => MessageKind::Unparsed,
    }
}

/// Fallback downstream id for an identity without a mapping.
///
/// Downstream-minted ids are UUIDs, so this never collides with a real one.
pub fn fallback_session_id(identity: &str) -> String {
    format!("user-{identity}")
}

/// Downstream session to attach to a forwarded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBinding {
    /// Send no session id; the downstream mints one.
    Fresh,
    /// A stored mapping.
    Mapped(String),
    /// No mapping exists; the deterministic fallback.
    Fallback(String),
}

impl SessionBinding {
    /// Header value to send, if any.
    pub fn header_value(&self) -> Option<&str> {
        match self {
            SessionBinding::Fresh => None,
            SessionBinding::Mapped(id) | SessionBinding::Fallback(id) => Some(id),
        }
    }
}

/// Identity → downstream session mapping, kept in the token store.
#[derive(Clone)]
pub struct SessionRouter {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionRouter {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(identity: &str) -> String {
        format!("{MAPPING_PREFIX}{identity}")
    }

    /// Current mapping for `identity`, if any.
    pub async fn lookup(&self, identity: &str) -> Result<Option<String>, KvError> {
        self.store.get(&Self::key(identity)).await
    }

    /// Decide which downstream session a message of `kind` addresses.
    ///
    /// `Unparsed` messages are not routed and always bind `Fresh`; callers
    /// forward them without touching headers.
    pub async fn bind(&self, identity: &str, kind: MessageKind) -> Result<SessionBinding, KvError> {
        match kind {
            MessageKind::Initialize | MessageKind::Unparsed => Ok(SessionBinding::Fresh),
            MessageKind::Continuation => Ok(match self.lookup(identity).await? {
                Some(id) => SessionBinding::Mapped(id),
                None => SessionBinding::Fallback(fallback_session_id(identity)),
            }),
        }
    }

    /// Persist the session id minted by a successful `initialize`,
    /// replacing any previous mapping.
    pub async fn record(&self, identity: &str, downstream_id: &str) -> Result<(), KvError> {
        debug!(identity, downstream_id, "pinning downstream session");
        self.store
            .put(&Self::key(identity), downstream_id, Some(self.ttl))
            .await
    }

    /// Drop the mapping for `identity` if it still points at `stale_id`.
    ///
    /// A concurrent `initialize` may already have replaced the mapping; that
    /// newer id is left alone. Returns whether the mapping was removed.
    pub async fn invalidate(&self, identity: &str, stale_id: &str) -> Result<bool, KvError> {
        self.store.delete_if(&Self::key(identity), stale_id).await
    }
}
