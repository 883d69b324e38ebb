//! Authentication: identity sessions and the OAuth handshake.
//!
//! Provides the session store consulted by the gateway middleware and the
//! provider abstraction used by the login/callback endpoints.

pub mod oauth;
pub mod session;

use thiserror::Error;

use crate::kv::KvError;

/// Authentication errors. Each kind is distinguishable by callers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Missing,

    #[error("Invalid session")]
    Invalid,

    #[error("Session expired")]
    Expired,

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(#[from] KvError),
}
