//! Per-identity request admission.
//!
//! A trailing-window counter keyed by identity. The in-process
//! [`RateLimiter`] is the default [`AdmissionControl`]; callers treat any
//! [`RateLimitError`] as "admit" (fail open).

pub mod limiter;
pub mod window;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use limiter::{RateLimitConfig, RateLimiter};
pub use window::Window;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Configured maximum per window.
    pub limit: u32,
    /// Admissions left in the current window, never negative.
    pub remaining: u32,
    /// `now + window` at the time of the check.
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    /// Reset instant as epoch seconds, as surfaced in `X-RateLimit-Reset`.
    pub fn reset_epoch_secs(&self) -> i64 {
        self.reset_at.timestamp()
    }
}

/// Rate limiter infrastructure errors.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limiter unavailable: {0}")]
    Unavailable(String),
}

/// Admission check seam between the HTTP layer and a limiter backend.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Check and, if admitted, record one request for `identity` at `now`.
    async fn admit(&self, identity: &str, now: DateTime<Utc>) -> Result<Decision, RateLimitError>;
}
