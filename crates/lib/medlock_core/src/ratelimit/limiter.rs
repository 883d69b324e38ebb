//! Bounded in-memory rate limiter.
//!
//! Windows live in a `DashMap` keyed by identity. The entry guard serializes
//! prune/check/append for one identity; identities in different shards never
//! contend. The table has a fixed capacity with approximate
//! least-recently-touched eviction, and a scheduled sweep drops windows that
//! have gone empty.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AdmissionControl, Decision, RateLimitError, Window};

/// Default admissions per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 3;
/// Default window length: 1 second.
pub const DEFAULT_WINDOW_MS: i64 = 1_000;
/// Default number of identities tracked at once.
pub const DEFAULT_CAPACITY: usize = 100_000;
/// Windows inspected per eviction; the oldest of them is dropped.
const EVICTION_SAMPLE: usize = 32;
/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Limiter parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub capacity: usize,
    pub sweep_interval: StdDuration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::milliseconds(DEFAULT_WINDOW_MS),
            capacity: DEFAULT_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// In-process per-identity limiter. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                config,
                windows: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.inner.config
    }

    /// Check and record one request for `identity` at `now`.
    pub fn check(&self, identity: &str, now: DateTime<Utc>) -> Decision {
        let cfg = &self.inner.config;
        if !self.inner.windows.contains_key(identity) {
            self.make_room();
        }
        let mut window = self
            .inner
            .windows
            .entry(identity.to_string())
            .or_insert_with(|| Window::new(now));
        window.admit(now, cfg.max_requests, cfg.window)
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.windows.len()
    }

    /// Evict windows until there is room for one more.
    ///
    /// Each round looks at no more than [`EVICTION_SAMPLE`] windows and drops
    /// the least recently touched of those, so admission stays cheap at full
    /// capacity. No entry guard may be held by the caller: iteration takes
    /// shard locks.
    fn make_room(&self) {
        let capacity = self.inner.config.capacity.max(1);
        while self.inner.windows.len() >= capacity {
            let oldest = self
                .inner
                .windows
                .iter()
                .take(EVICTION_SAMPLE)
                .min_by_key(|e| e.value().last_touched())
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.inner.windows.remove(&key);
                    debug!(identity = %key, "evicted rate limit window at capacity");
                }
                None => break,
            }
        }
    }

    /// Prune every window and drop the ones left empty. Returns how many
    /// identities were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let window = self.inner.config.window;
        let before = self.inner.windows.len();
        self.inner.windows.retain(|_, w| {
            w.prune(now, window);
            !w.is_empty()
        });
        before.saturating_sub(self.inner.windows.len())
    }

    /// Spawn the periodic sweep; stops when `ct` is cancelled.
    pub fn spawn_sweeper(&self, ct: CancellationToken) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        let period = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ct.cancelled() => break,
                    _ = interval.tick() => {
                        let dropped = limiter.sweep(Utc::now());
                        if dropped > 0 {
                            debug!(dropped, remaining = limiter.tracked(), "rate limit sweep");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AdmissionControl for RateLimiter {
    async fn admit(&self, identity: &str, now: DateTime<Utc>) -> Result<Decision, RateLimitError> {
        Ok(self.check(identity, now))
    }
}
