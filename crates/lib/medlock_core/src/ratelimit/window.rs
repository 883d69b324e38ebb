//! Trailing-window counter for a single identity.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use super::Decision;

/// Admission timestamps within the trailing window of one identity.
#[derive(Debug, Clone)]
pub struct Window {
    admitted: VecDeque<DateTime<Utc>>,
    last_touched: DateTime<Utc>,
}

impl Window {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            admitted: VecDeque::new(),
            last_touched: now,
        }
    }

    /// Drop timestamps at or before `now - length`. The boundary is exclusive:
    /// an entry exactly one window old no longer counts.
    pub fn prune(&mut self, now: DateTime<Utc>, length: Duration) {
        let cutoff = now - length;
        self.admitted.retain(|t| *t > cutoff);
    }

    /// Prune, then admit if fewer than `max` entries remain.
    ///
    /// A denied check does not record a timestamp.
    pub fn admit(&mut self, now: DateTime<Utc>, max: u32, length: Duration) -> Decision {
        self.prune(now, length);
        if now > self.last_touched {
            self.last_touched = now;
        }
        let reset_at = now + length;

        let count = u32::try_from(self.admitted.len()).unwrap_or(u32::MAX);
        if count >= max {
            return Decision {
                allowed: false,
                limit: max,
                remaining: 0,
                reset_at,
            };
        }

        self.admitted.push_back(now);
        Decision {
            allowed: true,
            limit: max,
            remaining: max.saturating_sub(count + 1),
            reset_at,
        }
    }

    /// Admitted entries currently held (not pruned).
    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }

    /// Most recent check time, used for least-recently-used eviction.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.last_touched
    }
}
