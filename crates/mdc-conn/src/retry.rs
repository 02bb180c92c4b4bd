//! Reconnect retry bookkeeping.

use serde::Serialize;
use std::time::Duration;

/// Retry counters for one client.
///
/// `retry_count` grows by one per disconnect-triggered attempt. Once it
/// reaches `retry_limit`, `retry_enabled` drops to false and stays there
/// until the next `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryState {
    pub retry_enabled: bool,
    pub retry_count: u32,
    pub retry_limit: u32,
    pub base_interval_ms: u64,
}

impl RetryState {
    /// Fixed offset added to every backoff.
    pub const JITTER_OFFSET_MS: u64 = 100;

    pub fn new(retry_limit: u32, base_interval_ms: u64) -> Self {
        Self {
            retry_enabled: true,
            retry_count: 0,
            retry_limit,
            base_interval_ms,
        }
    }

    /// Re-arm for a fresh start.
    pub fn reset(&mut self) {
        self.retry_enabled = true;
        self.retry_count = 0;
    }

    /// Backoff before the given attempt: `attempt * base + 100ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let delay = u64::from(attempt)
            .saturating_mul(self.base_interval_ms)
            .saturating_add(Self::JITTER_OFFSET_MS);
        Duration::from_millis(delay)
    }

    /// Consume one retry attempt and return its backoff.
    ///
    /// Returns `None` when retries are disabled. The attempt that reaches the
    /// limit still gets its backoff, but leaves retries disabled.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if !self.retry_enabled {
            return None;
        }
        self.retry_count += 1;
        if self.is_exhausted() {
            self.retry_enabled = false;
        }
        Some(self.backoff_for(self.retry_count))
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.retry_limit
    }

    /// Turn retries off. Returns whether they were on.
    pub fn disable(&mut self) -> bool {
        std::mem::replace(&mut self.retry_enabled, false)
    }
}
