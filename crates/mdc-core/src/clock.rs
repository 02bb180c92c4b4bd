//! Wall-clock source.
//!
//! Latency figures are computed against local receipt time, so every
//! component that stamps arrivals takes a `Clock` instead of calling
//! `Utc::now()` directly. Tests drive a [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Arc wrapper for Clock trait objects.
pub type SharedClock = Arc<dyn Clock>;

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at `secs` seconds after the Unix epoch.
    pub fn at_secs(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move the clock to an absolute time.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Move the clock forward (or backward, for negative values).
    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock();
        *now = *now + Duration::milliseconds(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_secs(1_700_000_000);
        assert_eq!(clock.now_ms(), 1_700_000_000_000);

        clock.advance_ms(1500);
        assert_eq!(clock.now_ms(), 1_700_000_001_500);

        clock.advance_ms(-500);
        assert_eq!(clock.now_ms(), 1_700_000_001_000);
    }

    #[test]
    fn test_system_clock_is_recent() {
        let clock = SystemClock;
        let drift = (Utc::now() - clock.now()).num_milliseconds().abs();
        assert!(drift < 1000);
    }
}
