//! Message freshness tracking.
//!
//! Records when the most recent message, ticker, and execution arrived
//! locally and answers "how long ago" questions on demand.

use chrono::{DateTime, Utc};
use mdc_core::SharedClock;
use serde::Serialize;
use tracing::debug;

/// Last-seen timestamps for one client.
///
/// Each `ms_since_*` accessor returns `0` until the corresponding event has
/// been observed. That is a "no data yet" sentinel, not "perfectly fresh";
/// check the raw timestamp to tell the two apart.
pub struct LatencyTracker {
    clock: SharedClock,
    /// Last message received time (any message).
    last_message: Option<DateTime<Utc>>,
    /// Last ticker received time.
    last_ticker: Option<DateTime<Utc>>,
    /// Source timestamp carried by the last ticker.
    last_ticker_source: Option<DateTime<Utc>>,
    /// Last execution received time.
    last_execution: Option<DateTime<Utc>>,
}

impl LatencyTracker {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            last_message: None,
            last_ticker: None,
            last_ticker_source: None,
            last_execution: None,
        }
    }

    /// Forget everything (called on start and on every fresh connection).
    pub fn reset(&mut self) {
        self.last_message = None;
        self.last_ticker = None;
        self.last_ticker_source = None;
        self.last_execution = None;
    }

    /// Current time from the tracker's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record that any message was received.
    pub fn record_message(&mut self) {
        self.last_message = Some(self.clock.now());
    }

    /// Record a ticker arrival carrying `source_time`.
    pub fn record_ticker(&mut self, source_time: DateTime<Utc>) {
        let now = self.clock.now();
        self.last_ticker = Some(now);
        self.last_ticker_source = Some(source_time);
        debug!(
            propagation_ms = (now - source_time).num_milliseconds(),
            "Recorded ticker"
        );
    }

    /// Record an execution arrival.
    pub fn record_execution(&mut self) {
        self.last_execution = Some(self.clock.now());
    }

    pub fn last_message_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_message
    }

    pub fn last_ticker_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_ticker
    }

    pub fn last_execution_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_execution
    }

    pub fn ms_since_last_message(&self) -> i64 {
        self.elapsed_ms(self.last_message)
    }

    pub fn ms_since_last_ticker(&self) -> i64 {
        self.elapsed_ms(self.last_ticker)
    }

    pub fn ms_since_last_execution(&self) -> i64 {
        self.elapsed_ms(self.last_execution)
    }

    /// Delay between the last ticker's source time and its local arrival.
    pub fn ticker_propagation_ms(&self) -> Option<i64> {
        match (self.last_ticker, self.last_ticker_source) {
            (Some(received), Some(source)) => Some((received - source).num_milliseconds()),
            _ => None,
        }
    }

    fn elapsed_ms(&self, last: Option<DateTime<Utc>>) -> i64 {
        last.map(|t| (self.clock.now() - t).num_milliseconds())
            .unwrap_or(0)
    }

    /// Get freshness statistics.
    pub fn stats(&self) -> LatencyStats {
        LatencyStats {
            last_message: self.last_message,
            last_ticker: self.last_ticker,
            last_execution: self.last_execution,
            ms_since_last_message: self.ms_since_last_message(),
            ms_since_last_ticker: self.ms_since_last_ticker(),
            ms_since_last_execution: self.ms_since_last_execution(),
            ticker_propagation_ms: self.ticker_propagation_ms(),
        }
    }
}

/// Freshness statistics.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub last_message: Option<DateTime<Utc>>,
    pub last_ticker: Option<DateTime<Utc>>,
    pub last_execution: Option<DateTime<Utc>>,
    pub ms_since_last_message: i64,
    pub ms_since_last_ticker: i64,
    pub ms_since_last_execution: i64,
    pub ticker_propagation_ms: Option<i64>,
}
