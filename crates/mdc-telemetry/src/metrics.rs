//! Prometheus metrics for the market-data client.
//!
//! Covers:
//! - Connection state and retry progress
//! - Feed latency and message freshness
//! - Rejected messages
//! - Open execution-capture windows
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only fails
//! on duplicate metric names, which is a startup bug. These panics only occur
//! during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_gauge, Encoder, Gauge, GaugeVec, Histogram, IntCounter, IntGauge, TextEncoder,
};

/// Connection lifecycle states, in label form.
pub const CONNECTION_STATES: [&str; 5] = [
    "initializing",
    "initialized",
    "connected",
    "disconnected",
    "terminated",
];

/// Connection state (1 = active, 0 = inactive).
/// Labels: state (initializing/initialized/connected/disconnected/terminated)
pub static CONNECTION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mdc_connection_state",
        "Connection lifecycle state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Whether the client is connected and has seen a ticker.
pub static AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "mdc_available",
        "Client availability (1=connected and ticker received)"
    )
    .unwrap()
});

/// Reconnect attempts consumed since the last start.
pub static RETRY_COUNT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "mdc_retry_count",
        "Reconnect attempts consumed since the last start"
    )
    .unwrap()
});

/// Current feed latency in milliseconds.
pub static LATENCY_MS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "mdc_latency_ms",
        "Worse of ticker latency and time since the last message"
    )
    .unwrap()
});

/// Feed latency distribution in milliseconds.
pub static LATENCY_HIST_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "mdc_latency_hist_ms",
        "Feed latency distribution in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Age of the freshest data per channel.
/// Labels: channel (message/ticker/execution)
pub static DATA_AGE_MS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mdc_data_age_ms",
        "Milliseconds since the last message per channel",
        &["channel"]
    )
    .unwrap()
});

/// Messages rejected by validation.
pub static MESSAGE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mdc_message_errors_total",
        "Inbound messages rejected by validation"
    )
    .unwrap()
});

/// Last client total passed to `Metrics::message_errors_observed`.
static LAST_MESSAGE_ERRORS: AtomicU64 = AtomicU64::new(0);

/// Open execution-capture windows.
pub static OPEN_CAPTURES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("mdc_open_captures", "Open execution-capture windows").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set connection state.
    /// Only the active state is set to 1, all others to 0.
    pub fn connection_state_set(state: &str) {
        for s in &CONNECTION_STATES {
            CONNECTION_STATE.with_label_values(&[s]).set(0.0);
        }
        CONNECTION_STATE.with_label_values(&[state]).set(1.0);
    }

    pub fn available_set(available: bool) {
        AVAILABLE.set(i64::from(available));
    }

    pub fn retry_count_set(count: u32) {
        RETRY_COUNT.set(i64::from(count));
    }

    /// Record feed latency.
    pub fn latency(latency_ms: i64) {
        LATENCY_MS.set(latency_ms as f64);
        LATENCY_HIST_MS.observe(latency_ms.max(0) as f64);
    }

    /// Record age of the freshest data on a channel.
    pub fn data_age(channel: &str, age_ms: i64) {
        DATA_AGE_MS.with_label_values(&[channel]).set(age_ms as f64);
    }

    /// Feed the client's running rejected-message total into the counter.
    ///
    /// A total below the previous observation means the client restarted
    /// its count, so the whole new total is added.
    pub fn message_errors_observed(total: u64) {
        let prev = LAST_MESSAGE_ERRORS.swap(total, Ordering::Relaxed);
        let delta = if total >= prev { total - prev } else { total };
        if delta > 0 {
            MESSAGE_ERRORS_TOTAL.inc_by(delta);
        }
    }

    pub fn open_captures_set(count: usize) {
        OPEN_CAPTURES.set(count as i64);
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
