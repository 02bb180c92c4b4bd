//! Prometheus metrics and structured logging for the market-data client.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus gauges for connection health, latency, and capture windows

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
