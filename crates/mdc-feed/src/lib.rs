//! Message freshness tracking and execution capture windows.
//!
//! Both components are plain single-owner state; the connection manager
//! serializes access to them behind one lock per client.

pub mod capture;
pub mod error;
pub mod latency;

pub use capture::{CaptureId, ExecutionCaptureEngine, ExecutionCaptureWindow};
pub use error::{FeedError, FeedResult};
pub use latency::{LatencyStats, LatencyTracker};
