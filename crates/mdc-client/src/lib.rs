//! Market-data client runner.
//!
//! Wires a transport adapter into a `ConnectionManager` and publishes its
//! health as Prometheus metrics:
//! - TOML configuration
//! - File replay adapter for normalized events
//! - Periodic metrics publishing and graceful shutdown

pub mod app;
pub mod config;
pub mod error;
pub mod replay;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use replay::ReplayAdapter;
