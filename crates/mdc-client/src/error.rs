//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] mdc_conn::ConnError),

    #[error("Feed error: {0}")]
    Feed(#[from] mdc_feed::FeedError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] mdc_telemetry::TelemetryError),

    #[error("Client task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
