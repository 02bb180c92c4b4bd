//! Connection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("Transport initialization failed ({adapter}): {reason}")]
    Initialization { adapter: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Client is already running")]
    AlreadyRunning,
}

pub type ConnResult<T> = Result<T, ConnError>;
