//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid data: {0}")]
    InvalidData(#[from] mdc_core::CoreError),

    #[error("Execution capture not found: {0}")]
    CaptureNotFound(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
