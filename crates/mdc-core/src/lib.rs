//! Core domain types for the market-data client.
//!
//! This crate provides the normalized shapes every exchange adapter produces:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Ticker`, `TickerSnapshot`: Top-of-book with last traded price
//! - `Execution`, `TakerSide`: Individual matched trades
//! - `Clock`: Injectable wall-clock source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use types::{Execution, FeedEvent, TakerSide, Ticker, TickerSnapshot};
