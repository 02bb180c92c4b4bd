//! Connection lifecycle for exchange market-data adapters.
//!
//! Provides:
//! - Connection state machine (Initializing → Connected → Disconnected → Terminated)
//! - Linear reconnect backoff with a retry limit
//! - Cancellable shutdown
//! - Routing of normalized tickers and executions into freshness tracking
//!   and execution capture windows

pub mod adapter;
pub mod connection;
pub mod error;
pub mod retry;

pub use adapter::{BoxFuture, DynTransportAdapter, TransportAdapter};
pub use connection::{ClientHandle, ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{ConnError, ConnResult};
pub use retry::RetryState;
