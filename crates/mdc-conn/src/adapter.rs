//! Transport adapter capability.
//!
//! Each exchange implements this trait independently and is injected into
//! a [`ConnectionManager`](crate::ConnectionManager). The adapter owns the
//! transport and the wire protocol; it reports lifecycle changes and
//! normalized events back through the [`ClientHandle`] it is given.

use crate::connection::ClientHandle;
use crate::error::ConnResult;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Exchange transport adapter.
///
/// Contract:
/// - `initialize` opens the transport, then `subscribe` requests the
///   market-data channels. Either error aborts `start()` (or counts as a
///   disconnect when reconnecting).
/// - Once subscribed, call [`ClientHandle::on_open`].
/// - On disconnect call [`ClientHandle::on_close`]; on transport errors
///   call [`ClientHandle::on_error`].
/// - Route every payload through [`ClientHandle::handle_event`], or call
///   `on_message` followed by the typed handler.
pub trait TransportAdapter: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;

    /// Open the transport. Called on start and on every reconnect.
    fn initialize(&self, handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>>;

    /// Subscribe to ticker and execution channels on the open transport.
    ///
    /// Adapters that subscribe as part of `initialize` keep the default.
    fn subscribe(&self, _handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Request transport teardown. Must be idempotent.
    fn close(&self);

    /// Whether availability waits for the first ticker.
    ///
    /// Adapters with no meaningful ticker concept return `false` and are
    /// considered available as soon as they are connected.
    fn requires_ticker(&self) -> bool {
        true
    }
}

/// Arc wrapper for TransportAdapter trait objects.
pub type DynTransportAdapter = Arc<dyn TransportAdapter>;
