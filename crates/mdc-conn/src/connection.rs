//! Connection manager.
//!
//! Drives the connect → consume → backoff-and-retry → terminate lifecycle
//! for one exchange adapter and routes normalized events into freshness
//! tracking, the cached ticker, and execution capture windows.

use crate::adapter::DynTransportAdapter;
use crate::error::{ConnError, ConnResult};
use crate::retry::RetryState;
use chrono::{DateTime, Utc};
use mdc_core::{
    Execution, FeedEvent, Price, SharedClock, Size, SystemClock, Ticker, TickerSnapshot,
};
use mdc_feed::{
    CaptureId, ExecutionCaptureEngine, ExecutionCaptureWindow, FeedResult, LatencyStats,
    LatencyTracker,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnect attempts before the client terminates.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Backoff step; attempt `n` waits `n * base_interval_ms + 100`.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
}

fn default_retry_limit() -> u32 {
    5
}

fn default_base_interval_ms() -> u64 {
    10_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_limit: default_retry_limit(),
            base_interval_ms: default_base_interval_ms(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Initializing,
    Initialized,
    Connected,
    Disconnected,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Everything ingestion, capture management, and accessor reads touch.
///
/// Guarded by a single mutex so those three are serialized per client.
struct FeedState {
    latency: LatencyTracker,
    ticker: Option<TickerSnapshot>,
    captures: ExecutionCaptureEngine,
    ticker_received: bool,
}

struct Shared {
    adapter_name: String,
    status: RwLock<ConnectionState>,
    retry: Mutex<RetryState>,
    feed: Mutex<FeedState>,
    /// Woken on every status or retry change.
    state_changed: Notify,
    /// Replaced on every start; cancelled by stop.
    shutdown_token: Mutex<CancellationToken>,
    message_errors: AtomicU64,
}

impl Shared {
    fn status(&self) -> ConnectionState {
        *self.status.read()
    }

    fn set_status(&self, state: ConnectionState) {
        let prev = std::mem::replace(&mut *self.status.write(), state);
        if prev != state {
            debug!(adapter = %self.adapter_name, from = %prev, to = %state, "Connection state changed");
        }
        self.state_changed.notify_waiters();
    }

    fn retries_enabled(&self) -> bool {
        self.retry.lock().retry_enabled
    }

    fn disable_retries(&self) -> bool {
        let was_enabled = self.retry.lock().disable();
        self.state_changed.notify_waiters();
        was_enabled
    }

    fn token(&self) -> CancellationToken {
        self.shutdown_token.lock().clone()
    }
}

/// Adapter-facing handle.
///
/// Cloned into the adapter on every `initialize`. All lifecycle callbacks
/// and event ingestion go through here.
#[derive(Clone)]
pub struct ClientHandle {
    shared: Arc<Shared>,
}

impl ClientHandle {
    /// Subscription complete: clear last-seen timestamps and mark connected.
    pub fn on_open(&self) {
        self.shared.feed.lock().latency.reset();
        self.shared.set_status(ConnectionState::Connected);
        info!(adapter = %self.shared.adapter_name, "Transport connected");
    }

    /// Transport closed. Disables retries once the limit has been reached.
    pub fn on_close(&self) {
        self.shared.set_status(ConnectionState::Disconnected);

        let exhausted = {
            let mut retry = self.shared.retry.lock();
            if retry.is_exhausted() {
                retry.disable();
                true
            } else {
                false
            }
        };
        if exhausted {
            self.shared.state_changed.notify_waiters();
            warn!(adapter = %self.shared.adapter_name, "Transport closed, retry limit reached");
        } else {
            warn!(adapter = %self.shared.adapter_name, "Transport closed");
        }
    }

    /// Transport error. Always fatal for the retry loop, regardless of the
    /// remaining retry budget.
    pub fn on_error(&self, err: impl fmt::Display) {
        error!(adapter = %self.shared.adapter_name, error = %err, "Transport error, disabling retries");
        self.shared.disable_retries();
    }

    /// Any inbound payload, before type-specific handling.
    pub fn on_message(&self) {
        self.shared.feed.lock().latency.record_message();
    }

    /// Save a normalized ticker from its individual fields.
    pub fn save_ticker(
        &self,
        timestamp: DateTime<Utc>,
        last_price: Price,
        best_ask_price: Price,
        best_bid_price: Price,
        best_ask_size: Size,
        best_bid_size: Size,
    ) -> FeedResult<()> {
        self.on_ticker(Ticker {
            timestamp,
            last_price,
            best_ask_price,
            best_bid_price,
            best_ask_size,
            best_bid_size,
        })
    }

    /// Replace the cached ticker.
    pub fn on_ticker(&self, ticker: Ticker) -> FeedResult<()> {
        ticker.validate()?;

        let mut feed = self.shared.feed.lock();
        let now = feed.latency.now();
        feed.latency.record_ticker(ticker.timestamp);
        feed.ticker = Some(TickerSnapshot::capture(ticker, now));
        feed.ticker_received = true;
        Ok(())
    }

    /// Fan an execution out to every open capture window.
    pub fn on_execution(&self, exec: &Execution) -> FeedResult<()> {
        let mut feed = self.shared.feed.lock();
        let updated = feed.captures.ingest(exec)?;
        feed.latency.record_execution();
        debug!(price = %exec.price, size = %exec.size, side = %exec.side, updated, "Execution ingested");
        Ok(())
    }

    /// Record and dispatch one normalized event.
    ///
    /// Handling errors are logged and counted; they never affect the
    /// connection or later events.
    pub fn handle_event(&self, event: FeedEvent) {
        self.on_message();

        let kind = event.kind();
        let result = match event {
            FeedEvent::Ticker(ticker) => self.on_ticker(ticker),
            FeedEvent::Execution(exec) => self.on_execution(&exec),
        };

        if let Err(e) = result {
            self.on_message_error(kind, e);
        }
    }

    /// A payload that could not be handled. Counted and logged only.
    pub fn on_message_error(&self, kind: &str, err: impl fmt::Display) {
        self.shared.message_errors.fetch_add(1, Ordering::Relaxed);
        warn!(adapter = %self.shared.adapter_name, kind, error = %err, "Failed to handle message");
    }

    pub fn status(&self) -> ConnectionState {
        self.shared.status()
    }
}

/// Connection manager for one exchange connection.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    adapter: DynTransportAdapter,
    running: AtomicBool,
    /// Set by `stop()`, consumed by the next run. Survives the window between
    /// calling `start()` and its first poll.
    stop_requested: AtomicBool,
}

impl ConnectionManager {
    /// Create a new connection manager using the system clock.
    pub fn new(config: ConnectionConfig, adapter: DynTransportAdapter) -> Self {
        Self::with_clock(config, adapter, Arc::new(SystemClock))
    }

    /// Create a connection manager with an explicit clock.
    pub fn with_clock(
        config: ConnectionConfig,
        adapter: DynTransportAdapter,
        clock: SharedClock,
    ) -> Self {
        let shared = Shared {
            adapter_name: adapter.name().to_string(),
            status: RwLock::new(ConnectionState::Initializing),
            retry: Mutex::new(RetryState::new(config.retry_limit, config.base_interval_ms)),
            feed: Mutex::new(FeedState {
                latency: LatencyTracker::new(clock),
                ticker: None,
                captures: ExecutionCaptureEngine::new(),
                ticker_received: false,
            }),
            state_changed: Notify::new(),
            shutdown_token: Mutex::new(CancellationToken::new()),
            message_errors: AtomicU64::new(0),
        };
        Self {
            shared: Arc::new(shared),
            adapter,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Handle for feeding lifecycle changes and events into this client.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            shared: self.shared.clone(),
        }
    }

    /// Initialize the transport and supervise it until terminated.
    ///
    /// Resolves once the retry loop exits. An initialization failure on
    /// this first attempt is returned without any retry.
    pub async fn start(&self) -> ConnResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConnError::AlreadyRunning);
        }
        let result = self.run().await;
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self) -> ConnResult<()> {
        self.reset();

        // Checked after reset: a later stop() hits the fresh token instead
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            info!(adapter = %self.shared.adapter_name, "Stop requested before start, not connecting");
            self.shared.disable_retries();
            self.terminate();
            return Ok(());
        }
        info!(adapter = %self.shared.adapter_name, "Starting client");

        if let Err(e) = self.initialize_transport().await {
            error!(adapter = %self.shared.adapter_name, error = %e, "Transport initialization failed");
            self.shared.set_status(ConnectionState::Terminated);
            return Err(e);
        }

        self.retry_loop().await;
        Ok(())
    }

    fn reset(&self) {
        self.shared.retry.lock().reset();
        {
            let mut feed = self.shared.feed.lock();
            feed.latency.reset();
            feed.ticker_received = !self.adapter.requires_ticker();
        }
        *self.shared.shutdown_token.lock() = CancellationToken::new();
        self.shared.message_errors.store(0, Ordering::Relaxed);
    }

    async fn initialize_transport(&self) -> ConnResult<()> {
        self.shared.set_status(ConnectionState::Initializing);
        self.adapter.initialize(self.handle()).await?;
        self.adapter.subscribe(self.handle()).await?;

        // The adapter may already have reported open/close from inside initialize
        let mut status = self.shared.status.write();
        if *status == ConnectionState::Initializing {
            *status = ConnectionState::Initialized;
            drop(status);
            self.shared.state_changed.notify_waiters();
        }
        Ok(())
    }

    async fn retry_loop(&self) {
        let token = self.shared.token();

        loop {
            // Wait for a disconnect, or for retries to be switched off
            loop {
                let notified = self.shared.state_changed.notified();
                if !self.shared.retries_enabled()
                    || self.shared.status() == ConnectionState::Disconnected
                {
                    break;
                }
                tokio::select! {
                    () = notified => {}
                    () = token.cancelled() => {}
                }
            }

            let (attempt, delay) = {
                let mut retry = self.shared.retry.lock();
                match retry.next_attempt() {
                    Some(delay) => (retry.retry_count, delay),
                    None => break,
                }
            };
            warn!(
                adapter = %self.shared.adapter_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            // Wait for delay OR shutdown signal
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {
                    info!(adapter = %self.shared.adapter_name, "Shutdown requested during backoff");
                    break;
                }
            }

            if !self.shared.retries_enabled() {
                break;
            }

            if let Err(e) = self.initialize_transport().await {
                error!(adapter = %self.shared.adapter_name, attempt, error = %e, "Reconnect failed");
                self.handle().on_close();
            }
        }

        self.terminate();
    }

    fn terminate(&self) {
        let prev = self.shared.status();
        if matches!(
            prev,
            ConnectionState::Connected | ConnectionState::Initialized
        ) {
            self.adapter.close();
        }
        self.shared.set_status(ConnectionState::Terminated);
        let retry = self.retry_state();
        info!(
            adapter = %self.shared.adapter_name,
            retry_count = retry.retry_count,
            "Client terminated"
        );
    }

    /// Disable further retries and request transport teardown. Idempotent.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.shared.disable_retries() {
            info!(adapter = %self.shared.adapter_name, "Stop requested");
        }
        self.shared.token().cancel();
        self.adapter.close();
    }

    pub fn status(&self) -> ConnectionState {
        self.shared.status()
    }

    pub fn retry_state(&self) -> RetryState {
        *self.shared.retry.lock()
    }

    /// Connected and at least one ticker seen (or the adapter needs none).
    pub fn is_available(&self) -> bool {
        self.status() == ConnectionState::Connected && self.shared.feed.lock().ticker_received
    }

    /// Single health signal: the worse of ticker staleness at save time and
    /// time since any traffic.
    pub fn get_latency(&self) -> i64 {
        let feed = self.shared.feed.lock();
        let ticker_latency = feed.ticker.as_ref().map_or(0, TickerSnapshot::latency_ms);
        ticker_latency.max(feed.latency.ms_since_last_message())
    }

    pub fn get_ticker(&self) -> Option<TickerSnapshot> {
        self.shared.feed.lock().ticker.clone()
    }

    pub fn last_message_timestamp(&self) -> Option<DateTime<Utc>> {
        self.shared.feed.lock().latency.last_message_timestamp()
    }

    pub fn last_ticker_timestamp(&self) -> Option<DateTime<Utc>> {
        self.shared.feed.lock().latency.last_ticker_timestamp()
    }

    pub fn last_execution_timestamp(&self) -> Option<DateTime<Utc>> {
        self.shared.feed.lock().latency.last_execution_timestamp()
    }

    /// Milliseconds since the last message, `0` if none yet.
    pub fn ms_since_last_message(&self) -> i64 {
        self.shared.feed.lock().latency.ms_since_last_message()
    }

    /// Milliseconds since the last ticker, `0` if none yet.
    pub fn ms_since_last_ticker(&self) -> i64 {
        self.shared.feed.lock().latency.ms_since_last_ticker()
    }

    /// Milliseconds since the last execution, `0` if none yet.
    pub fn ms_since_last_execution(&self) -> i64 {
        self.shared.feed.lock().latency.ms_since_last_execution()
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.shared.feed.lock().latency.stats()
    }

    /// Open a capture window seeded from the cached ticker's last price.
    /// Re-using an id replaces the old window.
    pub fn create_execution_capture(&self, id: impl Into<CaptureId>) {
        let mut feed = self.shared.feed.lock();
        let seed = feed.ticker.as_ref().map(|t| t.last_price);
        feed.captures.create(id, seed);
    }

    /// Close a capture window. Unknown ids are ignored.
    pub fn remove_execution_capture(&self, id: &str) {
        self.shared.feed.lock().captures.remove(id);
    }

    pub fn get_execution_capture(&self, id: &str) -> Option<ExecutionCaptureWindow> {
        self.shared.feed.lock().captures.get(id).cloned()
    }

    /// Count fills of `order_id` into capture `id`.
    pub fn watch_order(&self, id: &str, order_id: impl Into<String>) -> FeedResult<()> {
        self.shared.feed.lock().captures.watch_order(id, order_id)
    }

    pub fn execution_capture_ids(&self) -> Vec<CaptureId> {
        self.shared.feed.lock().captures.capture_ids()
    }

    /// Messages dropped by handling errors since start.
    pub fn message_errors(&self) -> u64 {
        self.shared.message_errors.load(Ordering::Relaxed)
    }
}
