//! Connection lifecycle integration tests.
//!
//! Tests the supervised lifecycle against a scripted adapter:
//! - Linear backoff schedule and termination at the retry limit
//! - Fail-fast on transport errors and initialization failures
//! - Cancellable backoff on stop
//!
//! Time is paused, so backoffs resolve instantly but measure exactly.

use mdc_conn::{
    BoxFuture, ClientHandle, ConnError, ConnResult, ConnectionConfig, ConnectionManager,
    ConnectionState, TransportAdapter,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Adapter that "connects" instantly and lets the test drive the rest.
struct ScriptedAdapter {
    inits: AtomicUsize,
    init_times: Mutex<Vec<Instant>>,
    init_notify: Notify,
    fail_init: AtomicBool,
    requires_ticker: bool,
    handle: Mutex<Option<ClientHandle>>,
    closes: AtomicUsize,
}

impl ScriptedAdapter {
    fn new() -> Arc<Self> {
        Arc::new(Self::with_ticker_requirement(true))
    }

    fn with_ticker_requirement(requires_ticker: bool) -> Self {
        Self {
            inits: AtomicUsize::new(0),
            init_times: Mutex::new(Vec::new()),
            init_notify: Notify::new(),
            fail_init: AtomicBool::new(false),
            requires_ticker,
            handle: Mutex::new(None),
            closes: AtomicUsize::new(0),
        }
    }

    fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    async fn wait_for_inits(&self, n: usize) {
        loop {
            let notified = self.init_notify.notified();
            if self.inits() >= n {
                return;
            }
            notified.await;
        }
    }

    fn last_init_at(&self) -> Instant {
        *self.init_times.lock().last().expect("no init yet")
    }

    fn handle(&self) -> ClientHandle {
        self.handle.lock().clone().expect("not initialized")
    }
}

impl TransportAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    fn initialize(&self, handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>> {
        Box::pin(async move {
            self.init_times.lock().push(Instant::now());
            *self.handle.lock() = Some(handle.clone());

            let result = if self.fail_init.load(Ordering::SeqCst) {
                Err(ConnError::Transport("connection refused".to_string()))
            } else {
                handle.on_open();
                Ok(())
            };

            self.inits.fetch_add(1, Ordering::SeqCst);
            self.init_notify.notify_waiters();
            result
        })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn requires_ticker(&self) -> bool {
        self.requires_ticker
    }
}

fn spawn_client(
    retry_limit: u32,
    base_interval_ms: u64,
    adapter: Arc<ScriptedAdapter>,
) -> (Arc<ConnectionManager>, JoinHandle<ConnResult<()>>) {
    let config = ConnectionConfig {
        retry_limit,
        base_interval_ms,
    };
    let manager = Arc::new(ConnectionManager::new(config, adapter));
    let manager_clone = manager.clone();
    let task = tokio::spawn(async move { manager_clone.start().await });
    (manager, task)
}

fn assert_elapsed(from: Instant, to: Instant, expected_ms: u64) {
    let elapsed = to - from;
    let expected = Duration::from_millis(expected_ms);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_linear_backoff_until_limit() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    assert_eq!(manager.status(), ConnectionState::Connected);

    // First two disconnects reconnect after 10.1s and 20.1s
    for (n, expected_ms) in [(2, 10_100), (3, 20_100)] {
        let closed_at = Instant::now();
        adapter.handle().on_close();
        adapter.wait_for_inits(n).await;

        assert_elapsed(closed_at, adapter.last_init_at(), expected_ms);
        assert_eq!(manager.status(), ConnectionState::Connected);
    }

    // Third disconnect backs off 30.1s and then gives up
    let closed_at = Instant::now();
    adapter.handle().on_close();
    let result = task.await.unwrap();

    assert!(result.is_ok());
    assert_elapsed(closed_at, Instant::now(), 30_100);
    assert_eq!(adapter.inits(), 3);
    assert_eq!(manager.status(), ConnectionState::Terminated);

    let retry = manager.retry_state();
    assert_eq!(retry.retry_count, 3);
    assert!(!retry.retry_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_on_open_never_counts_as_retry() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 1_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    for _ in 0..5 {
        adapter.handle().on_open();
    }
    assert_eq!(manager.retry_state().retry_count, 0);

    adapter.handle().on_close();
    adapter.wait_for_inits(2).await;
    assert_eq!(manager.retry_state().retry_count, 1);

    manager.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_on_error_terminates_without_backoff() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    let errored_at = Instant::now();
    adapter.handle().on_error("unexpected frame");
    task.await.unwrap().unwrap();

    assert_elapsed(errored_at, Instant::now(), 0);
    assert_eq!(adapter.inits(), 1);
    assert_eq!(manager.retry_state().retry_count, 0);
    assert_eq!(manager.status(), ConnectionState::Terminated);
    // Transport was still up, so the loop tears it down
    assert_eq!(adapter.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_on_error_during_backoff_skips_reconnect() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    adapter.handle().on_close();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    adapter.handle().on_error("reset by peer");
    task.await.unwrap().unwrap();

    assert_eq!(adapter.inits(), 1);
    assert_eq!(manager.retry_state().retry_count, 1);
    assert_eq!(manager.status(), ConnectionState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_initialization_failure_is_not_retried() {
    let adapter = ScriptedAdapter::new();
    adapter.fail_init.store(true, Ordering::SeqCst);
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    let result = task.await.unwrap();

    assert!(matches!(result, Err(ConnError::Transport(_))));
    assert_eq!(adapter.inits(), 1);
    assert_eq!(manager.retry_state().retry_count, 0);
    assert_eq!(manager.status(), ConnectionState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_counts_as_disconnect() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(2, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    adapter.fail_init.store(true, Ordering::SeqCst);

    let closed_at = Instant::now();
    adapter.handle().on_close();
    task.await.unwrap().unwrap();

    // 10.1s before the failed attempt, 20.1s before giving up
    assert_elapsed(closed_at, Instant::now(), 30_200);
    assert_eq!(adapter.inits(), 2);
    assert_eq!(manager.retry_state().retry_count, 2);
    assert_eq!(manager.status(), ConnectionState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_backoff() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    let closed_at = Instant::now();
    adapter.handle().on_close();

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    manager.stop();
    task.await.unwrap().unwrap();

    assert_elapsed(closed_at, Instant::now(), 5_000);
    assert_eq!(adapter.inits(), 1);
    assert_eq!(manager.status(), ConnectionState::Terminated);
    assert!(!manager.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    let second = manager.start().await;
    assert!(matches!(second, Err(ConnError::AlreadyRunning)));

    manager.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_termination_resets_retries() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(1, 1_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    adapter.handle().on_close();
    task.await.unwrap().unwrap();
    assert_eq!(manager.status(), ConnectionState::Terminated);
    assert!(!manager.retry_state().retry_enabled);

    let manager_clone = manager.clone();
    let task = tokio::spawn(async move { manager_clone.start().await });
    adapter.wait_for_inits(2).await;

    let retry = manager.retry_state();
    assert!(retry.retry_enabled);
    assert_eq!(retry.retry_count, 0);
    assert_eq!(manager.status(), ConnectionState::Connected);

    manager.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pre_initialized_adapter_is_available_without_ticker() {
    let adapter = Arc::new(ScriptedAdapter::with_ticker_requirement(false));
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    adapter.wait_for_inits(1).await;
    assert!(manager.is_available());
    assert!(manager.get_ticker().is_none());

    manager.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_poll_prevents_connect() {
    let adapter = ScriptedAdapter::new();
    let (manager, task) = spawn_client(3, 10_000, adapter.clone());

    // The spawned start() has not run yet
    manager.stop();
    task.await.unwrap().unwrap();

    assert_eq!(adapter.inits(), 0);
    assert_eq!(manager.status(), ConnectionState::Terminated);
    assert!(!manager.retry_state().retry_enabled);

    // The stop was consumed; a later start connects normally
    let manager_clone = manager.clone();
    let task = tokio::spawn(async move { manager_clone.start().await });
    adapter.wait_for_inits(1).await;
    assert_eq!(manager.status(), ConnectionState::Connected);

    manager.stop();
    task.await.unwrap().unwrap();
    assert_eq!(adapter.inits(), 1);
}
