//! Main application orchestration.
//!
//! Runs one supervised client and polls its health into metrics until the
//! client terminates or a shutdown signal arrives.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::replay::ReplayAdapter;
use mdc_conn::{ConnectionManager, DynTransportAdapter};
use mdc_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    manager: Arc<ConnectionManager>,
    captures_opened: bool,
}

impl Application {
    /// Create an application replaying the configured file.
    pub fn new(config: AppConfig) -> Self {
        let adapter: DynTransportAdapter = Arc::new(ReplayAdapter::new(&config.replay));
        Self::with_adapter(config, adapter)
    }

    /// Create an application around any transport adapter.
    pub fn with_adapter(config: AppConfig, adapter: DynTransportAdapter) -> Self {
        let manager = Arc::new(ConnectionManager::new(config.connection.clone(), adapter));
        Self {
            config,
            manager,
            captures_opened: false,
        }
    }

    pub fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Run until the client terminates or Ctrl+C.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            retry_limit = self.config.connection.retry_limit,
            base_interval_ms = self.config.connection.base_interval_ms,
            captures = self.config.captures.len(),
            "Application starting"
        );

        let runner = self.manager.clone();
        let mut client = tokio::spawn(async move { runner.start().await });

        let mut poll_interval =
            tokio::time::interval(Duration::from_millis(self.config.telemetry.poll_interval_ms));

        let result = loop {
            tokio::select! {
                joined = &mut client => {
                    break joined;
                }

                _ = poll_interval.tick() => {
                    self.poll()?;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    self.manager.stop();
                }
            }
        };

        self.poll()?;
        self.report_captures();
        debug!(metrics = %Metrics::gather_text()?, "Final metrics");

        result??;
        info!("Application stopped");
        Ok(())
    }

    /// Publish client health and open configured captures once available.
    pub fn poll(&mut self) -> AppResult<()> {
        if !self.captures_opened && self.manager.is_available() {
            self.open_captures()?;
        }
        publish_metrics(&self.manager);
        Ok(())
    }

    fn open_captures(&mut self) -> AppResult<()> {
        for capture in &self.config.captures {
            self.manager.create_execution_capture(capture.id.as_str());
            for order_id in &capture.watch_orders {
                self.manager.watch_order(&capture.id, order_id.as_str())?;
            }
            info!(
                capture_id = %capture.id,
                watched_orders = capture.watch_orders.len(),
                "Execution capture opened"
            );
        }
        self.captures_opened = true;
        Ok(())
    }

    fn report_captures(&self) {
        for id in self.manager.execution_capture_ids() {
            let Some(window) = self.manager.get_execution_capture(&id) else {
                continue;
            };
            match (window.open, window.high, window.low, window.close) {
                (Some(open), Some(high), Some(low), Some(close)) => info!(
                    capture_id = %id,
                    %open,
                    %high,
                    %low,
                    %close,
                    buy_volume = %window.buy_volume,
                    sell_volume = %window.sell_volume,
                    filled = %window.filled,
                    trades = window.trade_count,
                    "Execution capture summary"
                ),
                _ => warn!(capture_id = %id, "Execution capture saw no prices"),
            }
        }
    }
}

fn publish_metrics(manager: &ConnectionManager) {
    Metrics::connection_state_set(&manager.status().to_string());
    Metrics::available_set(manager.is_available());
    Metrics::retry_count_set(manager.retry_state().retry_count);
    Metrics::latency(manager.get_latency());
    Metrics::data_age("message", manager.ms_since_last_message());
    Metrics::data_age("ticker", manager.ms_since_last_ticker());
    Metrics::data_age("execution", manager.ms_since_last_execution());
    Metrics::message_errors_observed(manager.message_errors());
    Metrics::open_captures_set(manager.execution_capture_ids().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use mdc_conn::{BoxFuture, ClientHandle, ConnResult, ConnectionState, TransportAdapter};
    use mdc_core::{Execution, Price, Size, TakerSide};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    /// Adapter that connects instantly and hands its handle to the test.
    #[derive(Default)]
    struct InstantAdapter {
        handle: Mutex<Option<ClientHandle>>,
    }

    impl TransportAdapter for InstantAdapter {
        fn name(&self) -> &str {
            "instant"
        }

        fn initialize(&self, handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>> {
            Box::pin(async move {
                handle.on_open();
                *self.handle.lock() = Some(handle);
                Ok(())
            })
        }

        fn close(&self) {}

        fn requires_ticker(&self) -> bool {
            false
        }
    }

    fn config_with_capture() -> AppConfig {
        let mut config = AppConfig::default();
        config.captures.push(CaptureConfig {
            id: "session".to_string(),
            watch_orders: vec!["o-1".to_string()],
        });
        config
    }

    #[tokio::test]
    async fn test_captures_open_once_available() {
        let adapter = Arc::new(InstantAdapter::default());
        let mut app = Application::with_adapter(config_with_capture(), adapter.clone());
        let manager = app.manager();

        app.poll().unwrap();
        assert!(manager.execution_capture_ids().is_empty());

        let runner = manager.clone();
        let client = tokio::spawn(async move { runner.start().await });
        while manager.status() != ConnectionState::Connected {
            tokio::task::yield_now().await;
        }

        app.poll().unwrap();
        assert_eq!(manager.execution_capture_ids(), vec!["session".to_string()]);

        let handle = adapter.handle.lock().clone().unwrap();
        let exec = Execution::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            Price::new(dec!(100)),
            Size::new(dec!(3)),
            TakerSide::Buy,
        )
        .with_order_ids(Some("o-1".to_string()), None);
        handle.on_execution(&exec).unwrap();

        let window = manager.get_execution_capture("session").unwrap();
        assert_eq!(window.filled, Size::new(dec!(3)));

        manager.stop();
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_after_client_terminates() {
        let adapter = Arc::new(InstantAdapter::default());
        let app = Application::with_adapter(config_with_capture(), adapter.clone());
        let manager = app.manager();

        let run = tokio::spawn(app.run());
        while adapter.handle.lock().is_none() {
            tokio::task::yield_now().await;
        }
        adapter
            .handle
            .lock()
            .clone()
            .unwrap()
            .on_error("fatal transport error");

        run.await.unwrap().unwrap();
        assert_eq!(manager.status(), ConnectionState::Terminated);
    }
}
