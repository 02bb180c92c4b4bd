//! File replay adapter.
//!
//! Replays a JSON-lines file of normalized [`FeedEvent`]s through the
//! adapter contract: `initialize` opens the file, `subscribe` reports
//! `on_open` and starts reading, one `handle_event` per line, `on_close`
//! at end of file. Each reconnect replays the file from the start.

use crate::config::ReplayConfig;
use mdc_conn::{BoxFuture, ClientHandle, ConnError, ConnResult, TransportAdapter};
use mdc_core::FeedEvent;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const ADAPTER_NAME: &str = "replay";

/// Transport adapter backed by a local JSON-lines file.
pub struct ReplayAdapter {
    path: PathBuf,
    line_delay: Duration,
    requires_ticker: bool,
    /// Opened by `initialize`, consumed by `subscribe`.
    pending: Mutex<Option<File>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayAdapter {
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            path: config.path.clone(),
            line_delay: Duration::from_millis(config.line_delay_ms),
            requires_ticker: config.requires_ticker,
            pending: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    fn abort_reader(&self) -> bool {
        match self.reader.lock().take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl TransportAdapter for ReplayAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    fn initialize(&self, _handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>> {
        Box::pin(async move {
            self.abort_reader();

            let file = File::open(&self.path)
                .await
                .map_err(|e| ConnError::Initialization {
                    adapter: ADAPTER_NAME.to_string(),
                    reason: format!("{}: {e}", self.path.display()),
                })?;
            info!(path = %self.path.display(), "Replay source opened");
            *self.pending.lock() = Some(file);
            Ok(())
        })
    }

    fn subscribe(&self, handle: ClientHandle) -> BoxFuture<'_, ConnResult<()>> {
        Box::pin(async move {
            let file = self.pending.lock().take().ok_or_else(|| {
                ConnError::Transport("subscribe before initialize".to_string())
            })?;
            handle.on_open();

            let task = tokio::spawn(replay_lines(
                BufReader::new(file),
                handle,
                self.line_delay,
            ));
            *self.reader.lock() = Some(task);
            Ok(())
        })
    }

    fn close(&self) {
        if self.abort_reader() {
            debug!(path = %self.path.display(), "Replay reader stopped");
        }
    }

    fn requires_ticker(&self) -> bool {
        self.requires_ticker
    }
}

async fn replay_lines(reader: BufReader<File>, handle: ClientHandle, line_delay: Duration) {
    // Byte segments, so a line that is not UTF-8 fails alone in the decoder
    let mut lines = reader.split(b'\n');
    let mut replayed = 0u64;

    loop {
        match lines.next_segment().await {
            Ok(Some(line)) => {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<FeedEvent>(&line) {
                    Ok(event) => handle.handle_event(event),
                    Err(e) => {
                        handle.on_message();
                        handle.on_message_error("decode", e);
                    }
                }
                replayed += 1;
                if !line_delay.is_zero() {
                    tokio::time::sleep(line_delay).await;
                }
            }
            Ok(None) => {
                info!(replayed, "Replay source exhausted");
                handle.on_close();
                return;
            }
            Err(e) => {
                handle.on_error(e);
                return;
            }
        }
    }
}
