//! Execution capture windows.
//!
//! A capture is an open-ended OHLC/volume aggregation over the execution
//! stream, created and removed explicitly by the caller. Every execution
//! fans out to all open captures.

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use mdc_core::{Execution, Price, Size, TakerSide};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Caller-assigned capture identifier.
pub type CaptureId = String;

/// One aggregation window.
///
/// `high`/`low` only ever widen, volumes only ever grow, and `start_time`
/// is set once by the first execution seen after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionCaptureWindow {
    /// Time of the first execution applied to this window.
    pub start_time: Option<DateTime<Utc>>,
    /// Time of the most recent execution applied to this window.
    pub end_time: Option<DateTime<Utc>>,
    pub open: Option<Price>,
    pub high: Option<Price>,
    pub low: Option<Price>,
    pub close: Option<Price>,
    pub buy_volume: Size,
    pub sell_volume: Size,
    /// Quantity matched against watched order ids.
    pub filled: Size,
    /// Executions applied, including ones with an unknown side.
    pub trade_count: u64,
    /// Sum of price * size over sided executions.
    notional: Decimal,
    watched_orders: HashSet<String>,
}

impl ExecutionCaptureWindow {
    /// Create a window seeded from the ticker's last price, if any.
    pub fn new(seed: Option<Price>) -> Self {
        Self {
            start_time: None,
            end_time: None,
            open: seed,
            high: seed,
            low: seed,
            close: seed,
            buy_volume: Size::ZERO,
            sell_volume: Size::ZERO,
            filled: Size::ZERO,
            trade_count: 0,
            notional: Decimal::ZERO,
            watched_orders: HashSet::new(),
        }
    }

    /// Apply one execution.
    pub fn apply(&mut self, exec: &Execution) {
        let px = exec.price;

        if self.start_time.is_none() {
            self.start_time = Some(exec.timestamp);
        }
        self.end_time = Some(exec.timestamp);

        // Unseeded windows open at the first trade
        if self.open.is_none() {
            self.open = Some(px);
        }
        self.high = Some(self.high.map_or(px, |h| h.widen_high(px)));
        self.low = Some(self.low.map_or(px, |l| l.widen_low(px)));
        self.close = Some(px);

        match exec.side {
            TakerSide::Buy => {
                self.buy_volume += exec.size;
                self.notional += exec.size.notional(px);
            }
            TakerSide::Sell => {
                self.sell_volume += exec.size;
                self.notional += exec.size.notional(px);
            }
            TakerSide::Unknown => {}
        }

        // A self-trade matching two watched orders still fills once
        if self.watched_orders.iter().any(|id| exec.matches_order(id)) {
            self.filled += exec.size;
        }

        self.trade_count += 1;
    }

    /// Start counting fills for `order_id`.
    pub fn watch_order(&mut self, order_id: impl Into<String>) {
        self.watched_orders.insert(order_id.into());
    }

    pub fn watches(&self, order_id: &str) -> bool {
        self.watched_orders.contains(order_id)
    }

    pub fn total_volume(&self) -> Size {
        self.buy_volume + self.sell_volume
    }

    /// Volume-weighted average price over sided executions.
    pub fn vwap(&self) -> Option<Price> {
        let volume = self.total_volume();
        if volume.is_zero() {
            return None;
        }
        Some(Price::new(self.notional / volume.inner()))
    }
}

/// Owner of all capture windows for one client.
#[derive(Debug, Default)]
pub struct ExecutionCaptureEngine {
    windows: HashMap<CaptureId, ExecutionCaptureWindow>,
}

impl ExecutionCaptureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window. An existing window with the same id is replaced.
    ///
    /// Returns `true` if a window was replaced.
    pub fn create(&mut self, id: impl Into<CaptureId>, seed: Option<Price>) -> bool {
        let id = id.into();
        let replaced = self
            .windows
            .insert(id.clone(), ExecutionCaptureWindow::new(seed))
            .is_some();
        debug!(capture_id = %id, ?seed, replaced, "Execution capture created");
        replaced
    }

    /// Close a window. Unknown ids are ignored.
    ///
    /// Returns `true` if a window was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.windows.remove(id).is_some();
        if removed {
            debug!(capture_id = %id, "Execution capture removed");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionCaptureWindow> {
        self.windows.get(id)
    }

    /// Register an order id whose fills should accumulate in `id`.
    pub fn watch_order(&mut self, id: &str, order_id: impl Into<String>) -> FeedResult<()> {
        let window = self
            .windows
            .get_mut(id)
            .ok_or_else(|| FeedError::CaptureNotFound(id.to_string()))?;
        window.watch_order(order_id);
        Ok(())
    }

    /// Apply an execution to every open window.
    ///
    /// Invalid executions are rejected before any window changes. Returns
    /// the number of windows updated.
    pub fn ingest(&mut self, exec: &Execution) -> FeedResult<usize> {
        exec.validate()?;
        for window in self.windows.values_mut() {
            window.apply(exec);
        }
        Ok(self.windows.len())
    }

    /// Open capture ids, sorted.
    pub fn capture_ids(&self) -> Vec<CaptureId> {
        let mut ids: Vec<_> = self.windows.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
