//! Normalized market data events.
//!
//! Exchange adapters translate their wire messages into these shapes.
//! Source timestamps have second resolution; everything derived from them
//! (latency, elapsed) is expressed in milliseconds.

use crate::error::{CoreError, Result};
use crate::{Price, Size};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Taker side of a matched trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    Buy,
    Sell,
    /// Side tag the adapter could not map. Still moves prices, never volume.
    #[serde(other)]
    Unknown,
}

impl TakerSide {
    /// Map an exchange side tag ("buy", "SELL", ...) to a taker side.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("buy") {
            Self::Buy
        } else if tag.eq_ignore_ascii_case("sell") {
            Self::Sell
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for TakerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalized ticker event as delivered by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Event time at the source.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Last traded price.
    pub last_price: Price,
    /// Best ask price.
    pub best_ask_price: Price,
    /// Best bid price.
    pub best_bid_price: Price,
    /// Best ask size.
    pub best_ask_size: Size,
    /// Best bid size.
    pub best_bid_size: Size,
}

impl Ticker {
    /// Reject tickers that would poison downstream state.
    pub fn validate(&self) -> Result<()> {
        if !self.last_price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "last price {} is not positive",
                self.last_price
            )));
        }
        if self.best_ask_price.inner().is_sign_negative() {
            return Err(CoreError::InvalidPrice(format!(
                "ask price {} is negative",
                self.best_ask_price
            )));
        }
        if self.best_bid_price.inner().is_sign_negative() {
            return Err(CoreError::InvalidPrice(format!(
                "bid price {} is negative",
                self.best_bid_price
            )));
        }
        if self.best_ask_size.is_negative() || self.best_bid_size.is_negative() {
            return Err(CoreError::InvalidSize(format!(
                "book sizes must not be negative (ask={}, bid={})",
                self.best_ask_size, self.best_bid_size
            )));
        }
        Ok(())
    }
}

/// Cached ticker with the latency observed when it was saved.
///
/// Replaced wholesale on every ticker; never mutated in place. The latency
/// is derived from the receipt time and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerSnapshot {
    pub timestamp: DateTime<Utc>,
    pub last_price: Price,
    pub best_ask_price: Price,
    pub best_bid_price: Price,
    pub best_ask_size: Size,
    pub best_bid_size: Size,
    latency_ms: i64,
}

impl TickerSnapshot {
    /// Freeze a ticker, computing latency against the local receipt time.
    ///
    /// Latency may be negative when the source clock runs ahead of ours.
    pub fn capture(ticker: Ticker, received_at: DateTime<Utc>) -> Self {
        let latency_ms = received_at.timestamp_millis() - ticker.timestamp.timestamp_millis();
        Self {
            timestamp: ticker.timestamp,
            last_price: ticker.last_price,
            best_ask_price: ticker.best_ask_price,
            best_bid_price: ticker.best_bid_price,
            best_ask_size: ticker.best_ask_size,
            best_bid_size: ticker.best_bid_size,
            latency_ms,
        }
    }

    /// Milliseconds between the source timestamp and local receipt.
    pub fn latency_ms(&self) -> i64 {
        self.latency_ms
    }

    /// Ask minus bid.
    pub fn spread(&self) -> Price {
        self.best_ask_price - self.best_bid_price
    }
}

/// Normalized trade execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Trade time at the source.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub price: Price,
    pub size: Size,
    pub side: TakerSide,
    /// Buy-side order id, when the exchange exposes order matching.
    #[serde(default)]
    pub buy_order_id: Option<String>,
    /// Sell-side order id, when the exchange exposes order matching.
    #[serde(default)]
    pub sell_order_id: Option<String>,
}

impl Execution {
    /// Create an execution without order-matching identifiers.
    pub fn new(timestamp: DateTime<Utc>, price: Price, size: Size, side: TakerSide) -> Self {
        Self {
            timestamp,
            price,
            size,
            side,
            buy_order_id: None,
            sell_order_id: None,
        }
    }

    /// Attach order-matching identifiers.
    #[must_use]
    pub fn with_order_ids(
        mut self,
        buy_order_id: Option<String>,
        sell_order_id: Option<String>,
    ) -> Self {
        self.buy_order_id = buy_order_id;
        self.sell_order_id = sell_order_id;
        self
    }

    /// Whether either side of this trade belongs to `order_id`.
    pub fn matches_order(&self, order_id: &str) -> bool {
        self.buy_order_id.as_deref() == Some(order_id)
            || self.sell_order_id.as_deref() == Some(order_id)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "execution price {} is not positive",
                self.price
            )));
        }
        if self.size.is_negative() {
            return Err(CoreError::InvalidSize(format!(
                "execution size {} is negative",
                self.size
            )));
        }
        Ok(())
    }
}

/// Any normalized event an adapter can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedEvent {
    Ticker(Ticker),
    Execution(Execution),
}

impl FeedEvent {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ticker(_) => "ticker",
            Self::Execution(_) => "execution",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn ticker() -> Ticker {
        Ticker {
            timestamp: ts(1_700_000_000),
            last_price: Price::new(dec!(100)),
            best_ask_price: Price::new(dec!(101)),
            best_bid_price: Price::new(dec!(99)),
            best_ask_size: Size::new(dec!(2)),
            best_bid_size: Size::new(dec!(3)),
        }
    }

    #[test]
    fn test_taker_side_from_tag() {
        assert_eq!(TakerSide::from_tag("buy"), TakerSide::Buy);
        assert_eq!(TakerSide::from_tag("SELL"), TakerSide::Sell);
        assert_eq!(TakerSide::from_tag("bid"), TakerSide::Unknown);
    }

    #[test]
    fn test_snapshot_latency() {
        let received = ts(1_700_000_000) + chrono::Duration::milliseconds(250);
        let snap = TickerSnapshot::capture(ticker(), received);

        assert_eq!(snap.latency_ms(), 250);
        assert_eq!(snap.spread(), Price::new(dec!(2)));
    }

    #[test]
    fn test_snapshot_latency_clock_skew() {
        // Source clock ahead of ours by 400ms
        let received = ts(1_700_000_000) - chrono::Duration::milliseconds(400);
        let snap = TickerSnapshot::capture(ticker(), received);

        assert_eq!(snap.latency_ms(), -400);
    }

    #[test]
    fn test_ticker_validation() {
        assert!(ticker().validate().is_ok());

        let mut bad = ticker();
        bad.last_price = Price::ZERO;
        assert!(matches!(bad.validate(), Err(CoreError::InvalidPrice(_))));

        let mut bad = ticker();
        bad.best_bid_size = Size::new(dec!(-1));
        assert!(matches!(bad.validate(), Err(CoreError::InvalidSize(_))));
    }

    #[test]
    fn test_execution_order_matching() {
        let exec = Execution::new(
            ts(1_700_000_000),
            Price::new(dec!(100)),
            Size::new(dec!(1)),
            TakerSide::Buy,
        )
        .with_order_ids(Some("b-1".to_string()), Some("s-9".to_string()));

        assert!(exec.matches_order("b-1"));
        assert!(exec.matches_order("s-9"));
        assert!(!exec.matches_order("x"));
    }

    #[test]
    fn test_feed_event_json() {
        let json = r#"{"type":"execution","timestamp":1700000000,"price":"105","size":"2","side":"buy"}"#;
        let event: FeedEvent = serde_json::from_str(json).unwrap();

        match event {
            FeedEvent::Execution(exec) => {
                assert_eq!(exec.price, Price::new(dec!(105)));
                assert_eq!(exec.side, TakerSide::Buy);
                assert!(exec.buy_order_id.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_side_tag_deserializes() {
        let json = r#"{"type":"execution","timestamp":1700000000,"price":"1","size":"1","side":"cross"}"#;
        let event: FeedEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            FeedEvent::Execution(Execution {
                side: TakerSide::Unknown,
                ..
            })
        ));
    }
}
