//! Price feed types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Which rolling window a candle stream feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleStream {
    /// Settlement-interval candles driving the indicators
    Primary,
    /// Fine-granularity candles for short-horizon deltas
    Secondary,
}

/// Reference venue for auxiliary tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Coinbase,
}

/// Auxiliary ticker update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    pub venue: Venue,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fear & greed reading (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub value: u8,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the long-lived stream tasks deliver to the engine
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Candle {
        stream: CandleStream,
        candle: Candle,
        closed: bool,
    },
    Ticker(TickerEvent),
    Sentiment(SentimentReading),
}

/// Transient feed failures. Logged; the cycle is skipped and retried.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Malformed payload: {0}")]
    Decode(String),
}
