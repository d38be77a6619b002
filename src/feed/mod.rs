//! Price feed module
//!
//! Kline streams from Binance, the Coinbase reference ticker, the fear &
//! greed poller, and the rolling candle windows they feed.

mod binance;
mod coinbase;
mod sentiment;
mod types;
mod window;

pub use binance::{BinanceKlineFeed, BinanceRest};
pub use coinbase::CoinbaseTicker;
pub use sentiment::SentimentPoller;
pub use types::{
    Candle, CandleStream, FeedError, FeedEvent, SentimentReading, TickerEvent, Venue,
};
pub use window::CandleWindow;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// REST history and derivatives data of the primary venue
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, FeedError>;

    /// Latest perpetual funding rate as a fraction
    async fn funding_rate(&self, symbol: &str) -> Result<f64, FeedError>;
}

/// A long-lived source of [`FeedEvent`]s.
///
/// `subscribe` spawns the source's own task (with its own reconnect or poll
/// loop) and returns once it is running.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn subscribe(&self, events: mpsc::Sender<FeedEvent>) -> anyhow::Result<()>;
}
