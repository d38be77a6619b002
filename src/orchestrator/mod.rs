//! Orchestrator module
//!
//! Wires the long-lived feed tasks into the engine actor and publishes a
//! status snapshot after every decision cycle.

mod engine;
mod status;

pub use engine::{Engine, EngineContext};
pub use status::{
    format_time_left, short_term_deltas, IndicatorStatus, MarketStatus, PositionSummary,
    StatusSnapshot,
};

use crate::config::FeedConfig;
use crate::feed::{
    BinanceKlineFeed, CandleStream, CoinbaseTicker, FeedEvent, MarketFeed, SentimentPoller,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Engine inbox depth
pub const EVENT_BUFFER: usize = 1024;

/// Start every feed task, all sending into `events`
pub async fn spawn_feeds(config: &FeedConfig, events: mpsc::Sender<FeedEvent>) -> anyhow::Result<()> {
    let initial = Duration::from_millis(config.reconnect_initial_ms);
    let max = Duration::from_secs(config.reconnect_max_secs);

    let feeds: Vec<Box<dyn MarketFeed>> = vec![
        Box::new(
            BinanceKlineFeed::new(
                &config.binance_ws_url,
                &config.symbol,
                &config.primary_interval,
                CandleStream::Primary,
            )
            .with_backoff(initial, max),
        ),
        Box::new(
            BinanceKlineFeed::new(
                &config.binance_ws_url,
                &config.symbol,
                &config.secondary_interval,
                CandleStream::Secondary,
            )
            .with_backoff(initial, max),
        ),
        Box::new(
            CoinbaseTicker::new(&config.coinbase_ws_url, &config.coinbase_product)
                .with_backoff(initial, max),
        ),
        Box::new(SentimentPoller::new(
            &config.sentiment_url,
            Duration::from_secs(config.sentiment_interval_secs),
            Duration::from_secs(config.request_timeout_secs),
        )?),
    ];

    for feed in &feeds {
        feed.subscribe(events.clone()).await?;
    }
    tracing::info!(feeds = feeds.len(), "Feed tasks started");
    Ok(())
}
