//! Coinbase ticker used as the cross-venue reference price

use super::{FeedEvent, MarketFeed, TickerEvent, Venue};
use crate::telemetry::{increment_counter, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Serialize)]
struct SubscribeMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    product_ids: Vec<&'a str>,
    channels: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(rename = "type")]
    msg_type: String,
    price: Option<String>,
}

/// Coinbase Exchange `ticker` channel for one product
pub struct CoinbaseTicker {
    ws_url: String,
    product: String,
    initial_delay: Duration,
    max_delay: Duration,
}

impl CoinbaseTicker {
    pub fn new(ws_url: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            product: product.into(),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Override the reconnect schedule
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    fn subscribe_message(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&SubscribeMessage {
            msg_type: "subscribe",
            product_ids: vec![self.product.as_str()],
            channels: vec!["ticker"],
        })?)
    }

    fn parse_message(msg: &str) -> Option<TickerEvent> {
        let ticker: TickerMessage = serde_json::from_str(msg).ok()?;
        if ticker.msg_type != "ticker" {
            return None;
        }
        let price: f64 = ticker.price?.parse().ok()?;
        if price <= 0.0 {
            return None;
        }
        Some(TickerEvent {
            venue: Venue::Coinbase,
            price,
            timestamp: Utc::now(),
        })
    }

    async fn run_message_loop(
        mut ws_rx: mpsc::Receiver<WsMessage>,
        event_tx: mpsc::Sender<FeedEvent>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => {
                    if let Some(tick) = Self::parse_message(&text) {
                        if event_tx.send(FeedEvent::Ticker(tick)).await.is_err() {
                            break;
                        }
                    }
                }
                WsMessage::Connected => tracing::info!("Coinbase ticker connected"),
                WsMessage::Disconnected => {
                    tracing::warn!("Coinbase ticker disconnected");
                    break;
                }
                WsMessage::Reconnecting { attempt } => {
                    increment_counter(CounterMetric::FeedReconnects, "coinbase");
                    tracing::debug!(attempt, "Coinbase ticker reconnecting");
                }
                WsMessage::Binary(_) => {}
            }
        }
    }
}

#[async_trait]
impl MarketFeed for CoinbaseTicker {
    async fn subscribe(&self, events: mpsc::Sender<FeedEvent>) -> anyhow::Result<()> {
        let config = WsConfig::new(self.ws_url.clone())
            .subscribe(self.subscribe_message()?)
            .max_reconnects(0)
            .backoff(self.initial_delay, self.max_delay);
        let ws_rx = WsClient::new(config).connect();

        tokio::spawn(async move {
            Self::run_message_loop(ws_rx, events).await;
        });
        Ok(())
    }
}
