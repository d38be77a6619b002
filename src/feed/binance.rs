//! Binance kline stream, REST history and perpetual funding rate

use super::{Candle, CandleStream, FeedError, FeedEvent, HistorySource, MarketFeed};
use crate::telemetry::{increment_counter, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Binance kline stream envelope
#[derive(Debug, Deserialize)]
struct KlineMessage {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "k")]
    kline: KlinePayload,
}

/// Kline body. Prices arrive as strings.
#[derive(Debug, Deserialize)]
struct KlinePayload {
    /// Open time (milliseconds)
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    /// Whether this bar is final
    #[serde(rename = "x")]
    closed: bool,
}

/// Binance WebSocket feed for `<symbol>@kline_<interval>`
pub struct BinanceKlineFeed {
    symbol: String,
    interval: String,
    stream: CandleStream,
    ws_base: String,
    initial_delay: Duration,
    max_delay: Duration,
}

impl BinanceKlineFeed {
    /// Create a new kline feed for the given symbol and interval
    pub fn new(
        ws_base: impl Into<String>,
        symbol: impl Into<String>,
        interval: impl Into<String>,
        stream: CandleStream,
    ) -> Self {
        Self {
            symbol: symbol.into().to_lowercase(),
            interval: interval.into(),
            stream,
            ws_base: ws_base.into(),
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

    fn build_ws_url(&self) -> String {
        format!(
            "{}/{}@kline_{}",
            self.ws_base.trim_end_matches('/'),
            self.symbol,
            self.interval
        )
    }

    /// Parse a kline message into a candle and its closed flag
    fn parse_message(msg: &str) -> Option<(Candle, bool)> {
        let message: KlineMessage = serde_json::from_str(msg).ok()?;
        if message.event_type != "kline" {
            return None;
        }
        let k = message.kline;
        let candle = Candle {
            open_time: Utc.timestamp_millis_opt(k.open_time).single()?,
            open: k.open.parse().ok()?,
            high: k.high.parse().ok()?,
            low: k.low.parse().ok()?,
            close: k.close.parse().ok()?,
            volume: k.volume.parse().ok()?,
        };
        Some((candle, k.closed))
    }

    async fn run_message_loop(
        stream: CandleStream,
        mut ws_rx: mpsc::Receiver<WsMessage>,
        event_tx: mpsc::Sender<FeedEvent>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => {
                    if let Some((candle, closed)) = Self::parse_message(&text) {
                        let event = FeedEvent::Candle {
                            stream,
                            candle,
                            closed,
                        };
                        if event_tx.send(event).await.is_err() {
                            tracing::debug!("Event receiver dropped, stopping kline feed");
                            break;
                        }
                    }
                }
                WsMessage::Connected => {
                    tracing::info!(?stream, "Binance kline feed connected");
                }
                WsMessage::Disconnected => {
                    tracing::warn!(?stream, "Binance kline feed disconnected");
                    break;
                }
                WsMessage::Reconnecting { attempt } => {
                    increment_counter(CounterMetric::FeedReconnects, "binance");
                    tracing::warn!(?stream, attempt, "Binance kline feed reconnecting");
                }
                WsMessage::Binary(_) => {}
            }
        }
    }
}

#[async_trait]
impl MarketFeed for BinanceKlineFeed {
    async fn subscribe(&self, events: mpsc::Sender<FeedEvent>) -> anyhow::Result<()> {
        let url = self.build_ws_url();
        tracing::info!(url = %url, stream = ?self.stream, "Subscribing to Binance klines");

        let config = WsConfig::new(url)
            .max_reconnects(0)
            .backoff(self.initial_delay, self.max_delay);
        let ws_rx = WsClient::new(config).connect();

        let stream = self.stream;
        tokio::spawn(async move {
            Self::run_message_loop(stream, ws_rx, events).await;
        });
        Ok(())
    }
}

/// Premium index response; only the funding rate is consumed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    last_funding_rate: String,
}

/// REST access for history warm-up and funding rate
pub struct BinanceRest {
    client: Client,
    spot_url: String,
    futures_url: String,
}

impl BinanceRest {
    pub fn new(
        spot_url: impl Into<String>,
        futures_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            spot_url: spot_url.into(),
            futures_url: futures_url.into(),
        })
    }

    /// Fetch the most recent `limit` candles, oldest first
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let url = format!("{}/api/v3/klines", self.spot_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_uppercase()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let rows: Vec<Vec<serde_json::Value>> = response.json().await?;
        parse_kline_rows(&rows)
    }

    /// Latest perpetual funding rate as a fraction (0.0001 = 0.01%)
    pub async fn fetch_funding_rate(&self, symbol: &str) -> Result<f64, FeedError> {
        let url = format!(
            "{}/fapi/v1/premiumIndex",
            self.futures_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.to_uppercase())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let index: PremiumIndex = response.json().await?;
        index
            .last_funding_rate
            .parse()
            .map_err(|_| FeedError::Decode(format!("funding rate {}", index.last_funding_rate)))
    }
}

#[async_trait]
impl HistorySource for BinanceRest {
    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, FeedError> {
        self.fetch_klines(symbol, interval, limit).await
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, FeedError> {
        self.fetch_funding_rate(symbol).await
    }
}

/// Decode REST kline rows: `[open_time, open, high, low, close, volume, ...]`
fn parse_kline_rows(rows: &[Vec<serde_json::Value>]) -> Result<Vec<Candle>, FeedError> {
    rows.iter()
        .map(|row| {
            let number = |idx: usize| -> Result<f64, FeedError> {
                let value = row
                    .get(idx)
                    .ok_or_else(|| FeedError::Decode(format!("kline row missing field {idx}")))?;
                match value {
                    serde_json::Value::String(s) => s
                        .parse()
                        .map_err(|_| FeedError::Decode(format!("kline field {idx}: {s}"))),
                    serde_json::Value::Number(n) => n
                        .as_f64()
                        .ok_or_else(|| FeedError::Decode(format!("kline field {idx}"))),
                    other => Err(FeedError::Decode(format!("kline field {idx}: {other}"))),
                }
            };
            let open_ms = row
                .first()
                .and_then(|v| v.as_i64())
                .ok_or_else(|| FeedError::Decode("kline open time".to_string()))?;
            let open_time = Utc
                .timestamp_millis_opt(open_ms)
                .single()
                .ok_or_else(|| FeedError::Decode(format!("kline open time {open_ms}")))?;
            Ok(Candle {
                open_time,
                open: number(1)?,
                high: number(2)?,
                low: number(3)?,
                close: number(4)?,
                volume: number(5)?,
            })
        })
        .collect()
}
