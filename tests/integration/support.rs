//! Shared fakes for the integration tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use poly_updown::feed::{Candle, FeedError, HistorySource};
use poly_updown::market::{GammaEvent, MarketCatalog, Resolution};
use poly_updown::orderbook::{BookSource, OrderBook, PriceLevel};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;

/// 11:05 ET on March 5th, five minutes into the 11:00-11:15 window
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 5, 16, 5, 0).unwrap()
}

pub const QUESTION: &str = "Bitcoin Up or Down - March 5, 11:00AM-11:15AM ET";

/// Catalog payload with one live up/down market and one unrelated market
pub fn events_fixture() -> Vec<GammaEvent> {
    serde_json::from_str(
        r#"[
            {
                "title": "Bitcoin Up or Down - March 5, 11AM ET",
                "eventStartTime": "2025-03-05T16:00:00Z",
                "markets": [
                    {
                        "id": "512",
                        "question": "Bitcoin Up or Down - March 5, 11:00AM-11:15AM ET",
                        "clobTokenIds": "[\"yes-512\", \"no-512\"]",
                        "outcomePrices": "[\"0.5\", \"0.5\"]",
                        "endDate": "2025-03-05T16:15:00Z",
                        "bestBid": 0.48,
                        "bestAsk": "0.52"
                    },
                    {
                        "id": "513",
                        "question": "Ethereum Up or Down - March 5, 11:00AM-11:15AM ET",
                        "clobTokenIds": "[\"yes-513\", \"no-513\"]",
                        "endDate": "2025-03-05T16:15:00Z"
                    }
                ]
            },
            {
                "title": "Bitcoin Up or Down - March 5, 11:15AM ET",
                "eventStartTime": "2025-03-05T16:15:00Z",
                "markets": [
                    {
                        "id": "514",
                        "question": "Bitcoin Up or Down - March 5, 11:15AM-11:30AM ET",
                        "clobTokenIds": "[\"yes-514\", \"no-514\"]",
                        "endDate": "2025-03-05T16:30:00Z"
                    }
                ]
            }
        ]"#,
    )
    .unwrap()
}

/// Accelerating 15-minute uptrend starting at midnight UTC
pub fn rising_candles(count: usize, base: f64) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let x = i as f64;
            let close = base + x * 10.0 + x * x * 0.5;
            Candle {
                open_time: start + Duration::minutes(15 * i as i64),
                open: close - 5.0,
                high: close + 5.0,
                low: close - 10.0,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

pub struct FakeCatalog {
    pub events: Vec<GammaEvent>,
    pub resolutions: Mutex<HashMap<String, Resolution>>,
}

impl FakeCatalog {
    pub fn new(events: Vec<GammaEvent>) -> Self {
        Self {
            events,
            resolutions: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, market_id: &str, resolution: Resolution) {
        self.resolutions
            .lock()
            .unwrap()
            .insert(market_id.to_string(), resolution);
    }
}

#[async_trait]
impl MarketCatalog for FakeCatalog {
    async fn fetch_events(&self) -> Result<Vec<GammaEvent>, FeedError> {
        Ok(self.events.clone())
    }

    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Resolution>, FeedError> {
        Ok(self.resolutions.lock().unwrap().get(market_id).copied())
    }
}

/// Same two-sided book for every token, bids adjustable per token
pub struct FakeBooks {
    pub bid: Decimal,
    pub ask: Decimal,
    pub overrides: Mutex<HashMap<String, (Decimal, Decimal)>>,
}

impl FakeBooks {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid,
            ask,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, token_id: &str, bid: Decimal, ask: Decimal) {
        self.overrides
            .lock()
            .unwrap()
            .insert(token_id.to_string(), (bid, ask));
    }
}

#[async_trait]
impl BookSource for FakeBooks {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, FeedError> {
        let (bid, ask) = self
            .overrides
            .lock()
            .unwrap()
            .get(token_id)
            .copied()
            .unwrap_or((self.bid, self.ask));
        Ok(OrderBook::from_levels(
            token_id,
            vec![PriceLevel {
                price: bid,
                size: dec!(200),
            }],
            vec![PriceLevel {
                price: ask,
                size: dec!(200),
            }],
        ))
    }
}

pub struct FakeHistory {
    pub primary: Vec<Candle>,
    pub secondary: Vec<Candle>,
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn klines(&self, _symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, FeedError> {
        let candles = if interval == "15m" {
            &self.primary
        } else {
            &self.secondary
        };
        let skip = candles.len().saturating_sub(limit);
        Ok(candles[skip..].to_vec())
    }

    async fn funding_rate(&self, _symbol: &str) -> Result<f64, FeedError> {
        Err(FeedError::Decode("funding endpoint unavailable".to_string()))
    }
}
