//! CLOB REST client for outcome-token order books
//!
//! Fetches `GET /book?token_id=...` snapshots. Levels arrive as decimal
//! strings in no particular order; [`OrderBook::from_levels`] sorts them.

use super::{BookSource, OrderBook, PriceLevel};
use crate::feed::FeedError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Book snapshot as returned by the CLOB
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Price level in the order book
#[derive(Debug, Deserialize)]
struct BookLevel {
    price: String,
    size: String,
}

/// Public order book endpoint of the Polymarket CLOB
pub struct BookClient {
    base_url: String,
    client: Client,
}

impl BookClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl BookSource for BookClient {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, FeedError> {
        let url = format!("{}/book", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: BookResponse = response.json().await?;
        let book = book_response_to_orderbook(token_id, body);
        tracing::debug!(
            token_id = %book.token_id,
            bid_count = book.bids.len(),
            ask_count = book.asks.len(),
            best_bid = ?book.best_bid(),
            best_ask = ?book.best_ask(),
            "Fetched order book"
        );
        Ok(book)
    }
}

/// Parse a raw `/book` body
pub fn parse_book(token_id: &str, body: &str) -> Result<OrderBook, FeedError> {
    let response: BookResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Decode(e.to_string()))?;
    Ok(book_response_to_orderbook(token_id, response))
}

/// Convert a snapshot into a sorted [`OrderBook`]; unparseable levels are dropped
fn book_response_to_orderbook(token_id: &str, book: BookResponse) -> OrderBook {
    let levels = |raw: Vec<BookLevel>| -> Vec<PriceLevel> {
        raw.into_iter()
            .filter_map(|level| {
                let price = Decimal::from_str(&level.price).ok()?;
                let size = Decimal::from_str(&level.size).ok()?;
                Some(PriceLevel { price, size })
            })
            .collect()
    };

    let token = if book.asset_id.is_empty() {
        token_id.to_string()
    } else {
        book.asset_id
    };
    let mut orderbook = OrderBook::from_levels(token, levels(book.bids), levels(book.asks));

    // Timestamp is milliseconds since epoch
    if let Some(millis) = book.timestamp.and_then(|t| t.parse::<i64>().ok()) {
        if let Some(ts) = Utc.timestamp_millis_opt(millis).single() {
            orderbook.updated_at = ts;
        }
    }
    orderbook
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_book_sorts_levels() {
        let json = r#"{
            "market": "0xabc",
            "asset_id": "123456",
            "bids": [
                {"price": "0.01", "size": "500"},
                {"price": "0.47", "size": "100"},
                {"price": "0.45", "size": "200"}
            ],
            "asks": [
                {"price": "0.99", "size": "500"},
                {"price": "0.50", "size": "150"}
            ],
            "timestamp": "1704067200000",
            "hash": "0xhash"
        }"#;

        let book = parse_book("123456", json).unwrap();
        assert_eq!(book.token_id, "123456");
        assert_eq!(book.best_bid(), Some(dec!(0.47)));
        assert_eq!(book.best_ask(), Some(dec!(0.50)));
        assert_eq!(book.bids.len(), 3);
        assert_eq!(book.updated_at.timestamp_millis(), 1704067200000);
    }

    #[test]
    fn test_parse_book_falls_back_to_requested_token() {
        let book = parse_book("tok", r#"{"bids": [], "asks": []}"#).unwrap();
        assert_eq!(book.token_id, "tok");
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_parse_book_skips_bad_levels() {
        let json = r#"{
            "asset_id": "tok",
            "bids": [{"price": "abc", "size": "10"}, {"price": "0.30", "size": "5"}],
            "asks": [{"price": "0.40", "size": "x"}]
        }"#;
        let book = parse_book("tok", json).unwrap();
        assert_eq!(book.bids.len(), 1);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_parse_book_invalid_json() {
        assert!(matches!(
            parse_book("tok", "not json"),
            Err(FeedError::Decode(_))
        ));
    }
}
