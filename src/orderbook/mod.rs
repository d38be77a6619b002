//! Order book module
//!
//! Best bid/ask view of outcome-token books

mod book;
mod client;

pub use book::OrderBook;
pub use client::{parse_book, BookClient};

use crate::feed::FeedError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}

/// Anything that can produce a current book for a token
#[async_trait]
pub trait BookSource: Send + Sync {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, FeedError>;
}
