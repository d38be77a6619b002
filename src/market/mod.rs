//! Market discovery module
//!
//! Finds the live 15-minute BTC up/down markets in the Gamma catalog,
//! resolves their settlement windows and strikes, and reports resolutions.

mod discovery;
mod gamma;
mod latch;
mod strike;
mod title;

pub use discovery::{MarketDiscovery, MarketRejection, Quote};
pub use gamma::{parse_timestamp, GammaClient, GammaEvent, GammaMarket};
pub use latch::StrikeLatch;
pub use strike::{dollar_amount, extract_strike, StrikeSource};
pub use title::parse_title_window;

use crate::feed::FeedError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An eligible Polymarket BTC binary market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub yes_token: String,
    pub no_token: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_source: WindowSource,
    pub strike_price: Option<f64>,
    pub strike_source: Option<StrikeSource>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub last_trade: Option<Decimal>,
    /// Binary "Up or Down" market with no fixed dollar strike
    pub is_updown: bool,
    /// Minutes left at discovery time
    pub minutes_to_expiry: f64,
}

impl Market {
    /// Time left until settlement
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.window_end - now
    }

    /// Whether `token_id` is one of this market's outcome tokens
    pub fn holds_token(&self, token_id: &str) -> bool {
        self.yes_token == token_id || self.no_token == token_id
    }
}

/// Where the settlement window came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    /// Parsed from the title in exchange-local time
    Title,
    /// Catalog ISO timestamps
    Catalog,
}

/// Resolved side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Yes,
    No,
}

impl Resolution {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Resolution::Yes),
            "no" => Some(Resolution::No),
            _ => None,
        }
    }
}

/// Source of catalog events and market resolutions
#[async_trait]
pub trait MarketCatalog: Send + Sync {
    /// Candidate events of the tracked series
    async fn fetch_events(&self) -> Result<Vec<GammaEvent>, FeedError>;
    /// `Ok(None)` while the market is still open or undecided
    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Resolution>, FeedError>;
}
