//! Persisted record types

use crate::execution::OrderSide;
use crate::position::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Persistence failures. Logged at the call site; never fatal to the loop.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid stored value for {key}: {value}")]
    Invalid { key: String, value: String },
    #[error("Store worker failed: {0}")]
    Worker(String),
}

/// Trade outcome. `Pending` moves to a terminal value exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Flat,
    Pending,
}

impl Outcome {
    /// Classify a realized PnL
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            Outcome::Win
        } else if pnl < Decimal::ZERO {
            Outcome::Loss
        } else {
            Outcome::Flat
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Win => "WIN",
            Outcome::Loss => "LOSS",
            Outcome::Flat => "FLAT",
            Outcome::Pending => "PENDING",
        };
        f.write_str(s)
    }
}

/// One row of the append-only trade log.
///
/// Entries are logged `Pending` and settled against the market resolution
/// of the held side; exits carry their PnL classification immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub token_id: String,
    pub direction: Direction,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub realized_pnl: Decimal,
    pub is_paper: bool,
    pub outcome: Outcome,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        market_id: impl Into<String>,
        token_id: impl Into<String>,
        direction: Direction,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
        realized_pnl: Decimal,
        is_paper: bool,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            market_id: market_id.into(),
            token_id: token_id.into(),
            direction,
            side,
            price,
            size,
            realized_pnl,
            is_paper,
            outcome,
        }
    }
}

/// One row of the decision-cycle signal log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub probability: f64,
    /// LONG, SHORT or NEUTRAL
    pub label: String,
    #[serde(default)]
    pub market_id: Option<String>,
}
