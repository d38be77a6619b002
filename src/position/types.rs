//! Position model

use crate::config::PositionConfig;
use crate::market::{Market, Resolution};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the settlement a position is betting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Holds the YES token
    Up,
    /// Holds the NO token
    Down,
}

impl Direction {
    /// Outcome token to buy for this direction
    pub fn token<'a>(&self, market: &'a Market) -> &'a str {
        match self {
            Direction::Up => &market.yes_token,
            Direction::Down => &market.no_token,
        }
    }

    /// Direction implied by holding `token_id`, if it belongs to `market`
    pub fn for_token(market: &Market, token_id: &str) -> Option<Self> {
        if market.yes_token == token_id {
            Some(Direction::Up)
        } else if market.no_token == token_id {
            Some(Direction::Down)
        } else {
            None
        }
    }

    /// Whether the held side won the settlement
    pub fn wins(&self, resolution: Resolution) -> bool {
        matches!(
            (self, resolution),
            (Direction::Up, Resolution::Yes) | (Direction::Down, Resolution::No)
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("UP"),
            Direction::Down => f.write_str("DOWN"),
        }
    }
}

/// Result of comparing venue holdings with the tracked position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheck {
    /// Tokens are there; manage this many shares
    Held(Decimal),
    /// Balance reads zero but the entry is young enough to be settling
    WithinGrace,
    /// Balance is gone; treat as an implicit exit
    Lost,
}

/// The single open position of a trading mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token_id: String,
    #[serde(default)]
    pub market_id: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    /// Shares held
    pub size: Decimal,
    pub opened_at: DateTime<Utc>,
    /// High-water mark of ROI, percent
    #[serde(default)]
    pub highest_roi: Decimal,
    /// Take-profit price
    pub take_profit: Decimal,
    /// Resting take-profit order on the venue
    #[serde(default)]
    pub take_profit_order: Option<String>,
}

impl Position {
    pub fn open(
        token_id: impl Into<String>,
        market_id: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        size: Decimal,
        opened_at: DateTime<Utc>,
        config: &PositionConfig,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            market_id: market_id.into(),
            direction,
            entry_price,
            size,
            opened_at,
            highest_roi: Decimal::ZERO,
            take_profit: take_profit_level(entry_price, config),
            take_profit_order: None,
        }
    }

    /// ROI in percent at `price`
    pub fn roi(&self, price: Decimal) -> Decimal {
        if self.entry_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price * dec!(100)
    }

    /// Raise the high-water mark; returns whether it moved
    pub fn record_roi(&mut self, roi: Decimal) -> bool {
        if roi > self.highest_roi {
            self.highest_roi = roi;
            true
        } else {
            false
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.opened_at
    }

    /// Cost basis
    pub fn cost(&self) -> Decimal {
        self.entry_price * self.size
    }

    /// PnL of selling `size` shares at `exit_price`
    pub fn realized_pnl(&self, exit_price: Decimal, size: Decimal) -> Decimal {
        (exit_price - self.entry_price) * size
    }

    /// Reconcile a venue balance against this position.
    ///
    /// Balances under `dust` count as zero. A zero balance is tolerated for
    /// `grace` after entry to cover settlement lag.
    pub fn check_balance(
        &self,
        held: Decimal,
        now: DateTime<Utc>,
        grace: Duration,
        dust: Decimal,
    ) -> BalanceCheck {
        if held >= dust {
            BalanceCheck::Held(held)
        } else if self.age(now) < grace {
            BalanceCheck::WithinGrace
        } else {
            BalanceCheck::Lost
        }
    }
}

/// Take-profit price, tiered by entry price
pub fn take_profit_level(entry_price: Decimal, config: &PositionConfig) -> Decimal {
    if entry_price >= config.take_profit_entry_threshold {
        config.take_profit_high
    } else {
        config.take_profit_low
    }
}
