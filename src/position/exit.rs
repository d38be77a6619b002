//! Exit policy
//!
//! Hard stop, ATR-scaled trailing stop, take-profit and the hedge-flip
//! check. All ROI values are percent.

use super::{Direction, Position};
use crate::config::{PositionConfig, StrategyConfig};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    HardStop,
    TrailingStop,
    TakeProfit,
    /// Probability crossed into the opposite conviction zone
    HedgeFlip,
    /// Paper position settled at market resolution
    Resolution,
    /// Venue balance vanished after the grace period
    BalanceLost,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::HardStop => "hard_stop",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::HedgeFlip => "hedge_flip",
            ExitReason::Resolution => "resolution",
            ExitReason::BalanceLost => "balance_lost",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless exit rules
#[derive(Debug, Clone)]
pub struct ExitPolicy {
    pub hard_stop_pct: Decimal,
    pub trail_activation_pct: Decimal,
    pub trail_min_pct: Decimal,
    pub trail_max_pct: Decimal,
    pub atr_multiplier: Decimal,
    pub hedge_exit_long: f64,
    pub hedge_exit_short: f64,
}

impl ExitPolicy {
    pub fn from_config(config: &PositionConfig) -> Self {
        Self {
            hard_stop_pct: config.hard_stop_pct,
            trail_activation_pct: config.trail_activation_pct,
            trail_min_pct: config.trail_min_pct,
            trail_max_pct: config.trail_max_pct,
            atr_multiplier: config.atr_multiplier,
            hedge_exit_long: config.hedge_exit_long,
            hedge_exit_short: config.hedge_exit_short,
        }
    }

    /// Trailing distance in ROI points.
    ///
    /// `atr_multiplier * ATR%` of the reference price, clamped to
    /// `[trail_min_pct, trail_max_pct]`. Without a usable ATR the minimum
    /// applies.
    pub fn trail_distance(&self, atr: f64, reference_price: f64) -> Decimal {
        let scaled = if atr > 0.0 && reference_price > 0.0 {
            Decimal::from_f64(atr / reference_price * 100.0)
                .map(|atr_pct| self.atr_multiplier * atr_pct)
                .unwrap_or(self.trail_min_pct)
        } else {
            self.trail_min_pct
        };
        scaled.max(self.trail_min_pct).min(self.trail_max_pct)
    }

    /// Price-driven exit for `position` marked at `bid`, checked in order:
    /// hard stop, trailing stop, take-profit.
    ///
    /// `highest_roi` must already include the current ROI. The take-profit
    /// level is only watched here while no take-profit order rests on the
    /// venue.
    pub fn evaluate(&self, position: &Position, bid: Decimal, trail: Decimal) -> Option<ExitReason> {
        let roi = position.roi(bid);
        if roi <= self.hard_stop_pct {
            return Some(ExitReason::HardStop);
        }
        if position.highest_roi >= self.trail_activation_pct
            && roi <= position.highest_roi - trail
        {
            return Some(ExitReason::TrailingStop);
        }
        if position.take_profit_order.is_none() && bid >= position.take_profit {
            return Some(ExitReason::TakeProfit);
        }
        None
    }

    /// Whether `probability` has flipped against the held direction
    pub fn should_hedge(&self, direction: Direction, probability: f64) -> bool {
        match direction {
            Direction::Up => probability <= self.hedge_exit_long,
            Direction::Down => probability >= self.hedge_exit_short,
        }
    }
}

/// What the fused probability asks for while flat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySignal {
    Long,
    Short,
    None,
}

impl EntrySignal {
    pub fn from_probability(probability: f64, strategy: &StrategyConfig) -> Self {
        if probability >= strategy.buy_threshold {
            EntrySignal::Long
        } else if probability <= strategy.short_threshold {
            EntrySignal::Short
        } else {
            EntrySignal::None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntrySignal::Long => "LONG",
            EntrySignal::Short => "SHORT",
            EntrySignal::None => "NEUTRAL",
        }
    }
}
