//! Daily drawdown circuit breaker

use super::{BreakerState, RiskState};
use crate::config::RiskConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Tracks the daily reference balance and halts entries on drawdown.
///
/// Only the entry path consults the breaker; managing an open position
/// continues while halted.
#[derive(Debug, Clone)]
pub struct RiskManager {
    max_daily_loss_pct: Decimal,
    halt_duration: Duration,
    state: RiskState,
}

impl RiskManager {
    pub fn new(max_daily_loss_pct: Decimal, halt_duration: Duration) -> Self {
        Self {
            max_daily_loss_pct,
            halt_duration,
            state: RiskState::default(),
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(
            config.max_daily_loss_pct,
            Duration::hours(config.halt_duration_hours),
        )
    }

    /// Run the breaker against the current account value.
    pub fn check(&mut self, balance: Decimal, now: DateTime<Utc>) -> BreakerState {
        let today = now.date_naive();
        if self.state.reset_date != Some(today) {
            if self.state.reset_date.is_some() {
                info!(%balance, date = %today, "New trading day, resetting risk reference");
            }
            self.state.reset_date = Some(today);
            self.state.daily_reference_balance = balance;
            self.state.realized_pnl_today = Decimal::ZERO;
            self.state.halted = false;
            self.state.halt_until = None;
        }

        if self.state.halted {
            match self.state.halt_until {
                Some(until) if now <= until => return BreakerState::Halted,
                _ => {
                    info!(%balance, "Halt window elapsed, resuming with new reference");
                    self.state.halted = false;
                    self.state.halt_until = None;
                    self.state.daily_reference_balance = balance;
                }
            }
        }

        let drawdown = self.drawdown(balance);
        if drawdown >= self.max_daily_loss_pct {
            let until = now + self.halt_duration;
            warn!(
                %drawdown,
                reference = %self.state.daily_reference_balance,
                %balance,
                halt_until = %until,
                "Daily loss limit hit, halting entries"
            );
            self.state.halted = true;
            self.state.halt_until = Some(until);
            return BreakerState::Halted;
        }

        BreakerState::Active
    }

    /// Fractional drawdown of `balance` from the daily reference
    pub fn drawdown(&self, balance: Decimal) -> Decimal {
        let reference = self.state.daily_reference_balance;
        if reference <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (reference - balance) / reference
    }

    /// Record realized PnL from a settled trade
    pub fn record_pnl(&mut self, pnl: Decimal) {
        self.state.realized_pnl_today += pnl;
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }
}
