//! Risk management types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakerState {
    /// Entries allowed
    Active,
    /// Entries blocked until `halt_until`
    Halted,
}

/// Daily drawdown bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskState {
    /// Balance the drawdown is measured from
    pub daily_reference_balance: Decimal,
    /// UTC date the reference was last reset
    pub reset_date: Option<NaiveDate>,
    pub halted: bool,
    pub halt_until: Option<DateTime<Utc>>,
    pub realized_pnl_today: Decimal,
}
