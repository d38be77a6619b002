//! Risk management module
//!
//! Kelly position sizing and the daily drawdown circuit breaker

mod circuit_breaker;
mod kelly;
mod types;

pub use circuit_breaker::RiskManager;
pub use kelly::KellyEngine;
pub use types::{BreakerState, RiskState};
