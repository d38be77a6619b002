//! Kelly criterion position sizing

use crate::config::RiskConfig;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Payoff floor used when the price leaves no upside
const MIN_PAYOFF: Decimal = dec!(0.01);

/// Fractional Kelly sizing for binary outcome tokens
#[derive(Debug, Clone)]
pub struct KellyEngine {
    /// Fraction of full Kelly to bet
    pub multiplier: Decimal,
    /// Maximum bet as a share of bankroll
    pub risk_cap: Decimal,
    /// Absolute ceiling as a share of bankroll
    pub bankroll_cap: Decimal,
}

impl KellyEngine {
    pub fn new(multiplier: Decimal, risk_cap: Decimal) -> Self {
        Self {
            multiplier,
            risk_cap,
            bankroll_cap: dec!(0.95),
        }
    }

    /// Engine for the configured risk profile
    pub fn from_config(config: &RiskConfig) -> Self {
        Self {
            multiplier: config.multiplier(),
            risk_cap: config.cap(),
            bankroll_cap: config.bankroll_cap,
        }
    }

    /// USD to stake at `price` given a directional `probability`.
    ///
    /// Shares pay $1, so the payoff ratio is `b = 1/price - 1`. The
    /// probability is folded onto the favoured side first, so the caller
    /// passes the raw UP probability for either token. Never negative, never
    /// above `bankroll_cap` of the balance.
    pub fn calculate_size(&self, balance: Decimal, probability: f64, price: Decimal) -> Decimal {
        if balance <= Decimal::ZERO || price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let Some(p) = Decimal::from_f64(probability) else {
            return Decimal::ZERO;
        };

        let prob = p.max(Decimal::ONE - p);
        let q = Decimal::ONE - prob;
        let b = if price >= Decimal::ONE {
            MIN_PAYOFF
        } else {
            Decimal::ONE / price - Decimal::ONE
        };
        if b <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let kelly_f = (prob * b - q) / b;
        if kelly_f <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let raw = balance * kelly_f * self.multiplier;
        raw.min(balance * self.risk_cap)
            .min(balance * self.bankroll_cap)
            .max(Decimal::ZERO)
    }
}

impl Default for KellyEngine {
    fn default() -> Self {
        Self::new(dec!(0.15), dec!(0.25))
    }
}
