//! Bayesian predictor
//!
//! Turns indicator readings and market context into named Bayes factors and
//! fuses them in log-odds space into a probability that the tracked asset
//! settles UP. Nothing is retained between cycles.

mod rules;

pub use rules::{
    collect_evidence, divergence_score, time_decay_factor, MarketContext, SignalInputs,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable names for each evidence rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    VwapTrend,
    VwapSlope,
    RsiMomentum,
    MacdExpansion,
    MacdTrend,
    HeikenAshiTrend,
    Moneyness,
    Crowd,
    OrderFlow,
    FundingSqueeze,
    CrossVenueDivergence,
    CandleContinuation,
}

impl Factor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::VwapTrend => "vwap_trend",
            Factor::VwapSlope => "vwap_slope",
            Factor::RsiMomentum => "rsi_momentum",
            Factor::MacdExpansion => "macd_expansion",
            Factor::MacdTrend => "macd_trend",
            Factor::HeikenAshiTrend => "heiken_ashi_trend",
            Factor::Moneyness => "moneyness",
            Factor::Crowd => "crowd",
            Factor::OrderFlow => "order_flow",
            Factor::FundingSqueeze => "funding_squeeze",
            Factor::CrossVenueDivergence => "cross_venue_divergence",
            Factor::CandleContinuation => "candle_continuation",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of evidence. `bayes_factor > 1` supports UP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub factor: Factor,
    pub bayes_factor: f64,
}

impl Evidence {
    pub fn new(factor: Factor, bayes_factor: f64) -> Self {
        Self {
            factor,
            bayes_factor,
        }
    }
}

/// What went into a probability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTrace {
    pub prior_log_odds: f64,
    pub evidence_log_odds: f64,
    /// Applied factors only; rejected (non-positive) factors never appear
    pub factors: BTreeMap<Factor, f64>,
}

/// Directional reading of a probability for logs and the status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.6 {
            Bias::Bullish
        } else if probability < 0.4 {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

/// Fuse evidence onto a prior probability.
///
/// Factors `<= 0` (and NaN) are skipped. The result is
/// `logistic(ln(p0 / (1 - p0)) + sum(ln bf))`, clamped to exactly 0 or 1 when
/// the odds overflow.
pub fn fuse(prior: f64, evidence: &[Evidence]) -> (f64, PredictionTrace) {
    let prior_log_odds = (prior / (1.0 - prior)).ln();
    let mut trace = PredictionTrace {
        prior_log_odds,
        ..Default::default()
    };

    for e in evidence {
        if e.bayes_factor.is_nan() || e.bayes_factor <= 0.0 {
            continue;
        }
        trace.evidence_log_odds += e.bayes_factor.ln();
        trace.factors.insert(e.factor, e.bayes_factor);
    }

    if trace.factors.is_empty() {
        return (prior, trace);
    }

    let total = trace.prior_log_odds + trace.evidence_log_odds;
    let odds = total.exp();
    let probability = if odds.is_infinite() {
        1.0
    } else if odds == 0.0 {
        0.0
    } else {
        odds / (1.0 + odds)
    };
    (probability, trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_evidence_returns_prior_exactly() {
        for prior in [0.5, 0.3, 0.77] {
            let (p, trace) = fuse(prior, &[]);
            assert_eq!(p, prior);
            assert!(trace.factors.is_empty());
        }
    }

    #[test]
    fn test_cross_venue_divergence_alone() {
        let (p, trace) = fuse(0.5, &[Evidence::new(Factor::CrossVenueDivergence, 4.0)]);
        assert!((p - 0.8).abs() < 1e-12);
        assert_eq!(trace.prior_log_odds, 0.0);
        assert_eq!(trace.factors.get(&Factor::CrossVenueDivergence), Some(&4.0));
    }

    #[test]
    fn test_non_positive_factor_is_noop() {
        let (p, trace) = fuse(
            0.5,
            &[
                Evidence::new(Factor::Crowd, 0.0),
                Evidence::new(Factor::OrderFlow, -2.0),
                Evidence::new(Factor::MacdTrend, f64::NAN),
            ],
        );
        assert_eq!(p, 0.5);
        assert!(trace.factors.is_empty());
        assert_eq!(trace.evidence_log_odds, 0.0);
    }

    #[test]
    fn test_opposing_factors_cancel() {
        let (p, _) = fuse(
            0.5,
            &[
                Evidence::new(Factor::VwapTrend, 2.0),
                Evidence::new(Factor::RsiMomentum, 0.5),
            ],
        );
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_overflow_clamps() {
        let (p, _) = fuse(0.5, &[Evidence::new(Factor::Crowd, f64::MAX); 3]);
        assert_eq!(p, 1.0);
        let (p, _) = fuse(0.5, &[Evidence::new(Factor::Crowd, f64::MIN_POSITIVE); 3]);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_bias_labels() {
        assert_eq!(Bias::from_probability(0.61), Bias::Bullish);
        assert_eq!(Bias::from_probability(0.39), Bias::Bearish);
        assert_eq!(Bias::from_probability(0.5), Bias::Neutral);
    }
}
