//! Evidence fusion end to end

use crate::support::rising_candles;
use poly_updown::indicators::{IndicatorParams, IndicatorSnapshot};
use poly_updown::predictor::{
    collect_evidence, divergence_score, fuse, Bias, Evidence, Factor, MarketContext, SignalInputs,
};

#[test]
fn test_single_divergence_factor_from_even_prior() {
    let context = MarketContext {
        latency_divergence: divergence_score(100_000.0, Some(100_100.0), 0.05),
        ..Default::default()
    };
    assert_eq!(context.latency_divergence, 1);

    let (probability, trace) = fuse(0.5, &[Evidence::new(Factor::CrossVenueDivergence, 4.0)]);
    assert!((probability - 0.8).abs() < 1e-12);
    assert_eq!(trace.factors.len(), 1);
    assert_eq!(trace.factors[&Factor::CrossVenueDivergence], 4.0);
}

#[test]
fn test_uptrend_fuses_bullish() {
    let candles = rising_candles(60, 80_000.0);
    let snapshot = IndicatorSnapshot::compute(&candles, IndicatorParams::default()).unwrap();
    let last_close = candles.last().map(|c| c.close);
    let inputs = SignalInputs::from_snapshot(last_close.unwrap(), &snapshot, last_close);

    let evidence = collect_evidence(&inputs, &MarketContext::default());
    let factors: Vec<Factor> = evidence.iter().map(|e| e.factor).collect();
    assert!(factors.contains(&Factor::VwapTrend));
    assert!(factors.contains(&Factor::HeikenAshiTrend));
    assert!(!factors.contains(&Factor::CandleContinuation));

    let (probability, trace) = fuse(0.5, &evidence);
    assert!(probability >= 0.78, "probability {probability}");
    assert_eq!(Bias::from_probability(probability), Bias::Bullish);
    assert!(trace.evidence_log_odds > 0.0);
}

#[test]
fn test_opposing_evidence_cancels() {
    let (probability, trace) = fuse(
        0.5,
        &[
            Evidence::new(Factor::Crowd, 2.0),
            Evidence::new(Factor::RsiMomentum, 0.5),
        ],
    );
    assert!((probability - 0.5).abs() < 1e-12);
    assert_eq!(trace.factors.len(), 2);
}

#[test]
fn test_bearish_divergence_context() {
    let inputs_context = MarketContext {
        latency_divergence: divergence_score(100_000.0, Some(99_900.0), 0.05),
        ..Default::default()
    };
    assert_eq!(inputs_context.latency_divergence, -1);
}
