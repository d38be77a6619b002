//! Indicator pipeline over realistic candle windows

use crate::support::rising_candles;
use poly_updown::indicators::{
    atr, heiken_ashi, macd, rsi, vwap_intraday, CandleColor, IndicatorParams, IndicatorSnapshot,
    InsufficientData,
};

#[test]
fn test_rsi_of_unbroken_rise_is_100() {
    let closes: Vec<f64> = (100..115).map(f64::from).collect();
    assert_eq!(closes.len(), 15);
    assert_eq!(rsi(&closes, 14).unwrap(), 100.0);
}

#[test]
fn test_rsi_needs_period_plus_one_closes() {
    let closes: Vec<f64> = (100..114).map(f64::from).collect();
    assert!(matches!(
        rsi(&closes, 14),
        Err(InsufficientData { required: 15, .. })
    ));
}

#[test]
fn test_snapshot_of_uptrend() {
    let candles = rising_candles(60, 80_000.0);
    let snapshot = IndicatorSnapshot::compute(&candles, IndicatorParams::default()).unwrap();

    assert_eq!(snapshot.rsi, 100.0);
    assert!(snapshot.macd.line > 0.0);
    assert!(snapshot.macd.histogram > 0.0);
    assert_eq!(snapshot.heiken_ashi.color, CandleColor::Green);
    assert!(snapshot.heiken_ashi.streak >= 2);
    assert!(snapshot.vwap_slope > 0.0);
    assert!(snapshot.vwap().unwrap() < candles.last().unwrap().close);
    // Every bar gaps above the previous close
    assert!(snapshot.atr.unwrap() > 15.0);
}

#[test]
fn test_snapshot_requires_macd_history() {
    let candles = rising_candles(20, 80_000.0);
    let err = IndicatorSnapshot::compute(&candles, IndicatorParams::default()).unwrap_err();
    assert!(err.available < err.required);
}

#[test]
fn test_individual_indicators_agree_with_snapshot() {
    let candles = rising_candles(60, 80_000.0);
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let snapshot = IndicatorSnapshot::compute(&candles, IndicatorParams::default()).unwrap();

    assert_eq!(macd(&closes, 12, 26, 9).unwrap(), snapshot.macd);
    assert_eq!(heiken_ashi(&candles).unwrap(), snapshot.heiken_ashi);
    assert_eq!(vwap_intraday(&candles).unwrap(), snapshot.vwap_series);
    assert_eq!(atr(&candles, 14).ok(), snapshot.atr);
}
