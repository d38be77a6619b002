//! Sizing and the daily-loss breaker

use chrono::{Duration, TimeZone, Utc};
use poly_updown::config::{RiskConfig, RiskProfile};
use poly_updown::risk::{BreakerState, KellyEngine, RiskManager};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn test_kelly_normal_profile_stake() {
    let kelly = KellyEngine::from_config(&RiskConfig::default());
    let size = kelly.calculate_size(dec!(1000), 0.8, dec!(0.5));
    assert!((size - dec!(90)).abs() < dec!(0.0001), "size {size}");
}

#[test]
fn test_kelly_aggressive_profile_stake() {
    let config = RiskConfig {
        profile: RiskProfile::Aggressive,
        ..Default::default()
    };
    let kelly = KellyEngine::from_config(&config);
    // 1000 * 0.6 * 0.40 = 240, under the 600 cap
    let size = kelly.calculate_size(dec!(1000), 0.8, dec!(0.5));
    assert!((size - dec!(240)).abs() < dec!(0.0001), "size {size}");
}

#[test]
fn test_kelly_caps_full_multiplier() {
    // Full Kelly would stake 600
    let kelly = KellyEngine::new(dec!(1), dec!(0.25));
    assert_eq!(kelly.calculate_size(dec!(1000), 0.8, dec!(0.5)), dec!(250));

    let kelly = KellyEngine {
        risk_cap: dec!(1),
        bankroll_cap: dec!(0.5),
        ..KellyEngine::new(dec!(1), dec!(1))
    };
    assert_eq!(kelly.calculate_size(dec!(1000), 0.8, dec!(0.5)), dec!(500));
}

#[test]
fn test_kelly_no_edge_no_stake() {
    let kelly = KellyEngine::default();
    assert_eq!(kelly.calculate_size(dec!(1000), 0.5, dec!(0.5)), Decimal::ZERO);
    assert_eq!(kelly.calculate_size(Decimal::ZERO, 0.9, dec!(0.5)), Decimal::ZERO);
}

#[test]
fn test_breaker_trips_and_recovers_after_halt_window() {
    let mut risk = RiskManager::from_config(&RiskConfig::default());
    let morning = Utc.with_ymd_and_hms(2025, 3, 5, 8, 0, 0).unwrap();

    assert_eq!(risk.check(dec!(1000), morning), BreakerState::Active);
    assert_eq!(risk.state().daily_reference_balance, dec!(1000));

    let later = morning + Duration::hours(1);
    assert_eq!(risk.drawdown(dec!(880)), dec!(0.12));
    assert_eq!(risk.check(dec!(880), later), BreakerState::Halted);
    assert!(risk.is_halted());

    // Still inside the six-hour window even if the balance recovers
    assert_eq!(risk.check(dec!(990), later + Duration::hours(5)), BreakerState::Halted);

    let after = later + Duration::hours(6) + Duration::minutes(1);
    assert_eq!(risk.check(dec!(880), after), BreakerState::Active);
    assert!(!risk.is_halted());
    assert_eq!(risk.state().daily_reference_balance, dec!(880));
}

#[test]
fn test_breaker_resets_reference_each_day() {
    let mut risk = RiskManager::from_config(&RiskConfig::default());
    let day1 = Utc.with_ymd_and_hms(2025, 3, 5, 20, 0, 0).unwrap();
    risk.check(dec!(1000), day1);
    assert_eq!(risk.check(dec!(950), day1 + Duration::hours(1)), BreakerState::Active);

    let day2 = Utc.with_ymd_and_hms(2025, 3, 6, 0, 5, 0).unwrap();
    assert_eq!(risk.check(dec!(950), day2), BreakerState::Active);
    assert_eq!(risk.state().daily_reference_balance, dec!(950));
    assert_eq!(risk.state().reset_date, Some(day2.date_naive()));
}
