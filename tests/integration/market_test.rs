//! Market discovery against catalog fixtures

use crate::support::{events_fixture, now, FakeCatalog, QUESTION};
use chrono::{Duration, TimeZone, Utc};
use poly_updown::config::MarketConfig;
use poly_updown::market::{
    MarketCatalog, MarketDiscovery, MarketRejection, Resolution, StrikeLatch, WindowSource,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_discovers_live_window_only() {
    let catalog = FakeCatalog::new(events_fixture());
    let events = catalog.fetch_events().await.unwrap();
    let markets = MarketDiscovery::new(MarketConfig::default()).discover(&events, now());

    assert_eq!(markets.len(), 1);
    let market = &markets[0];
    assert_eq!(market.id, "512");
    assert_eq!(market.question, QUESTION);
    assert_eq!(market.yes_token, "yes-512");
    assert_eq!(market.no_token, "no-512");
    assert_eq!(market.window_source, WindowSource::Title);
    assert_eq!(market.window_start, Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap());
    assert_eq!(market.window_end, Utc.with_ymd_and_hms(2025, 3, 5, 16, 15, 0).unwrap());
    assert_eq!(market.best_bid, Some(dec!(0.48)));
    assert_eq!(market.best_ask, Some(dec!(0.52)));
    assert!(market.is_updown);
    assert!(market.strike_price.is_none());
}

#[tokio::test]
async fn test_nothing_eligible_near_expiry() {
    let events = events_fixture();
    let late = Utc.with_ymd_and_hms(2025, 3, 5, 16, 14, 0).unwrap();
    let discovery = MarketDiscovery::new(MarketConfig::default());
    assert!(discovery.discover(&events, late).is_empty());

    let raw = &events[0].markets[0];
    assert!(matches!(
        discovery.evaluate(raw, late),
        Err(MarketRejection::ExpiringSoon(_))
    ));
}

#[test]
fn test_liquidity_filter_at_decision_time() {
    let discovery = MarketDiscovery::new(MarketConfig::default());

    let quote = discovery.check_liquidity(Some(dec!(0.48)), Some(dec!(0.52))).unwrap();
    assert_eq!(quote.mid, dec!(0.50));
    assert_eq!(quote.spread, dec!(0.04));

    assert_eq!(
        discovery.check_liquidity(Some(dec!(0.94)), Some(dec!(0.96))),
        Err(MarketRejection::Illiquid(dec!(0.95)))
    );
    assert_eq!(
        discovery.check_liquidity(Some(dec!(0.40)), Some(dec!(0.50))),
        Err(MarketRejection::WideSpread(dec!(0.10)))
    );
    assert_eq!(
        discovery.check_liquidity(None, Some(dec!(0.50))),
        Err(MarketRejection::NoQuote)
    );
}

#[test]
fn test_strike_latched_for_updown_market() {
    let events = events_fixture();
    let markets = MarketDiscovery::new(MarketConfig::default()).discover(&events, now());
    let mut latch = StrikeLatch::new();

    assert_eq!(latch.latch(&markets[0], 84_250.0), Some(84_250.0));
    // Later reference prices do not move the anchor
    assert_eq!(latch.latch(&markets[0], 84_900.0), Some(84_250.0));
    assert_eq!(latch.market_id(), Some("512"));
}

#[tokio::test]
async fn test_catalog_resolution_lookup() {
    let catalog = FakeCatalog::new(Vec::new());
    assert_eq!(catalog.fetch_resolution("512").await.unwrap(), None);
    catalog.resolve("512", Resolution::Yes);
    assert_eq!(
        catalog.fetch_resolution("512").await.unwrap(),
        Some(Resolution::Yes)
    );
}

#[test]
fn test_window_remaining() {
    let events = events_fixture();
    let markets = MarketDiscovery::new(MarketConfig::default()).discover(&events, now());
    assert_eq!(markets[0].remaining(now()), Duration::minutes(10));
}
