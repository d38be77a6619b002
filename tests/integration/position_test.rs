//! Paper position lifecycle through the real paper gateway

use crate::support::{events_fixture, now, FakeBooks, FakeCatalog};
use chrono::Duration;
use poly_updown::config::{Config, MarketConfig};
use poly_updown::data::{MemoryStore, Outcome, PaperLedger, Persistence};
use poly_updown::execution::{ExecutionGateway, OrderSide, PaperGateway};
use poly_updown::market::{Market, MarketDiscovery, Resolution};
use poly_updown::orderbook::BookSource;
use poly_updown::position::{Action, ControllerState, Direction, ExitReason, PositionController};
use rust_decimal_macros::dec;
use std::sync::Arc;

const REFERENCE_PRICE: f64 = 84_000.0;

struct Harness {
    controller: PositionController,
    books: Arc<FakeBooks>,
    store: Arc<MemoryStore>,
    market: Market,
}

fn harness() -> Harness {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let books = Arc::new(FakeBooks::new(dec!(0.38), dec!(0.40)));
    let persistence = Arc::clone(&store) as Arc<dyn Persistence>;
    let gateway = PaperGateway::new(
        Arc::clone(&books) as Arc<dyn BookSource>,
        Arc::clone(&persistence),
        PaperLedger::new(Arc::clone(&persistence), config.execution.paper_balance),
    );
    let controller = PositionController::new(
        &config,
        Arc::new(gateway) as Arc<dyn ExecutionGateway>,
        persistence,
    );
    let market = MarketDiscovery::new(MarketConfig::default())
        .discover(&events_fixture(), now())
        .remove(0);
    Harness {
        controller,
        books,
        store,
        market,
    }
}

async fn paper_balance(store: &Arc<MemoryStore>) -> rust_decimal::Decimal {
    PaperLedger::new(Arc::clone(store) as Arc<dyn Persistence>, dec!(1000))
        .balance()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_trailing_stop_after_activation() {
    let mut h = harness();
    let entered = h
        .controller
        .on_decision(0.82, 0, Some(&h.market), now())
        .await
        .unwrap();
    assert!(matches!(
        entered,
        Some(Action::Entered { direction: Direction::Up, price, .. }) if price == dec!(0.40)
    ));

    // +6% marks the high-water mark above the 5% activation
    h.books.set("yes-512", dec!(0.424), dec!(0.43));
    let t = now() + Duration::seconds(5);
    assert_eq!(h.controller.monitor(None, REFERENCE_PRICE, t).await.unwrap(), None);
    assert_eq!(h.controller.position().unwrap().highest_roi, dec!(6));

    // -2.5% is inside the 10% trail
    h.books.set("yes-512", dec!(0.39), dec!(0.40));
    assert_eq!(h.controller.monitor(None, REFERENCE_PRICE, t).await.unwrap(), None);

    // -4% is exactly 10 points under the high-water mark
    h.books.set("yes-512", dec!(0.384), dec!(0.39));
    let exit = h.controller.monitor(None, REFERENCE_PRICE, t).await.unwrap();
    let Some(Action::Exited { reason, price, pnl }) = exit else {
        panic!("expected exit, got {exit:?}");
    };
    assert_eq!(reason, ExitReason::TrailingStop);
    assert_eq!(price, dec!(0.374));
    assert!(pnl < rust_decimal::Decimal::ZERO);

    assert!(h.controller.position().is_none());
    assert_eq!(h.controller.state(), ControllerState::Flat);
    assert!(h
        .store
        .load_position(h.controller.mode())
        .await
        .unwrap()
        .is_none());

    let trades = h.store.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].side, OrderSide::Sell);
    assert_eq!(trades[0].outcome, Outcome::Loss);
    assert_eq!(trades[1].side, OrderSide::Buy);
    assert_eq!(trades[1].outcome, Outcome::Pending);
}

#[tokio::test]
async fn test_hard_stop() {
    let mut h = harness();
    h.controller
        .on_decision(0.82, 0, Some(&h.market), now())
        .await
        .unwrap();

    h.books.set("yes-512", dec!(0.34), dec!(0.35));
    let exit = h
        .controller
        .monitor(Some(150.0), REFERENCE_PRICE, now() + Duration::seconds(1))
        .await
        .unwrap();
    assert!(matches!(
        exit,
        Some(Action::Exited { reason: ExitReason::HardStop, .. })
    ));
}

#[tokio::test]
async fn test_cooldown_blocks_reentry() {
    let mut h = harness();
    h.controller
        .on_decision(0.82, 0, Some(&h.market), now())
        .await
        .unwrap();
    h.books.set("yes-512", dec!(0.30), dec!(0.32));
    h.controller
        .monitor(None, REFERENCE_PRICE, now())
        .await
        .unwrap();
    assert!(h.controller.position().is_none());

    h.books.set("yes-512", dec!(0.38), dec!(0.40));
    let blocked = h
        .controller
        .on_decision(0.85, 0, Some(&h.market), now() + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(blocked, None);

    let reentry = h
        .controller
        .on_decision(0.85, 0, Some(&h.market), now() + Duration::seconds(61))
        .await
        .unwrap();
    assert!(matches!(reentry, Some(Action::Entered { .. })));
}

#[tokio::test]
async fn test_paper_resolution_and_outcome_backfill() {
    let mut h = harness();
    h.controller
        .on_decision(0.20, 0, Some(&h.market), now())
        .await
        .unwrap();
    let position = h.controller.position().cloned().unwrap();
    assert_eq!(position.direction, Direction::Down);
    assert_eq!(position.token_id, "no-512");
    let after_entry = paper_balance(&h.store).await;

    let catalog = FakeCatalog::new(Vec::new());
    assert_eq!(
        h.controller
            .settle_paper_resolution(&catalog, now())
            .await
            .unwrap(),
        None
    );

    catalog.resolve("512", Resolution::No);
    let settled = h
        .controller
        .settle_paper_resolution(&catalog, now() + Duration::minutes(11))
        .await
        .unwrap();
    assert!(matches!(
        settled,
        Some(Action::Exited { reason: ExitReason::Resolution, price, .. }) if price == dec!(1)
    ));
    assert_eq!(paper_balance(&h.store).await, after_entry + position.size);

    assert_eq!(h.controller.reconcile_outcomes(&catalog).await.unwrap(), 1);
    assert_eq!(h.controller.reconcile_outcomes(&catalog).await.unwrap(), 0);
    let trades = h.store.recent_trades(10).await.unwrap();
    assert!(trades.iter().all(|t| t.outcome == Outcome::Win));
}

#[tokio::test]
async fn test_breaker_blocks_entries_after_drawdown() {
    let mut h = harness();
    h.controller.check_risk(now()).await.unwrap();

    // Burn 12% of the paper balance outside the controller
    PaperLedger::new(Arc::clone(&h.store) as Arc<dyn Persistence>, dec!(1000))
        .debit(dec!(120))
        .await
        .unwrap();
    h.controller
        .check_risk(now() + Duration::minutes(1))
        .await
        .unwrap();
    assert!(h.controller.risk().is_halted());

    let blocked = h
        .controller
        .on_decision(0.9, 0, Some(&h.market), now() + Duration::minutes(2))
        .await
        .unwrap();
    assert_eq!(blocked, None);
    assert_eq!(h.controller.state(), ControllerState::Flat);
}
