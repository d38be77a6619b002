//! Engine actor driven with fake collaborators

use crate::support::{events_fixture, now, rising_candles, FakeBooks, FakeCatalog, FakeHistory};
use chrono::Duration;
use poly_updown::config::Config;
use poly_updown::data::{MemoryStore, PaperLedger, Persistence};
use poly_updown::execution::{ExecutionGateway, PaperGateway};
use poly_updown::feed::{Candle, CandleStream, FeedEvent, TickerEvent, Venue};
use poly_updown::orchestrator::{Engine, EngineContext, StatusSnapshot};
use poly_updown::orderbook::BookSource;
use poly_updown::position::{ControllerState, Direction, PositionController};
use poly_updown::predictor::Bias;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

fn engine(history: FakeHistory) -> (Engine, watch::Receiver<Option<StatusSnapshot>>, Arc<MemoryStore>) {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let persistence = Arc::clone(&store) as Arc<dyn Persistence>;
    let books = Arc::new(FakeBooks::new(dec!(0.48), dec!(0.52)));
    let gateway = PaperGateway::new(
        Arc::clone(&books) as Arc<dyn BookSource>,
        Arc::clone(&persistence),
        PaperLedger::new(Arc::clone(&persistence), config.execution.paper_balance),
    );
    let controller = PositionController::new(
        &config,
        Arc::new(gateway) as Arc<dyn ExecutionGateway>,
        Arc::clone(&persistence),
    );
    let (engine, status) = Engine::new(
        config,
        controller,
        EngineContext {
            catalog: Arc::new(FakeCatalog::new(events_fixture())),
            books,
            history: Arc::new(history),
            store: persistence,
        },
    );
    (engine, status, store)
}

fn warm_history() -> FakeHistory {
    FakeHistory {
        primary: rising_candles(60, 80_000.0),
        secondary: rising_candles(10, 84_000.0),
    }
}

fn empty_history() -> FakeHistory {
    FakeHistory {
        primary: Vec::new(),
        secondary: Vec::new(),
    }
}

#[tokio::test]
async fn test_start_warms_up_and_discovers() {
    let (mut engine, _status, _store) = engine(warm_history());
    engine.start(now()).await;

    assert!(engine.is_warm());
    assert_eq!(engine.primary().len(), 60);
    assert_eq!(engine.markets().len(), 1);
    assert_eq!(engine.price(), engine.primary().last().map(|c| c.close));
    assert_eq!(engine.controller().state(), ControllerState::Flat);
}

#[tokio::test]
async fn test_cold_engine_skips_decisions() {
    let (mut engine, status, store) = engine(empty_history());
    engine.start(now()).await;

    assert!(!engine.is_warm());
    assert!(engine.decision_cycle(now()).await.is_none());
    assert!(status.borrow().is_none());
    assert!(store.signals().await.is_empty());
}

#[tokio::test]
async fn test_decision_cycle_publishes_snapshot_and_enters() {
    let (mut engine, status, store) = engine(warm_history());
    engine.start(now()).await;

    let snapshot = engine.decision_cycle(now()).await.unwrap();
    assert!(snapshot.probability >= 0.78, "probability {}", snapshot.probability);
    assert_eq!(snapshot.signal, "LONG");
    assert_eq!(snapshot.bias, Bias::Bullish);
    assert!(!snapshot.trace.factors.is_empty());
    assert_eq!(snapshot.indicators.rsi, 100.0);

    let market = snapshot.market.as_ref().unwrap();
    assert_eq!(market.id, "512");
    assert_eq!(market.time_left, "10m 0s");
    assert!(!market.entry_blocked);
    assert_eq!(market.up_cents, Some(50.0));
    assert_eq!(market.price_to_beat, engine.primary().last().map(|c| c.close));

    let position = snapshot.position.as_ref().unwrap();
    assert_eq!(position.direction, Direction::Up);
    assert_eq!(position.entry_price, dec!(0.52));
    assert_eq!(snapshot.state, ControllerState::Holding);
    assert!(!snapshot.halted);

    // Watchers see the same snapshot
    assert_eq!(status.borrow().as_ref(), Some(&snapshot));

    let signals = store.signals().await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].label, "LONG");
    assert_eq!(signals[0].market_id.as_deref(), Some("512"));
}

#[tokio::test]
async fn test_handle_event_routes_streams() {
    let (mut engine, _status, _store) = engine(empty_history());
    let candles = rising_candles(3, 84_000.0);

    let forming = FeedEvent::Candle {
        stream: CandleStream::Primary,
        candle: candles[0],
        closed: false,
    };
    assert!(!engine.handle_event(forming));
    assert_eq!(engine.price(), Some(candles[0].close));
    assert!(engine.primary().is_empty());

    let closed = FeedEvent::Candle {
        stream: CandleStream::Primary,
        candle: candles[0],
        closed: true,
    };
    assert!(engine.handle_event(closed));
    assert_eq!(engine.primary().len(), 1);

    let secondary = FeedEvent::Candle {
        stream: CandleStream::Secondary,
        candle: candles[1],
        closed: true,
    };
    assert!(!engine.handle_event(secondary));
    assert_eq!(engine.primary().len(), 1);

    let ticker = FeedEvent::Ticker(TickerEvent {
        venue: Venue::Coinbase,
        price: 84_500.0,
        timestamp: now(),
    });
    assert!(!engine.handle_event(ticker));
    assert_eq!(engine.price(), Some(candles[0].close));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let (mut engine, _status, _store) = engine(warm_history());
    engine.start(now()).await;
    let (tx, rx) = mpsc::channel::<FeedEvent>(16);

    let next = Candle {
        open_time: engine.primary().last().unwrap().open_time + Duration::minutes(15),
        ..*engine.primary().last().unwrap()
    };
    tx.send(FeedEvent::Candle {
        stream: CandleStream::Primary,
        candle: next,
        closed: false,
    })
    .await
    .unwrap();

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        engine.run(rx, async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }),
    )
    .await;
    assert!(matches!(result, Ok(Ok(()))));
    drop(tx);
}

#[tokio::test]
async fn test_run_stops_when_feeds_end() {
    let (engine, _status, _store) = engine(empty_history());
    let (tx, rx) = mpsc::channel::<FeedEvent>(1);
    drop(tx);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        engine.run(rx, std::future::pending::<()>()),
    )
    .await;
    assert!(matches!(result, Ok(Ok(()))));
}
