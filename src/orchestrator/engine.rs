//! Engine actor
//!
//! Sole owner of the candle windows, the selected market and the position
//! controller. Stream tasks talk to it through one channel; timers drive
//! the decision, monitor and maintenance cadences. Nothing here is shared,
//! so no state is ever observed half-updated.

use super::status::{short_term_deltas, IndicatorStatus, MarketStatus, PositionSummary, StatusSnapshot};
use crate::config::Config;
use crate::data::{Persistence, SignalRecord};
use crate::feed::{CandleStream, CandleWindow, FeedEvent, HistorySource, SentimentReading};
use crate::indicators::{weighted_obi, IndicatorParams, IndicatorSnapshot};
use crate::market::{Market, MarketCatalog, MarketDiscovery, StrikeLatch};
use crate::orderbook::{BookSource, OrderBook};
use crate::position::{EntrySignal, PositionController};
use crate::predictor::{
    collect_evidence, divergence_score, fuse, time_decay_factor, Bias, MarketContext,
    PredictionTrace, SignalInputs,
};
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// External collaborators of the engine
pub struct EngineContext {
    pub catalog: Arc<dyn MarketCatalog>,
    pub books: Arc<dyn BookSource>,
    pub history: Arc<dyn HistorySource>,
    pub store: Arc<dyn Persistence>,
}

/// Market chosen for this cycle together with its decision context
struct Selection {
    market: Market,
    context: MarketContext,
    strike: Option<f64>,
}

pub struct Engine {
    config: Config,
    params: IndicatorParams,
    primary: CandleWindow,
    secondary: CandleWindow,
    /// Latest primary price, forming bar included
    price: Option<f64>,
    coinbase_price: Option<f64>,
    sentiment: Option<SentimentReading>,
    atr: Option<f64>,
    markets: Vec<Market>,
    latch: StrikeLatch,
    discovery: MarketDiscovery,
    controller: PositionController,
    ctx: EngineContext,
    status: watch::Sender<Option<StatusSnapshot>>,
}

impl Engine {
    pub fn new(
        config: Config,
        controller: PositionController,
        ctx: EngineContext,
    ) -> (Self, watch::Receiver<Option<StatusSnapshot>>) {
        let (status, status_rx) = watch::channel(None);
        let engine = Self {
            params: IndicatorParams::from(&config.strategy),
            primary: CandleWindow::new(config.feed.primary_capacity),
            secondary: CandleWindow::new(config.feed.secondary_capacity),
            price: None,
            coinbase_price: None,
            sentiment: None,
            atr: None,
            markets: Vec::new(),
            latch: StrikeLatch::new(),
            discovery: MarketDiscovery::new(config.market.clone()),
            controller,
            ctx,
            status,
            config,
        };
        (engine, status_rx)
    }

    pub fn controller(&self) -> &PositionController {
        &self.controller
    }

    pub fn markets(&self) -> &[Market] {
        &self.markets
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn primary(&self) -> &CandleWindow {
        &self.primary
    }

    /// Whether enough closed primary candles exist to run decisions
    pub fn is_warm(&self) -> bool {
        self.primary.len() >= self.config.feed.warmup_candles
    }

    /// Restore persisted state, seed history and reconcile holdings
    pub async fn start(&mut self, now: DateTime<Utc>) {
        if let Err(e) = self.controller.restore().await {
            error!(error = %e, "Failed to restore position");
        }
        self.warm_up().await;
        self.refresh_markets(now).await;
        self.maintenance(now).await;
    }

    /// Seed both candle windows from REST history
    pub async fn warm_up(&mut self) {
        let feed = &self.config.feed;
        let sources = [
            (CandleStream::Primary, feed.primary_interval.as_str(), feed.primary_capacity),
            (CandleStream::Secondary, feed.secondary_interval.as_str(), feed.secondary_capacity),
        ];
        for (stream, interval, limit) in sources {
            match self.ctx.history.klines(&feed.symbol, interval, limit).await {
                Ok(candles) => {
                    let window = match stream {
                        CandleStream::Primary => &mut self.primary,
                        CandleStream::Secondary => &mut self.secondary,
                    };
                    window.extend(candles);
                    info!(?stream, interval, candles = window.len(), "History loaded");
                }
                Err(e) => warn!(?stream, interval, error = %e, "History fetch failed, warming up from stream"),
            }
        }
        if self.price.is_none() {
            self.price = self.primary.last().map(|c| c.close);
        }
    }

    /// Apply one feed event. Returns `true` when a primary candle closed.
    pub fn handle_event(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Candle {
                stream: CandleStream::Primary,
                candle,
                closed,
            } => {
                self.price = Some(candle.close);
                if closed {
                    self.primary.push(candle);
                    info!(close = candle.close, candles = self.primary.len(), "Primary candle closed");
                }
                closed
            }
            FeedEvent::Candle {
                stream: CandleStream::Secondary,
                candle,
                closed,
            } => {
                if closed {
                    self.secondary.push(candle);
                }
                false
            }
            FeedEvent::Ticker(ticker) => {
                self.coinbase_price = Some(ticker.price);
                false
            }
            FeedEvent::Sentiment(reading) => {
                debug!(value = reading.value, classification = %reading.classification, "Sentiment updated");
                self.sentiment = Some(reading);
                false
            }
        }
    }

    /// Re-query the catalog. On failure the previous list is kept minus
    /// anything that has expired.
    pub async fn refresh_markets(&mut self, now: DateTime<Utc>) {
        let start = Instant::now();
        match self.ctx.catalog.fetch_events().await {
            Ok(events) => {
                self.markets = self.discovery.discover(&events, now);
                debug!(markets = self.markets.len(), "Discovery complete");
            }
            Err(e) => {
                warn!(error = %e, "Catalog fetch failed, keeping previous markets");
                self.markets.retain(|m| m.window_end > now);
            }
        }
        record_latency(LatencyMetric::Discovery, start.elapsed());
        set_gauge(GaugeMetric::ActiveMarkets, self.markets.len() as f64);
    }

    /// First market whose quote passes the liquidity filter, with its
    /// decision context
    async fn select_market(&mut self, reference_price: f64, now: DateTime<Utc>) -> Option<Selection> {
        for market in self.markets.clone() {
            if market.window_end <= now {
                continue;
            }

            let mut yes_book: Option<OrderBook> = None;
            let (bid, ask) = match (market.best_bid, market.best_ask) {
                (Some(bid), Some(ask)) => (Some(bid), Some(ask)),
                _ => match self.ctx.books.order_book(&market.yes_token).await {
                    Ok(book) => {
                        let quote = (book.best_bid(), book.best_ask());
                        yes_book = Some(book);
                        quote
                    }
                    Err(e) => {
                        debug!(market = %market.id, error = %e, "Quote fetch failed");
                        continue;
                    }
                },
            };

            let quote = match self.discovery.check_liquidity(bid, ask) {
                Ok(quote) => quote,
                Err(rejection) => {
                    debug!(market = %market.id, reason = rejection.reason(), detail = %rejection, "Market skipped");
                    increment_counter(CounterMetric::RejectedMarkets, rejection.reason());
                    continue;
                }
            };

            let strike = self.latch.latch(&market, self.price.unwrap_or(reference_price));
            let mid = quote.mid.to_f64().unwrap_or(0.5);

            let book = match yes_book {
                Some(book) => Some(book),
                None => self.ctx.books.order_book(&market.yes_token).await.ok(),
            };
            let (imbalance_up, imbalance_down) = book
                .as_ref()
                .map(|b| weighted_obi(b, mid))
                .unwrap_or((0.0, 0.0));

            let funding_rate = match self.ctx.history.funding_rate(&self.config.feed.symbol).await {
                Ok(rate) => rate,
                Err(e) => {
                    debug!(error = %e, "Funding rate unavailable, using neutral");
                    0.0
                }
            };

            let context = MarketContext {
                mid_price: Some(mid),
                spread: quote.spread.to_f64(),
                imbalance_up,
                imbalance_down,
                funding_rate,
                latency_divergence: divergence_score(
                    self.price.unwrap_or(reference_price),
                    self.coinbase_price,
                    self.config.strategy.divergence_threshold_pct,
                ),
                moneyness: strike.map(|k| reference_price - k),
                time_decay_factor: time_decay_factor(market.remaining(now)),
            };
            return Some(Selection {
                market,
                context,
                strike,
            });
        }
        None
    }

    /// One full decision cycle.
    ///
    /// Returns the published snapshot, or `None` while warming up or when
    /// the indicators cannot be computed.
    pub async fn decision_cycle(&mut self, now: DateTime<Utc>) -> Option<StatusSnapshot> {
        if !self.is_warm() {
            info!(
                candles = self.primary.len(),
                required = self.config.feed.warmup_candles,
                "Warming up, need more candles"
            );
            return None;
        }

        let start = Instant::now();
        increment_counter(CounterMetric::DecisionCycles, "cycle");

        let candles = self.primary.to_vec();
        let snapshot = match IndicatorSnapshot::compute(&candles, self.params) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Indicators unavailable, skipping cycle");
                return None;
            }
        };
        self.atr = snapshot.atr;

        let last_close = self.primary.last().map(|c| c.close);
        let price = self.price.or(last_close).unwrap_or(0.0);
        let reference_price = last_close.unwrap_or(price);

        self.refresh_markets(now).await;
        let selection = self.select_market(reference_price, now).await;
        if selection.is_none() {
            warn!("No eligible market this cycle");
        }

        let prior = self.config.strategy.prior;
        let (probability, trace) = match &selection {
            Some(sel) => {
                let inputs = SignalInputs::from_snapshot(price, &snapshot, last_close);
                fuse(prior, &collect_evidence(&inputs, &sel.context))
            }
            None => (prior, PredictionTrace::default()),
        };
        let signal = EntrySignal::from_probability(probability, &self.config.strategy);
        set_gauge(GaugeMetric::Probability, probability);
        info!(
            probability,
            bias = ?Bias::from_probability(probability),
            signal = signal.label(),
            factors = trace.factors.len(),
            "Decision score"
        );

        let record = SignalRecord {
            timestamp: now,
            price,
            rsi: Some(snapshot.rsi),
            atr: snapshot.atr,
            probability,
            label: signal.label().to_string(),
            market_id: selection.as_ref().map(|s| s.market.id.clone()),
        };
        if let Err(e) = self.ctx.store.append_signal(record).await {
            error!(error = %e, "Failed to append signal record");
        }

        if let Some(sel) = &selection {
            if let Err(e) = self.controller.monitor(self.atr, price, now).await {
                warn!(error = %e, "Monitor failed during decision cycle");
            }
            let divergence = sel.context.latency_divergence;
            if let Err(e) = self
                .controller
                .on_decision(probability, divergence, Some(&sel.market), now)
                .await
            {
                warn!(error = %e, market = %sel.market.id, "Decision not executed");
            }
        }

        let status = self
            .build_status(now, price, &snapshot, probability, signal, trace, selection.as_ref())
            .await;
        self.status.send_replace(Some(status.clone()));
        record_latency(LatencyMetric::DecisionCycle, start.elapsed());
        Some(status)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_status(
        &self,
        now: DateTime<Utc>,
        price: f64,
        snapshot: &IndicatorSnapshot,
        probability: f64,
        signal: EntrySignal,
        trace: PredictionTrace,
        selection: Option<&Selection>,
    ) -> StatusSnapshot {
        let (delta_1m, delta_3m) = short_term_deltas(&self.secondary);
        let account_value = match self.controller.account_value(now).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "Account value unavailable");
                None
            }
        };
        let market = selection.map(|sel| {
            let price_to_beat = sel
                .strike
                .or_else(|| sel.market.is_updown.then_some(price));
            MarketStatus::new(
                &sel.market,
                price_to_beat,
                sel.context.mid_price,
                self.config.market.min_minutes_to_expiry,
                now,
            )
        });

        StatusSnapshot {
            timestamp: now,
            mode: self.controller.mode(),
            price,
            indicators: IndicatorStatus::from_snapshot(snapshot),
            probability,
            confidence: probability.max(1.0 - probability) * 100.0,
            bias: Bias::from_probability(probability),
            signal: signal.label(),
            trace,
            market,
            delta_1m,
            delta_3m,
            sentiment: self.sentiment.clone(),
            position: self.controller.position().map(PositionSummary::from),
            state: self.controller.state(),
            account_value,
            halted: self.controller.risk().is_halted(),
        }
    }

    /// Exit-rule check of the open position
    pub async fn monitor_tick(&mut self, now: DateTime<Utc>) {
        if self.controller.position().is_none() {
            return;
        }
        let Some(price) = self.price else {
            return;
        };
        if let Err(e) = self.controller.monitor(self.atr, price, now).await {
            warn!(error = %e, "Monitor tick failed");
        }
    }

    /// Breaker check, paper settlement, outcome backfill and ghost recovery
    pub async fn maintenance(&mut self, now: DateTime<Utc>) {
        if let Err(e) = self.controller.check_risk(now).await {
            warn!(error = %e, "Risk check skipped");
        }
        let catalog = Arc::clone(&self.ctx.catalog);
        if let Err(e) = self.controller.settle_paper_resolution(catalog.as_ref(), now).await {
            warn!(error = %e, "Paper resolution check failed");
        }
        match self.controller.reconcile_outcomes(catalog.as_ref()).await {
            Ok(0) => {}
            Ok(settled) => info!(settled, "Backfilled trade outcomes"),
            Err(e) => warn!(error = %e, "Outcome reconciliation failed"),
        }
        if let Err(e) = self.controller.recover_ghost(&self.markets, now).await {
            warn!(error = %e, "Ghost recovery failed");
        }
    }

    /// Monitor cadence: dense while capital is at risk
    fn monitor_period(&self) -> Duration {
        let position = &self.config.position;
        if self.controller.position().is_some() {
            Duration::from_secs(position.monitor_holding_secs)
        } else {
            Duration::from_secs(position.monitor_flat_secs)
        }
    }

    /// Drive the engine until `shutdown` resolves or every feed is gone
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FeedEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        let mut decision = tokio::time::interval(Duration::from_secs(
            self.config.strategy.decision_interval_secs,
        ));
        decision.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut maintenance = tokio::time::interval(Duration::from_secs(
            self.config.position.maintenance_interval_secs,
        ));
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both already ran in start()
        decision.tick().await;
        maintenance.tick().await;

        let monitor = tokio::time::sleep(self.monitor_period());
        tokio::pin!(monitor);
        tokio::pin!(shutdown);

        info!(mode = self.controller.mode().as_str(), "Engine running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping engine");
                    break;
                }

                event = events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event) {
                            self.decision_cycle(Utc::now()).await;
                            decision.reset();
                        }
                    }
                    None => {
                        warn!("All feed tasks ended");
                        break;
                    }
                },

                _ = decision.tick() => {
                    self.decision_cycle(Utc::now()).await;
                }

                _ = &mut monitor => {
                    self.monitor_tick(Utc::now()).await;
                    monitor.as_mut().reset(tokio::time::Instant::now() + self.monitor_period());
                }

                _ = maintenance.tick() => {
                    self.maintenance(Utc::now()).await;
                }
            }
        }

        if let Some(position) = self.controller.position() {
            info!(
                token_id = %position.token_id,
                size = %position.size,
                "Open position left in place, it is restored on next start"
            );
        }
        Ok(())
    }
}
