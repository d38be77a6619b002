//! Position controller
//!
//! Owns the one open position of the active trading mode. Entries, exits
//! and the per-tick monitor all run through here, and every state change is
//! written to the store before the next decision is made.
//!
//! ```text
//! Flat --signal--> Entering --fill--> Holding --exit rule--> Exiting --> Flat
//!                     |                                         |
//!                     +----------- failure ------> Flat         +-- failure --> Holding
//! ```

use super::{BalanceCheck, Direction, ExitPolicy, ExitReason, Position};
use crate::config::{
    Config, ExecutionConfig, ExecutionMode, PositionConfig, RiskConfig, RiskProfile, StrategyConfig,
};
use crate::data::{Outcome, PaperLedger, Persistence, TradeRecord};
use crate::execution::{AssetKind, ExecutionError, ExecutionGateway, OrderRequest, OrderSide};
use crate::market::Market;
use crate::risk::{BreakerState, KellyEngine, RiskManager};
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControllerState {
    Flat,
    Entering,
    Holding,
    Exiting,
}

/// What a controller call did to the position
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Entered {
        direction: Direction,
        token_id: String,
        price: Decimal,
        size: Decimal,
    },
    Exited {
        reason: ExitReason,
        price: Decimal,
        pnl: Decimal,
    },
}

/// Single-position state machine over an execution gateway
pub struct PositionController {
    pub(super) mode: ExecutionMode,
    pub(super) gateway: Arc<dyn ExecutionGateway>,
    pub(super) store: Arc<dyn Persistence>,
    pub(super) ledger: PaperLedger,
    kelly: KellyEngine,
    risk: RiskManager,
    policy: ExitPolicy,
    strategy: StrategyConfig,
    risk_config: RiskConfig,
    pub(super) config: PositionConfig,
    execution: ExecutionConfig,
    min_minutes_to_expiry: i64,
    pub(super) position: Option<Position>,
    pub(super) state: ControllerState,
    last_exit: Option<DateTime<Utc>>,
    pub(super) last_recovery: Option<DateTime<Utc>>,
    /// Where the next outcome backfill batch starts in the pending list
    pub(super) reconcile_cursor: usize,
}

impl PositionController {
    pub fn new(config: &Config, gateway: Arc<dyn ExecutionGateway>, store: Arc<dyn Persistence>) -> Self {
        Self {
            mode: config.execution.mode,
            ledger: PaperLedger::new(Arc::clone(&store), config.execution.paper_balance),
            gateway,
            store,
            kelly: KellyEngine::from_config(&config.risk),
            risk: RiskManager::from_config(&config.risk),
            policy: ExitPolicy::from_config(&config.position),
            strategy: config.strategy.clone(),
            risk_config: config.risk.clone(),
            config: config.position.clone(),
            execution: config.execution.clone(),
            min_minutes_to_expiry: config.market.min_minutes_to_expiry,
            position: None,
            state: ControllerState::Flat,
            last_exit: None,
            last_recovery: None,
            reconcile_cursor: 0,
        }
    }

    /// Reload the persisted position of the active mode
    pub async fn restore(&mut self) -> Result<Option<&Position>, ExecutionError> {
        self.position = self.store.load_position(self.mode).await?;
        self.state = if self.position.is_some() {
            ControllerState::Holding
        } else {
            ControllerState::Flat
        };
        if let Some(position) = &self.position {
            info!(
                mode = self.mode.as_str(),
                token_id = %position.token_id,
                direction = %position.direction,
                entry = %position.entry_price,
                size = %position.size,
                "Restored open position"
            );
        }
        Ok(self.position.as_ref())
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn policy(&self) -> &ExitPolicy {
        &self.policy
    }

    /// Act on a fresh fused probability.
    ///
    /// While holding, only the hedge flip is considered. While flat, the
    /// entry gates run against `market`.
    pub async fn on_decision(
        &mut self,
        probability: f64,
        divergence: i8,
        market: Option<&Market>,
        now: DateTime<Utc>,
    ) -> Result<Option<Action>, ExecutionError> {
        if let Some(position) = &self.position {
            if self.policy.should_hedge(position.direction, probability) {
                info!(
                    direction = %position.direction,
                    probability,
                    "Probability flipped against position, hedging out"
                );
                return self.exit(ExitReason::HedgeFlip, now).await;
            }
            return Ok(None);
        }

        let Some(market) = market else {
            debug!("No eligible market, skipping entry");
            return Ok(None);
        };
        let Some(direction) = self.entry_direction(probability, divergence, market, now) else {
            return Ok(None);
        };
        self.enter(direction, market, probability, now).await
    }

    /// Direction to enter, or `None` when a gate blocks the entry
    fn entry_direction(
        &self,
        probability: f64,
        divergence: i8,
        market: &Market,
        now: DateTime<Utc>,
    ) -> Option<Direction> {
        if self.risk.is_halted() {
            debug!("Circuit breaker halted, no entries");
            return None;
        }
        if let Some(last) = self.last_exit {
            if now - last < Duration::seconds(self.config.cooldown_secs) {
                debug!(since_exit = (now - last).num_seconds(), "Cooling down after exit");
                return None;
            }
        }
        if market.remaining(now) < Duration::minutes(self.min_minutes_to_expiry) {
            debug!(market = %market.id, "Too close to expiry for a new entry");
            return None;
        }
        if divergence == -1 && probability >= self.strategy.divergence_veto_threshold {
            info!(probability, "Bearish cross-venue divergence, entry vetoed");
            return None;
        }

        if probability >= self.strategy.buy_threshold {
            Some(Direction::Up)
        } else if probability <= self.strategy.short_threshold {
            Some(Direction::Down)
        } else {
            None
        }
    }

    /// Buy the outcome token of `direction`
    pub async fn enter(
        &mut self,
        direction: Direction,
        market: &Market,
        probability: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Action>, ExecutionError> {
        if self.position.is_some() {
            return Ok(None);
        }
        self.state = ControllerState::Entering;
        let result = self.open_position(direction, market, probability, now).await;
        match &result {
            Ok(Some(_)) => self.state = ControllerState::Holding,
            Ok(None) => self.state = ControllerState::Flat,
            Err(e) => {
                warn!(error = %e, %direction, market = %market.id, "Entry failed");
                increment_counter(CounterMetric::ExecutionErrors, "entry");
                self.state = ControllerState::Flat;
            }
        }
        result
    }

    async fn open_position(
        &mut self,
        direction: Direction,
        market: &Market,
        probability: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Action>, ExecutionError> {
        let token_id = direction.token(market).to_string();
        let score = match direction {
            Direction::Up => probability,
            Direction::Down => 1.0 - probability,
        };

        let book = self.gateway.order_book(&token_id).await?;
        let ask = book
            .best_ask()
            .ok_or_else(|| ExecutionError::EmptyBook(token_id.clone()))?;
        let balance = self.gateway.balance(AssetKind::Collateral).await?;

        let Some((limit, shares)) = self.size_entry(ask, balance, score)? else {
            return Ok(None);
        };

        let order = self
            .gateway
            .create_order(OrderRequest::buy(&token_id, limit, shares))
            .await?;
        let receipt = self.gateway.submit(order).await?;

        let mut position = Position::open(
            &token_id,
            &market.id,
            direction,
            ask,
            receipt.size,
            now,
            &self.config,
        );
        if !self.mode.is_paper() {
            position.take_profit_order = self.place_take_profit(&position).await;
        }

        info!(
            mode = self.mode.as_str(),
            %direction,
            market = %market.id,
            %token_id,
            entry = %ask,
            limit = %limit,
            size = %receipt.size,
            take_profit = %position.take_profit,
            "Position opened"
        );

        self.persist(&position).await;
        self.log_trade(TradeRecord::new(
            now,
            &market.id,
            &token_id,
            direction,
            OrderSide::Buy,
            ask,
            receipt.size,
            Decimal::ZERO,
            self.mode.is_paper(),
            Outcome::Pending,
        ))
        .await;
        increment_counter(CounterMetric::Entries, direction_label(direction));

        let action = Action::Entered {
            direction,
            token_id,
            price: ask,
            size: receipt.size,
        };
        self.position = Some(position);
        Ok(Some(action))
    }

    /// Limit price and share count for an entry at `ask`.
    ///
    /// `Ok(None)` means the computed stake is too small to trade.
    fn size_entry(
        &self,
        ask: Decimal,
        balance: Decimal,
        score: f64,
    ) -> Result<Option<(Decimal, Decimal)>, ExecutionError> {
        let min_trade = self.risk_config.min_trade_usd;

        if self.mode.is_paper() {
            let usd = self.kelly.calculate_size(balance, score, ask);
            if usd < min_trade {
                debug!(%usd, %balance, "Kelly stake below minimum trade");
                return Ok(None);
            }
            let shares = (usd / ask).round_dp(2);
            return Ok((shares > Decimal::ZERO).then_some((ask, shares)));
        }

        let max_ask = match self.risk_config.profile {
            RiskProfile::Normal => self.execution.max_ask,
            RiskProfile::Aggressive => self.execution.max_ask_aggressive,
        };
        if ask > max_ask {
            return Err(ExecutionError::PriceTooHigh { ask, max: max_ask });
        }
        let limit = (ask + self.execution.buy_offset).min(self.execution.max_buy_price);

        let required = min_trade + Decimal::ONE;
        if balance < required {
            return Err(ExecutionError::InsufficientBalance {
                available: balance,
                required,
            });
        }

        let mut usd = self.kelly.calculate_size(balance, score, limit);
        let min_bet = self.risk_config.min_bet_usd;
        if usd > Decimal::ZERO && usd < min_bet && balance > min_bet {
            usd = min_bet;
        }
        if usd > balance {
            usd = balance * dec!(0.99);
        }
        if usd <= Decimal::ZERO {
            debug!(%balance, score, "No Kelly edge at this price");
            return Ok(None);
        }

        let shares = (usd / limit).round_dp(2).min(self.risk_config.max_shares);
        Ok((shares > Decimal::ZERO).then_some((limit, shares)))
    }

    /// Rest a sell at the take-profit level; returns its order id
    async fn place_take_profit(&self, position: &Position) -> Option<String> {
        let request = OrderRequest::sell(&position.token_id, position.take_profit, position.size);
        let result = match self.gateway.create_order(request).await {
            Ok(order) => self.gateway.submit(order).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(receipt) => {
                info!(order_id = %receipt.order_id, price = %position.take_profit, "Take-profit order placed");
                Some(receipt.order_id)
            }
            Err(e) => {
                warn!(error = %e, "Take-profit order failed, monitor will watch the level");
                None
            }
        }
    }

    async fn cancel_take_profit(&mut self) {
        let Some(order_id) = self
            .position
            .as_mut()
            .and_then(|p| p.take_profit_order.take())
        else {
            return;
        };
        match self.gateway.cancel(&order_id).await {
            Ok(()) => debug!(%order_id, "Take-profit order cancelled"),
            Err(e) => warn!(%order_id, error = %e, "Failed to cancel take-profit order"),
        }
    }

    /// Close the open position for `reason`.
    ///
    /// On failure the position stays open and the controller returns to
    /// `Holding` so the next tick retries.
    pub async fn exit(&mut self, reason: ExitReason, now: DateTime<Utc>) -> Result<Option<Action>, ExecutionError> {
        if self.position.is_none() {
            return Ok(None);
        }
        self.state = ControllerState::Exiting;
        match self.close_position(reason, now).await {
            Ok(action) => Ok(Some(action)),
            Err(e) => {
                warn!(error = %e, %reason, "Exit failed, position kept");
                increment_counter(CounterMetric::ExecutionErrors, "exit");
                self.state = ControllerState::Holding;
                Err(e)
            }
        }
    }

    async fn close_position(&mut self, reason: ExitReason, now: DateTime<Utc>) -> Result<Action, ExecutionError> {
        self.cancel_take_profit().await;
        let Some(position) = self.position.clone() else {
            return Err(ExecutionError::Rejected("no open position".into()));
        };

        let held = self
            .gateway
            .balance(AssetKind::Conditional(position.token_id.clone()))
            .await?;
        if !self.mode.is_paper() && held < self.config.dust_shares {
            warn!(%held, token_id = %position.token_id, "Nothing left to sell, clearing position");
            return Ok(self
                .settle(&position, Decimal::ZERO, position.size, ExitReason::BalanceLost, now)
                .await);
        }

        let book = self.gateway.order_book(&position.token_id).await?;
        let bid = book
            .best_bid()
            .ok_or_else(|| ExecutionError::EmptyBook(position.token_id.clone()))?;

        let (limit, size) = if self.mode.is_paper() {
            let limit = (bid - self.execution.paper_sell_offset).max(self.execution.min_sell_price);
            (limit, position.size)
        } else {
            let limit = (bid - self.execution.sell_offset).max(self.execution.min_sell_price);
            let size = (held * dec!(100)).floor() / dec!(100);
            (limit, size)
        };

        let order = self
            .gateway
            .create_order(OrderRequest::sell(&position.token_id, limit, size))
            .await?;
        let receipt = self.gateway.submit(order).await?;
        Ok(self.settle(&position, receipt.price, receipt.size, reason, now).await)
    }

    /// Book a completed exit and return to `Flat`
    pub(super) async fn settle(
        &mut self,
        position: &Position,
        price: Decimal,
        size: Decimal,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Action {
        let pnl = position.realized_pnl(price, size);

        self.log_trade(TradeRecord::new(
            now,
            &position.market_id,
            &position.token_id,
            position.direction,
            OrderSide::Sell,
            price,
            size,
            pnl,
            self.mode.is_paper(),
            Outcome::from_pnl(pnl),
        ))
        .await;
        if let Err(e) = self.store.clear_position(self.mode).await {
            error!(error = %e, "Failed to clear persisted position");
        }

        self.position = None;
        self.state = ControllerState::Flat;
        // A hedge flip may re-enter on the other side next cycle
        if reason != ExitReason::HedgeFlip {
            self.last_exit = Some(now);
        }
        self.risk.record_pnl(pnl);
        increment_counter(CounterMetric::Exits, reason.as_str());

        info!(
            mode = self.mode.as_str(),
            %reason,
            direction = %position.direction,
            entry = %position.entry_price,
            exit = %price,
            %size,
            %pnl,
            "Position closed"
        );
        Action::Exited { reason, price, pnl }
    }

    /// Per-tick check of the open position.
    ///
    /// Reconciles the venue balance, updates the ROI high-water mark and
    /// fires the first exit rule that triggers.
    pub async fn monitor(
        &mut self,
        atr: Option<f64>,
        reference_price: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Action>, ExecutionError> {
        let Some(position) = self.position.clone() else {
            return Ok(None);
        };

        // Only a balance that actually reads zero may write the position off
        let held = match self
            .gateway
            .balance(AssetKind::Conditional(position.token_id.clone()))
            .await
        {
            Ok(held) => held,
            Err(e) => {
                warn!(error = %e, token_id = %position.token_id, "Balance check failed, skipping monitor tick");
                return Ok(None);
            }
        };
        let grace = Duration::seconds(self.config.grace_period_secs);
        if position.check_balance(held, now, grace, self.config.dust_shares) == BalanceCheck::Lost {
            warn!(token_id = %position.token_id, "Position tokens gone after grace period");
            return Ok(Some(
                self.settle(&position, Decimal::ZERO, position.size, ExitReason::BalanceLost, now)
                    .await,
            ));
        }

        let book = self.gateway.order_book(&position.token_id).await?;
        let Some(bid) = book.best_bid() else {
            debug!(token_id = %position.token_id, "No bids, skipping monitor tick");
            return Ok(None);
        };

        let roi = position.roi(bid);
        set_gauge(GaugeMetric::PositionRoi, roi.to_f64().unwrap_or(0.0));
        let mut updated = position;
        if updated.record_roi(roi) {
            self.persist(&updated).await;
            self.position = Some(updated.clone());
        }

        let trail = self
            .policy
            .trail_distance(atr.unwrap_or(self.config.fallback_atr), reference_price);
        match self.policy.evaluate(&updated, bid, trail) {
            Some(reason) => {
                info!(
                    %reason,
                    %roi,
                    highest_roi = %updated.highest_roi,
                    %trail,
                    %bid,
                    "Exit rule triggered"
                );
                self.exit(reason, now).await
            }
            None => Ok(None),
        }
    }

    /// Collateral plus the open position marked to the best bid
    pub async fn account_value(&self, now: DateTime<Utc>) -> Result<Decimal, ExecutionError> {
        let collateral = self.gateway.balance(AssetKind::Collateral).await?;
        let Some(position) = &self.position else {
            return Ok(collateral);
        };

        let mark = match self.gateway.order_book(&position.token_id).await {
            Err(e) => {
                debug!(error = %e, "Book unavailable, marking at entry");
                position.entry_price
            }
            Ok(book) => match book.best_bid() {
                Some(bid) => bid,
                None if position.age(now) < Duration::seconds(self.config.low_liquidity_age_secs) => {
                    position.entry_price.max(self.config.low_liquidity_floor)
                }
                None => self.config.recovery_entry_price,
            },
        };
        Ok(collateral + position.size * mark)
    }

    /// Run the drawdown breaker against the current account value
    pub async fn check_risk(&mut self, now: DateTime<Utc>) -> Result<BreakerState, ExecutionError> {
        let value = self.account_value(now).await?;
        let state = self.risk.check(value, now);

        set_gauge(GaugeMetric::AccountValue, value.to_f64().unwrap_or(0.0));
        set_gauge(
            GaugeMetric::DrawdownPct,
            (self.risk.drawdown(value) * dec!(100)).to_f64().unwrap_or(0.0),
        );
        set_gauge(
            GaugeMetric::Halted,
            if state == BreakerState::Halted { 1.0 } else { 0.0 },
        );
        Ok(state)
    }

    pub(super) async fn persist(&self, position: &Position) {
        if let Err(e) = self.store.save_position(self.mode, position).await {
            error!(error = %e, token_id = %position.token_id, "Failed to persist position");
        }
    }

    pub(super) async fn log_trade(&self, record: TradeRecord) {
        if let Err(e) = self.store.append_trade(record).await {
            error!(error = %e, "Failed to append trade record");
        }
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "up",
        Direction::Down => "down",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::execution::{Receipt, SignedOrder};
    use crate::market::WindowSource;
    use crate::orderbook::{OrderBook, PriceLevel};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Scripted venue: fixed books and balances, records every order
    #[derive(Default)]
    struct MockGateway {
        books: Mutex<HashMap<String, (Vec<Decimal>, Vec<Decimal>)>>,
        collateral: Mutex<Decimal>,
        held: Mutex<HashMap<String, Decimal>>,
        orders: Mutex<Vec<OrderRequest>>,
        cancels: Mutex<Vec<String>>,
        held_unavailable: Mutex<bool>,
    }

    impl MockGateway {
        fn with_book(self, token: &str, bids: &[Decimal], asks: &[Decimal]) -> Self {
            self.books
                .lock()
                .unwrap()
                .insert(token.to_string(), (bids.to_vec(), asks.to_vec()));
            self
        }

        fn with_collateral(self, amount: Decimal) -> Self {
            *self.collateral.lock().unwrap() = amount;
            self
        }

        fn hold(&self, token: &str, shares: Decimal) {
            self.held.lock().unwrap().insert(token.to_string(), shares);
        }

        fn fail_held(&self, failing: bool) {
            *self.held_unavailable.lock().unwrap() = failing;
        }
    }

    fn levels(prices: &[Decimal]) -> Vec<PriceLevel> {
        prices
            .iter()
            .map(|&price| PriceLevel {
                price,
                size: dec!(500),
            })
            .collect()
    }

    #[async_trait]
    impl ExecutionGateway for MockGateway {
        async fn order_book(&self, token_id: &str) -> Result<OrderBook, ExecutionError> {
            let books = self.books.lock().unwrap();
            let (bids, asks) = books.get(token_id).cloned().unwrap_or_default();
            Ok(OrderBook::from_levels(token_id, levels(&bids), levels(&asks)))
        }

        async fn create_order(&self, request: OrderRequest) -> Result<SignedOrder, ExecutionError> {
            Ok(SignedOrder {
                client_id: Uuid::new_v4(),
                request,
                payload: String::new(),
            })
        }

        async fn submit(&self, order: SignedOrder) -> Result<Receipt, ExecutionError> {
            let mut orders = self.orders.lock().unwrap();
            orders.push(order.request.clone());
            Ok(Receipt {
                order_id: format!("order-{}", orders.len()),
                price: order.request.price,
                size: order.request.size,
            })
        }

        async fn cancel(&self, order_id: &str) -> Result<(), ExecutionError> {
            self.cancels.lock().unwrap().push(order_id.to_string());
            Ok(())
        }

        async fn balance(&self, asset: AssetKind) -> Result<Decimal, ExecutionError> {
            if matches!(asset, AssetKind::Conditional(_)) && *self.held_unavailable.lock().unwrap() {
                return Err(ExecutionError::Worker("timeout".into()));
            }
            Ok(match asset {
                AssetKind::Collateral => *self.collateral.lock().unwrap(),
                AssetKind::Conditional(token) => self
                    .held
                    .lock()
                    .unwrap()
                    .get(&token)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 16, 3, 0).unwrap()
    }

    fn market() -> Market {
        Market {
            id: "m1".into(),
            question: "Bitcoin Up or Down - March 5, 11:00AM-11:15AM ET".into(),
            yes_token: "yes".into(),
            no_token: "no".into(),
            window_start: Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2025, 3, 5, 16, 15, 0).unwrap(),
            window_source: WindowSource::Title,
            strike_price: None,
            strike_source: None,
            best_bid: Some(dec!(0.55)),
            best_ask: Some(dec!(0.57)),
            last_trade: None,
            is_updown: true,
            minutes_to_expiry: 12.0,
        }
    }

    fn controller(mode: ExecutionMode, gateway: MockGateway) -> (PositionController, Arc<MockGateway>, Arc<MemoryStore>) {
        let mut config = Config::default();
        config.execution.mode = mode;
        if mode == ExecutionMode::Live {
            config.execution.private_key = Some("0xabc".into());
        }
        let gateway = Arc::new(gateway);
        let store = Arc::new(MemoryStore::new());
        let controller = PositionController::new(
            &config,
            Arc::clone(&gateway) as Arc<dyn ExecutionGateway>,
            Arc::clone(&store) as Arc<dyn Persistence>,
        );
        (controller, gateway, store)
    }

    #[tokio::test]
    async fn test_paper_entry_fills_at_ask() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.38)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, store) = controller(ExecutionMode::Paper, gw);

        let action = ctl.on_decision(0.82, 0, Some(&market()), now()).await.unwrap();
        let Some(Action::Entered { direction, price, size, .. }) = action else {
            panic!("expected entry, got {action:?}");
        };
        assert_eq!(direction, Direction::Up);
        assert_eq!(price, dec!(0.40));
        assert!(size > Decimal::ZERO);
        assert_eq!(ctl.state(), ControllerState::Holding);

        let orders = gw.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price, dec!(0.40));

        let saved = store.load_position(ExecutionMode::Paper).await.unwrap().unwrap();
        assert_eq!(saved.take_profit, dec!(0.90));
        assert!(saved.take_profit_order.is_none());

        let trades = store.recent_trades(10).await.unwrap();
        assert_eq!(trades[0].outcome, Outcome::Pending);
        assert_eq!(trades[0].side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_short_entry_buys_no_token() {
        let gw = MockGateway::default()
            .with_book("no", &[dec!(0.58)], &[dec!(0.60)])
            .with_collateral(dec!(1000));
        let (mut ctl, _, _) = controller(ExecutionMode::Paper, gw);

        let action = ctl.on_decision(0.25, 0, Some(&market()), now()).await.unwrap();
        assert!(matches!(
            action,
            Some(Action::Entered { direction: Direction::Down, ref token_id, .. }) if token_id == "no"
        ));
    }

    #[tokio::test]
    async fn test_neutral_and_veto_do_nothing() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.38)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, _) = controller(ExecutionMode::Paper, gw);

        assert!(ctl.on_decision(0.5, 0, Some(&market()), now()).await.unwrap().is_none());
        // Bearish divergence vetoes a long
        assert!(ctl.on_decision(0.82, -1, Some(&market()), now()).await.unwrap().is_none());
        assert!(gw.orders.lock().unwrap().is_empty());
        assert_eq!(ctl.state(), ControllerState::Flat);
    }

    #[tokio::test]
    async fn test_no_entry_near_expiry() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.38)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, _, _) = controller(ExecutionMode::Paper, gw);
        let late = Utc.with_ymd_and_hms(2025, 3, 5, 16, 14, 0).unwrap();
        assert!(ctl.on_decision(0.9, 0, Some(&market()), late).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_live_entry_refuses_expensive_ask() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.97)], &[dec!(0.985)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, _) = controller(ExecutionMode::Live, gw);

        let result = ctl.on_decision(0.9, 0, Some(&market()), now()).await;
        assert!(matches!(result, Err(ExecutionError::PriceTooHigh { .. })));
        assert!(gw.orders.lock().unwrap().is_empty());
        assert_eq!(ctl.state(), ControllerState::Flat);
    }

    #[tokio::test]
    async fn test_live_entry_places_take_profit() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.50)], &[dec!(0.52)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, _) = controller(ExecutionMode::Live, gw);

        ctl.on_decision(0.85, 0, Some(&market()), now()).await.unwrap();
        let orders = gw.orders.lock().unwrap();
        assert_eq!(orders.len(), 2);
        // Limit is ask + 0.02
        assert_eq!(orders[0].price, dec!(0.54));
        assert!(orders[0].size <= dec!(100));
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].price, dec!(0.90));

        let position = ctl.position().unwrap();
        assert_eq!(position.entry_price, dec!(0.52));
        assert_eq!(position.take_profit_order.as_deref(), Some("order-2"));
    }

    #[tokio::test]
    async fn test_live_entry_needs_collateral() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.50)], &[dec!(0.52)])
            .with_collateral(dec!(1.5));
        let (mut ctl, _, _) = controller(ExecutionMode::Live, gw);
        let result = ctl.on_decision(0.85, 0, Some(&market()), now()).await;
        assert!(matches!(result, Err(ExecutionError::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn test_empty_book_aborts_entry() {
        let gw = MockGateway::default().with_collateral(dec!(1000));
        let (mut ctl, _, _) = controller(ExecutionMode::Paper, gw);
        let result = ctl.on_decision(0.85, 0, Some(&market()), now()).await;
        assert!(matches!(result, Err(ExecutionError::EmptyBook(_))));
        assert!(ctl.position().is_none());
    }

    #[tokio::test]
    async fn test_hedge_flip_exits_without_cooldown() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.38)], &[dec!(0.40)])
            .with_book("no", &[dec!(0.58)], &[dec!(0.60)])
            .with_collateral(dec!(1000));
        let (mut ctl, _, store) = controller(ExecutionMode::Paper, gw);

        ctl.on_decision(0.82, 0, Some(&market()), now()).await.unwrap();
        let later = now() + Duration::seconds(30);
        let action = ctl.on_decision(0.15, 0, Some(&market()), later).await.unwrap();
        let Some(Action::Exited { reason, price, .. }) = action else {
            panic!("expected exit, got {action:?}");
        };
        assert_eq!(reason, ExitReason::HedgeFlip);
        // Paper sells one tick under the bid
        assert_eq!(price, dec!(0.37));
        assert!(store.load_position(ExecutionMode::Paper).await.unwrap().is_none());

        // Opposite side is open right away
        let action = ctl.on_decision(0.15, 0, Some(&market()), later).await.unwrap();
        assert!(matches!(action, Some(Action::Entered { direction: Direction::Down, .. })));
    }

    #[tokio::test]
    async fn test_cooldown_after_stop() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.33)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, _) = controller(ExecutionMode::Paper, gw);

        ctl.on_decision(0.82, 0, Some(&market()), now()).await.unwrap();
        let size = ctl.position().unwrap().size;
        gw.hold("yes", size);

        // 0.33 vs entry 0.40 is -17.5%
        let action = ctl.monitor(None, 97_000.0, now() + Duration::seconds(5)).await.unwrap();
        assert!(matches!(action, Some(Action::Exited { reason: ExitReason::HardStop, .. })));

        let soon = now() + Duration::seconds(30);
        assert!(ctl.on_decision(0.82, 0, Some(&market()), soon).await.unwrap().is_none());
        let later = now() + Duration::seconds(70);
        assert!(ctl.on_decision(0.82, 0, Some(&market()), later).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_monitor_raises_high_water_mark() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.44)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, store) = controller(ExecutionMode::Paper, gw);

        ctl.on_decision(0.82, 0, Some(&market()), now()).await.unwrap();
        gw.hold("yes", dec!(10));
        let action = ctl.monitor(None, 97_000.0, now()).await.unwrap();
        assert!(action.is_none());

        let saved = store.load_position(ExecutionMode::Paper).await.unwrap().unwrap();
        assert_eq!(saved.highest_roi, dec!(10));
    }

    #[tokio::test]
    async fn test_live_balance_lost_after_grace() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.50)], &[dec!(0.52)])
            .with_collateral(dec!(1000));
        let (mut ctl, _, store) = controller(ExecutionMode::Live, gw);
        ctl.on_decision(0.85, 0, Some(&market()), now()).await.unwrap();

        // Zero balance inside the grace period is tolerated
        let action = ctl.monitor(None, 97_000.0, now() + Duration::seconds(60)).await.unwrap();
        assert!(action.is_none());
        assert!(ctl.position().is_some());

        let action = ctl.monitor(None, 97_000.0, now() + Duration::seconds(200)).await.unwrap();
        assert!(matches!(action, Some(Action::Exited { reason: ExitReason::BalanceLost, .. })));
        assert!(store.load_position(ExecutionMode::Live).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_balance_query_keeps_position() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.50)], &[dec!(0.52)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, store) = controller(ExecutionMode::Live, gw);
        ctl.on_decision(0.85, 0, Some(&market()), now()).await.unwrap();
        let held = ctl.position().unwrap().size;
        gw.hold("yes", held);
        gw.fail_held(true);
        let risk_before = ctl.risk().state().clone();
        let trades_before = store.recent_trades(100).await.unwrap().len();

        for secs in [60, 200, 600] {
            let action = ctl.monitor(None, 97_000.0, now() + Duration::seconds(secs)).await.unwrap();
            assert!(action.is_none());
        }

        assert_eq!(ctl.position().unwrap().size, held);
        let saved = store.load_position(ExecutionMode::Live).await.unwrap().unwrap();
        assert_eq!(saved.size, held);
        assert_eq!(store.recent_trades(100).await.unwrap().len(), trades_before);
        let risk_after = ctl.risk().state();
        assert_eq!(risk_after.realized_pnl_today, risk_before.realized_pnl_today);
        assert_eq!(risk_after.halted, risk_before.halted);
        assert!(!ctl.risk().is_halted());

        // Venue answers again and the position is still monitored normally
        gw.fail_held(false);
        let action = ctl.monitor(None, 97_000.0, now() + Duration::seconds(660)).await.unwrap();
        assert!(!matches!(action, Some(Action::Exited { reason: ExitReason::BalanceLost, .. })));
    }

    #[tokio::test]
    async fn test_live_exit_cancels_take_profit_and_floors_size() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.50)], &[dec!(0.52)])
            .with_collateral(dec!(1000));
        let (mut ctl, gw, _) = controller(ExecutionMode::Live, gw);
        ctl.on_decision(0.85, 0, Some(&market()), now()).await.unwrap();
        gw.hold("yes", dec!(12.348));

        let action = ctl.exit(ExitReason::TrailingStop, now()).await.unwrap();
        assert!(matches!(action, Some(Action::Exited { reason: ExitReason::TrailingStop, .. })));
        assert_eq!(*gw.cancels.lock().unwrap(), vec!["order-2".to_string()]);

        let orders = gw.orders.lock().unwrap();
        let sell = orders.last().unwrap();
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.size, dec!(12.34));
        assert_eq!(sell.price, dec!(0.45));
    }

    #[tokio::test]
    async fn test_account_value_marks_to_bid() {
        let gw = MockGateway::default()
            .with_book("yes", &[dec!(0.45)], &[dec!(0.40)])
            .with_collateral(dec!(1000));
        let (mut ctl, _, _) = controller(ExecutionMode::Live, gw);
        assert_eq!(ctl.account_value(now()).await.unwrap(), dec!(1000));

        ctl.position = Some(Position::open(
            "yes",
            "m1",
            Direction::Up,
            dec!(0.40),
            dec!(10),
            now(),
            &PositionConfig::default(),
        ));
        assert_eq!(ctl.account_value(now()).await.unwrap(), dec!(1004.5));
    }

    #[tokio::test]
    async fn test_account_value_without_bids() {
        let gw = MockGateway::default().with_collateral(dec!(100));
        let (mut ctl, _, _) = controller(ExecutionMode::Live, gw);
        ctl.position = Some(Position::open(
            "yes",
            "m1",
            Direction::Up,
            dec!(0.02),
            dec!(10),
            now(),
            &PositionConfig::default(),
        ));

        // Young position: max(entry, floor)
        assert_eq!(ctl.account_value(now()).await.unwrap(), dec!(100.5));
        // Old position: safe midpoint
        let old = now() + Duration::seconds(400);
        assert_eq!(ctl.account_value(old).await.unwrap(), dec!(105));
    }

    #[tokio::test]
    async fn test_restore_picks_up_saved_position() {
        let gw = MockGateway::default();
        let (mut ctl, _, store) = controller(ExecutionMode::Paper, gw);
        let position = Position::open(
            "yes",
            "m1",
            Direction::Up,
            dec!(0.5),
            dec!(4),
            now(),
            &PositionConfig::default(),
        );
        store.save_position(ExecutionMode::Paper, &position).await.unwrap();

        assert_eq!(ctl.restore().await.unwrap(), Some(&position));
        assert_eq!(ctl.state(), ControllerState::Holding);
    }
}
