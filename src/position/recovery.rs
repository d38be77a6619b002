//! Recovery and settlement
//!
//! Adoption of venue holdings the controller lost track of, settlement of
//! paper positions at market resolution, and backfilling the outcome of
//! logged entries once their markets resolve.

use super::controller::{Action, ControllerState, PositionController};
use super::{Direction, ExitReason, Position};
use crate::data::{Outcome, TradeRecord};
use crate::execution::{AssetKind, ExecutionError, OrderSide};
use crate::market::{Market, MarketCatalog};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

impl PositionController {
    /// Adopt outcome tokens held on the venue while no position is tracked.
    ///
    /// Rate limited to one scan per `ghost_recovery_interval_secs`. The
    /// first token of `markets` with a balance above dust is adopted at the
    /// configured recovery entry price.
    pub async fn recover_ghost(
        &mut self,
        markets: &[Market],
        now: DateTime<Utc>,
    ) -> Result<Option<&Position>, ExecutionError> {
        if let Some(last) = self.last_recovery {
            if now - last < Duration::seconds(self.config.ghost_recovery_interval_secs) {
                return Ok(None);
            }
        }
        self.last_recovery = Some(now);
        if self.position.is_some() {
            return Ok(None);
        }

        for market in markets {
            for token_id in [&market.yes_token, &market.no_token] {
                let held = self
                    .gateway
                    .balance(AssetKind::Conditional(token_id.clone()))
                    .await?;
                if held < self.config.dust_shares {
                    continue;
                }
                let Some(direction) = Direction::for_token(market, token_id) else {
                    continue;
                };
                return Ok(Some(self.adopt(market, token_id, direction, held, now).await));
            }
        }
        Ok(None)
    }

    async fn adopt(
        &mut self,
        market: &Market,
        token_id: &str,
        direction: Direction,
        held: Decimal,
        now: DateTime<Utc>,
    ) -> &Position {
        let entry = self.config.recovery_entry_price;
        let position = Position::open(token_id, &market.id, direction, entry, held, now, &self.config);
        warn!(
            market = %market.id,
            %token_id,
            %direction,
            size = %held,
            %entry,
            "Adopting untracked holding"
        );

        self.persist(&position).await;
        self.log_trade(TradeRecord::new(
            now,
            &market.id,
            token_id,
            direction,
            OrderSide::Buy,
            entry,
            held,
            Decimal::ZERO,
            self.mode.is_paper(),
            Outcome::Pending,
        ))
        .await;
        self.state = ControllerState::Holding;
        self.position.insert(position)
    }

    /// Settle an open paper position whose market has resolved.
    ///
    /// Winning shares pay 1.0 and losing shares 0.0; the proceeds go
    /// straight to the paper ledger.
    pub async fn settle_paper_resolution(
        &mut self,
        catalog: &dyn MarketCatalog,
        now: DateTime<Utc>,
    ) -> Result<Option<Action>, ExecutionError> {
        if !self.mode.is_paper() {
            return Ok(None);
        }
        let Some(position) = self.position.clone() else {
            return Ok(None);
        };
        if position.market_id.is_empty() {
            return Ok(None);
        }
        let Some(resolution) = catalog.fetch_resolution(&position.market_id).await? else {
            return Ok(None);
        };

        let price = if position.direction.wins(resolution) {
            Decimal::ONE
        } else {
            Decimal::ZERO
        };
        let balance = self.ledger.credit(price * position.size).await?;
        info!(
            market = %position.market_id,
            ?resolution,
            direction = %position.direction,
            %price,
            %balance,
            "[PAPER] Position settled at resolution"
        );
        Ok(Some(
            self.settle(&position, price, position.size, ExitReason::Resolution, now)
                .await,
        ))
    }

    /// Backfill WIN/LOSS on logged entries whose markets have resolved.
    ///
    /// At most `resolution_batch` trades are looked up per call, rotating
    /// through the pending list so unresolved old trades cannot starve newer
    /// ones. Returns the number of trades settled.
    pub async fn reconcile_outcomes(&mut self, catalog: &dyn MarketCatalog) -> Result<usize, ExecutionError> {
        let pending = self.store.pending_outcomes().await?;
        if pending.is_empty() {
            self.reconcile_cursor = 0;
            return Ok(0);
        }
        let start = self.reconcile_cursor % pending.len();
        let checked = self.config.resolution_batch.min(pending.len());
        let mut settled = 0;

        for trade in pending.iter().cycle().skip(start).take(checked) {
            let resolution = match catalog.fetch_resolution(&trade.market_id).await {
                Ok(Some(resolution)) => resolution,
                Ok(None) => continue,
                Err(e) => {
                    debug!(market = %trade.market_id, error = %e, "Resolution lookup failed");
                    continue;
                }
            };
            let outcome = if trade.direction.wins(resolution) {
                Outcome::Win
            } else {
                Outcome::Loss
            };
            if self.store.set_outcome(trade.id, outcome).await? {
                info!(
                    trade_id = %trade.id,
                    market = %trade.market_id,
                    direction = %trade.direction,
                    ?outcome,
                    "Trade outcome resolved"
                );
                settled += 1;
            }
        }

        // Settled trades leave the list, shifting the rest down
        self.reconcile_cursor = start + checked - settled;
        Ok(settled)
    }
}
