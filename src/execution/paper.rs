//! Paper trading gateway
//!
//! Books come from the live venue; fills are simulated at the order price
//! and settle against the persisted simulated balance.

use super::{
    AssetKind, ExecutionError, ExecutionGateway, OrderRequest, OrderSide, Receipt, SignedOrder,
};
use crate::config::ExecutionMode;
use crate::data::{PaperLedger, Persistence};
use crate::orderbook::{BookSource, OrderBook};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Paper trading gateway with simulated fills
pub struct PaperGateway {
    books: Arc<dyn BookSource>,
    store: Arc<dyn Persistence>,
    ledger: PaperLedger,
}

impl PaperGateway {
    pub fn new(books: Arc<dyn BookSource>, store: Arc<dyn Persistence>, ledger: PaperLedger) -> Self {
        Self {
            books,
            store,
            ledger,
        }
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, ExecutionError> {
        Ok(self.books.order_book(token_id).await?)
    }

    async fn create_order(&self, request: OrderRequest) -> Result<SignedOrder, ExecutionError> {
        Ok(SignedOrder {
            client_id: Uuid::new_v4(),
            request,
            payload: String::new(),
        })
    }

    async fn submit(&self, order: SignedOrder) -> Result<Receipt, ExecutionError> {
        let request = &order.request;
        let notional = request.notional();

        match request.side {
            OrderSide::Buy => {
                let available = self.ledger.balance().await?;
                if notional > available {
                    return Err(ExecutionError::InsufficientBalance {
                        available,
                        required: notional,
                    });
                }
                let balance = self.ledger.debit(notional).await?;
                tracing::info!(
                    token_id = %request.token_id,
                    price = %request.price,
                    size = %request.size,
                    %balance,
                    "[PAPER] Buy filled"
                );
            }
            OrderSide::Sell => {
                let balance = self.ledger.credit(notional).await?;
                tracing::info!(
                    token_id = %request.token_id,
                    price = %request.price,
                    size = %request.size,
                    proceeds = %notional,
                    %balance,
                    "[PAPER] Sell filled"
                );
            }
        }

        Ok(Receipt {
            order_id: order.client_id.to_string(),
            price: request.price,
            size: request.size,
        })
    }

    async fn cancel(&self, order_id: &str) -> Result<(), ExecutionError> {
        tracing::debug!(order_id, "[PAPER] Cancel is a no-op");
        Ok(())
    }

    async fn balance(&self, asset: AssetKind) -> Result<Decimal, ExecutionError> {
        match asset {
            AssetKind::Collateral => Ok(self.ledger.balance().await?),
            AssetKind::Conditional(token_id) => {
                let position = self.store.load_position(ExecutionMode::Paper).await?;
                Ok(position
                    .filter(|p| p.token_id == token_id)
                    .map(|p| p.size)
                    .unwrap_or(Decimal::ZERO))
            }
        }
    }
}
