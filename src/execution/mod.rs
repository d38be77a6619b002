//! Execution module
//!
//! Order-execution gateway contract, the paper gateway that simulates fills
//! against real public books, and the adapter that runs a blocking signing
//! backend off the async loop.

mod live;
mod paper;
mod types;

pub use live::{ClobBackend, LiveGateway};
pub use paper::PaperGateway;
pub use types::{AssetKind, ExecutionError, OrderRequest, OrderSide, Receipt, SignedOrder};

use crate::orderbook::OrderBook;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Venue operations the position controller relies on
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Current book with both sides sorted best-first
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, ExecutionError>;

    /// Build and sign a limit order
    async fn create_order(&self, request: OrderRequest) -> Result<SignedOrder, ExecutionError>;

    async fn submit(&self, order: SignedOrder) -> Result<Receipt, ExecutionError>;

    async fn cancel(&self, order_id: &str) -> Result<(), ExecutionError>;

    /// Collateral in USD or outcome tokens in shares
    async fn balance(&self, asset: AssetKind) -> Result<Decimal, ExecutionError>;
}
