//! Live gateway over a blocking CLOB backend
//!
//! Signing and broker calls are synchronous. Each one runs on the blocking
//! pool so the stream tasks keep flowing while an order is in flight.

use super::{
    AssetKind, ExecutionError, ExecutionGateway, OrderRequest, OrderSide, Receipt, SignedOrder,
};
use crate::orderbook::{BookSource, OrderBook};
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Synchronous signing and order-routing client of the venue
pub trait ClobBackend: Send + Sync + 'static {
    /// Sign `request`, returning the venue order body
    fn sign(&self, request: &OrderRequest) -> Result<String, ExecutionError>;

    /// Post a signed body; returns the venue order id
    fn post(&self, payload: &str) -> Result<String, ExecutionError>;

    /// Alternate submission path for entries
    fn post_alternate(&self, payload: &str) -> Result<String, ExecutionError> {
        self.post(payload)
    }

    fn cancel(&self, order_id: &str) -> Result<(), ExecutionError>;

    fn balance(&self, asset: &AssetKind) -> Result<Decimal, ExecutionError>;
}

/// [`ExecutionGateway`] for real orders
pub struct LiveGateway<B: ClobBackend> {
    backend: Arc<B>,
    books: Arc<dyn BookSource>,
    alternate_submission: bool,
}

impl<B: ClobBackend> LiveGateway<B> {
    pub fn new(backend: B, books: Arc<dyn BookSource>, alternate_submission: bool) -> Self {
        Self {
            backend: Arc::new(backend),
            books,
            alternate_submission,
        }
    }

    /// Run `f` against the backend on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T, ExecutionError>
    where
        T: Send + 'static,
        F: FnOnce(&B) -> Result<T, ExecutionError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || f(&backend))
            .await
            .map_err(|e| ExecutionError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl<B: ClobBackend> ExecutionGateway for LiveGateway<B> {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, ExecutionError> {
        let start = Instant::now();
        let book = self.books.order_book(token_id).await;
        record_latency(LatencyMetric::OrderBook, start.elapsed());
        Ok(book?)
    }

    async fn create_order(&self, request: OrderRequest) -> Result<SignedOrder, ExecutionError> {
        let to_sign = request.clone();
        let payload = self.blocking(move |b| b.sign(&to_sign)).await?;
        Ok(SignedOrder {
            client_id: Uuid::new_v4(),
            request,
            payload,
        })
    }

    async fn submit(&self, order: SignedOrder) -> Result<Receipt, ExecutionError> {
        let alternate = self.alternate_submission && order.request.side == OrderSide::Buy;
        let payload = order.payload.clone();
        let start = Instant::now();

        let result = self
            .blocking(move |b| {
                if alternate {
                    match b.post_alternate(&payload) {
                        Ok(id) => return Ok(id),
                        Err(e) => {
                            tracing::warn!(error = %e, "Alternate submission failed, using primary path");
                        }
                    }
                }
                b.post(&payload)
            })
            .await;
        record_latency(LatencyMetric::OrderSubmission, start.elapsed());

        let order_id = result.inspect_err(|_| {
            increment_counter(CounterMetric::ExecutionErrors, "submit");
        })?;
        tracing::info!(
            %order_id,
            side = %order.request.side,
            token_id = %order.request.token_id,
            price = %order.request.price,
            size = %order.request.size,
            "Order submitted"
        );
        Ok(Receipt {
            order_id,
            price: order.request.price,
            size: order.request.size,
        })
    }

    async fn cancel(&self, order_id: &str) -> Result<(), ExecutionError> {
        let id = order_id.to_string();
        self.blocking(move |b| b.cancel(&id)).await
    }

    async fn balance(&self, asset: AssetKind) -> Result<Decimal, ExecutionError> {
        self.blocking(move |b| b.balance(&asset)).await
    }
}
