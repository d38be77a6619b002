//! Execution types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// A limit order before signing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    /// Shares
    pub size: Decimal,
}

impl OrderRequest {
    pub fn buy(token_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side: OrderSide::Buy,
            price,
            size,
        }
    }

    pub fn sell(token_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side: OrderSide::Sell,
            price,
            size,
        }
    }

    /// Collateral moved if the order fills completely
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// A signed order ready for submission
#[derive(Debug, Clone)]
pub struct SignedOrder {
    /// Client-side identifier
    pub client_id: Uuid,
    pub request: OrderRequest,
    /// Venue-specific signed body
    pub payload: String,
}

/// Venue acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub order_id: String,
    pub price: Decimal,
    pub size: Decimal,
}

/// Balance query target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// USDC collateral
    Collateral,
    /// Outcome token holdings
    Conditional(String),
}

/// Execution failures. The attempted entry or exit is abandoned and the
/// position stays as it was.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Order book for {0} has no liquidity on the required side")]
    EmptyBook(String),
    #[error("Best ask {ask} above limit {max}")]
    PriceTooHigh { ask: Decimal, max: Decimal },
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },
    #[error("Order rejected: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<crate::feed::FeedError> for ExecutionError {
    fn from(err: crate::feed::FeedError) -> Self {
        ExecutionError::Transport(err.to_string())
    }
}

impl From<crate::data::StoreError> for ExecutionError {
    fn from(err: crate::data::StoreError) -> Self {
        ExecutionError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_request_notional() {
        let order = OrderRequest::buy("yes-token", dec!(0.55), dec!(100));
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.notional(), dec!(55.00));
    }

    #[test]
    fn test_order_side_serde() {
        assert_eq!(serde_json::to_string(&OrderSide::Sell).unwrap(), "\"SELL\"");
        let side: OrderSide = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(side, OrderSide::Buy);
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::PriceTooHigh {
            ask: dec!(0.99),
            max: dec!(0.98),
        };
        assert_eq!(err.to_string(), "Best ask 0.99 above limit 0.98");
    }
}
