//! Simulated collateral balance for paper trading

use super::{Persistence, StoreError};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// Settings key of the simulated balance
pub const PAPER_BALANCE_KEY: &str = "paper_balance";

/// Paper collateral kept in the settings store, seeded from configuration
/// the first time it is read.
#[derive(Clone)]
pub struct PaperLedger {
    store: Arc<dyn Persistence>,
    initial: Decimal,
}

impl PaperLedger {
    pub fn new(store: Arc<dyn Persistence>, initial: Decimal) -> Self {
        Self { store, initial }
    }

    pub async fn balance(&self) -> Result<Decimal, StoreError> {
        match self.store.setting(PAPER_BALANCE_KEY).await? {
            Some(raw) => parse_balance(&raw),
            None => Ok(self.initial),
        }
    }

    /// Add `amount`; returns the new balance
    pub async fn credit(&self, amount: Decimal) -> Result<Decimal, StoreError> {
        let initial = self.initial;
        let stored = self
            .store
            .update_setting(
                PAPER_BALANCE_KEY,
                Box::new(move |current| {
                    let balance = match current {
                        Some(raw) => parse_balance(&raw)?,
                        None => initial,
                    };
                    Ok((balance + amount).to_string())
                }),
            )
            .await?;
        parse_balance(&stored)
    }

    /// Subtract `amount`; returns the new balance
    pub async fn debit(&self, amount: Decimal) -> Result<Decimal, StoreError> {
        self.credit(-amount).await
    }
}

fn parse_balance(raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw.trim()).map_err(|_| StoreError::Invalid {
        key: PAPER_BALANCE_KEY.to_string(),
        value: raw.to_string(),
    })
}
