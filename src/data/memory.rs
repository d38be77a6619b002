//! In-memory store

use super::{Outcome, Persistence, SettingUpdate, SignalRecord, StoreError, TradeRecord};
use crate::config::ExecutionMode;
use crate::position::Position;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    trades: Vec<TradeRecord>,
    signals: Vec<SignalRecord>,
    positions: HashMap<&'static str, Position>,
    settings: HashMap<String, String>,
}

/// Volatile [`Persistence`] for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every signal logged so far
    pub async fn signals(&self) -> Vec<SignalRecord> {
        self.inner.read().await.signals.clone()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn append_trade(&self, record: TradeRecord) -> Result<(), StoreError> {
        self.inner.write().await.trades.push(record);
        Ok(())
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.trades.iter().rev().take(limit).cloned().collect())
    }

    async fn pending_outcomes(&self) -> Result<Vec<TradeRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .trades
            .iter()
            .filter(|t| t.outcome.is_pending() && !t.market_id.is_empty())
            .cloned()
            .collect())
    }

    async fn set_outcome(&self, trade_id: Uuid, outcome: Outcome) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id && t.outcome.is_pending())
        {
            Some(trade) => {
                trade.outcome = outcome;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load_position(&self, mode: ExecutionMode) -> Result<Option<Position>, StoreError> {
        Ok(self.inner.read().await.positions.get(mode.as_str()).cloned())
    }

    async fn save_position(&self, mode: ExecutionMode, position: &Position) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .positions
            .insert(mode.as_str(), position.clone());
        Ok(())
    }

    async fn clear_position(&self, mode: ExecutionMode) -> Result<(), StoreError> {
        self.inner.write().await.positions.remove(mode.as_str());
        Ok(())
    }

    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn update_setting(&self, key: &str, update: SettingUpdate) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        let value = update(inner.settings.get(key).cloned())?;
        inner.settings.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn append_signal(&self, record: SignalRecord) -> Result<(), StoreError> {
        self.inner.write().await.signals.push(record);
        Ok(())
    }
}
