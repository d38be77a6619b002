//! Persistence module
//!
//! Append-only trade and signal logs, one position record per trading mode,
//! and a small settings store holding the simulated balance.

mod file;
mod ledger;
mod memory;
mod types;

pub use file::FileStore;
pub use ledger::{PaperLedger, PAPER_BALANCE_KEY};
pub use memory::MemoryStore;
pub use types::{Outcome, SignalRecord, StoreError, TradeRecord};

use crate::config::ExecutionMode;
use crate::position::Position;
use async_trait::async_trait;
use uuid::Uuid;

/// Read-modify-write step applied to one setting
pub type SettingUpdate = Box<dyn FnOnce(Option<String>) -> Result<String, StoreError> + Send>;

/// Storage collaborator of the position controller.
///
/// Read-modify-write sequences are serialized inside the implementation.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn append_trade(&self, record: TradeRecord) -> Result<(), StoreError>;

    /// Most recent trades, newest first
    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError>;

    /// Trades still waiting for a market resolution, oldest first
    async fn pending_outcomes(&self) -> Result<Vec<TradeRecord>, StoreError>;

    /// Settle a pending trade. Returns `false` if the trade is unknown or
    /// already settled, in which case nothing changes.
    async fn set_outcome(&self, trade_id: Uuid, outcome: Outcome) -> Result<bool, StoreError>;

    async fn load_position(&self, mode: ExecutionMode) -> Result<Option<Position>, StoreError>;

    /// Upsert the position of `mode`
    async fn save_position(&self, mode: ExecutionMode, position: &Position) -> Result<(), StoreError>;

    async fn clear_position(&self, mode: ExecutionMode) -> Result<(), StoreError>;

    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Replace a setting with `update(current)` as one exclusive step.
    /// Returns the stored value; on error nothing is written.
    async fn update_setting(&self, key: &str, update: SettingUpdate) -> Result<String, StoreError>;

    async fn append_signal(&self, record: SignalRecord) -> Result<(), StoreError>;
}
