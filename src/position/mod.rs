//! Position module
//!
//! The single-position state machine: entry gating and sizing, exit rules,
//! venue balance reconciliation and recovery of untracked holdings.

mod controller;
mod exit;
mod recovery;
mod types;

pub use controller::{Action, ControllerState, PositionController};
pub use exit::{EntrySignal, ExitPolicy, ExitReason};
pub use types::{take_profit_level, BalanceCheck, Direction, Position};
