//! WebSocket transport shared by the streaming feeds
//!
//! Reconnects with exponential backoff and re-subscribes on every connect.

mod client;
mod types;

pub use client::WsClient;
pub use types::{Backoff, WsConfig, WsError, WsMessage};
