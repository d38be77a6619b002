//! poly-updown: Decision engine for Polymarket 15-minute BTC up/down markets
//!
//! This library provides the core components for:
//! - Streaming candle, ticker and sentiment feeds
//! - Technical indicators over rolling candle windows
//! - Bayesian fusion of indicator evidence into an up-probability
//! - Market discovery via the Gamma API with strike latching
//! - Order book snapshots and liquidity checks
//! - Kelly sizing with a daily-loss circuit breaker
//! - A position controller with tiered exits and ghost recovery
//! - Paper and live execution gateways
//! - CSV trade and signal logs with outcome backfill
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod data;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod market;
pub mod orchestrator;
pub mod orderbook;
pub mod position;
pub mod predictor;
pub mod risk;
pub mod telemetry;
pub mod ws;
