//! CLI interface for poly-updown
//!
//! Provides subcommands for:
//! - `run`: Start the trading engine
//! - `status`: Show persisted positions, balance and recent trades
//! - `config`: Show the effective configuration

mod run;
mod status;

pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-updown")]
#[command(about = "Decision engine for Polymarket 15-minute BTC up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading engine
    Run(RunArgs),
    /// Show current state
    Status(StatusArgs),
    /// Show the effective configuration
    Config,
}
