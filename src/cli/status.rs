//! Status command implementation

use crate::config::Config;
use crate::data::{FileStore, PaperLedger, Persistence};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recent trades to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub trades: usize,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = Arc::new(FileStore::open(&config.data.data_dir)?);

        println!("poly-updown status");
        println!("  Data dir: {}", store.dir().display());
        println!("  Mode: {}", config.execution.mode.as_str());

        let positions = store.positions().await?;
        if positions.is_empty() {
            println!("  Positions: none");
        }
        for (mode, position) in &positions {
            println!(
                "  Position [{}]: {} {} shares @ {} (TP {}, high ROI {}%)",
                mode,
                position.direction,
                position.size,
                position.entry_price,
                position.take_profit,
                position.highest_roi.round_dp(2)
            );
        }

        let ledger = PaperLedger::new(
            Arc::clone(&store) as Arc<dyn Persistence>,
            config.execution.paper_balance,
        );
        println!("  Paper balance: ${}", ledger.balance().await?.round_dp(2));

        let trades = store.recent_trades(self.trades).await?;
        println!("  Recent trades ({}):", trades.len());
        for trade in trades {
            println!(
                "    {} {:<4} {:<4} {} @ {} pnl {} {}{}",
                trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
                trade.side,
                trade.direction,
                trade.size,
                trade.price,
                trade.realized_pnl.round_dp(2),
                trade.outcome,
                if trade.is_paper { " [paper]" } else { "" }
            );
        }
        Ok(())
    }
}
