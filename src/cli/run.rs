//! Run command implementation

use crate::config::{Config, ExecutionMode};
use crate::data::{FileStore, PaperLedger, Persistence};
use crate::execution::{ExecutionGateway, PaperGateway};
use crate::feed::BinanceRest;
use crate::market::GammaClient;
use crate::orchestrator::{spawn_feeds, Engine, EngineContext, EVENT_BUFFER};
use crate::orderbook::{BookClient, BookSource};
use crate::position::PositionController;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Force paper trading regardless of PAPER_TRADING (applied at config load)
    #[arg(long)]
    pub paper: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let store: Arc<dyn Persistence> = Arc::new(FileStore::open(&config.data.data_dir)?);
        let books: Arc<dyn BookSource> = Arc::new(BookClient::new(
            &config.market.clob_url,
            Duration::from_secs(config.market.request_timeout_secs),
        )?);
        let gateway: Arc<dyn ExecutionGateway> = match config.execution.mode {
            ExecutionMode::Paper => {
                let ledger = PaperLedger::new(Arc::clone(&store), config.execution.paper_balance);
                tracing::info!(balance = %ledger.balance().await?, "Paper trading");
                Arc::new(PaperGateway::new(Arc::clone(&books), Arc::clone(&store), ledger))
            }
            ExecutionMode::Live => {
                anyhow::bail!(
                    "Live trading needs an order-signing backend; this build only links the paper gateway"
                );
            }
        };

        let history = Arc::new(BinanceRest::new(
            &config.feed.binance_rest_url,
            &config.feed.binance_futures_url,
            Duration::from_secs(config.feed.request_timeout_secs),
        )?);
        let catalog = Arc::new(GammaClient::new(&config.market)?);

        let controller = PositionController::new(&config, gateway, Arc::clone(&store));
        let feed_config = config.feed.clone();
        let (mut engine, mut status_rx) = Engine::new(
            config,
            controller,
            EngineContext {
                catalog,
                books,
                history,
                store,
            },
        );
        engine.start(Utc::now()).await;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        spawn_feeds(&feed_config, tx).await?;

        tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                if let Some(status) = status_rx.borrow_and_update().as_ref() {
                    tracing::debug!(
                        price = status.price,
                        probability = status.probability,
                        signal = status.signal,
                        market = status.market.as_ref().map(|m| m.question.as_str()).unwrap_or("-"),
                        time_left = status.market.as_ref().map(|m| m.time_left.as_str()).unwrap_or("-"),
                        halted = status.halted,
                        "Status"
                    );
                }
            }
        });

        engine
            .run(rx, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for interrupt");
                    std::future::pending::<()>().await;
                }
            })
            .await
    }
}
