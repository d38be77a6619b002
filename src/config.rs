//! Configuration types for poly-updown
//!
//! Every section and field carries a serde default equal to the production
//! constant, so an empty TOML file yields a fully usable configuration.
//! Process-level switches (trading mode, risk profile, paper balance,
//! submission path, signing key) come from the environment and are applied
//! on top of the file with [`Config::apply_env`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable holding the order-signing key
pub const PRIVATE_KEY_ENV: &str = "POLYGON_PRIVATE_KEY";

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing credential: {0} must be set for live trading")]
    MissingCredential(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Spot symbol on the primary venue
    pub symbol: String,
    /// Settlement-granularity candle interval
    pub primary_interval: String,
    /// Fine-granularity candle interval
    pub secondary_interval: String,
    /// Candles retained for the primary interval
    pub primary_capacity: usize,
    /// Candles retained for the secondary interval
    pub secondary_capacity: usize,
    /// Closed primary candles required before any decision runs
    pub warmup_candles: usize,
    pub binance_ws_url: String,
    pub binance_rest_url: String,
    pub binance_futures_url: String,
    pub coinbase_ws_url: String,
    pub coinbase_product: String,
    pub sentiment_url: String,
    pub sentiment_interval_secs: u64,
    /// First reconnect delay in milliseconds
    pub reconnect_initial_ms: u64,
    /// Reconnect delay ceiling in seconds
    pub reconnect_max_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            primary_interval: "15m".to_string(),
            secondary_interval: "1m".to_string(),
            primary_capacity: 200,
            secondary_capacity: 100,
            warmup_candles: 50,
            binance_ws_url: "wss://stream.binance.com:9443/ws".to_string(),
            binance_rest_url: "https://api.binance.com".to_string(),
            binance_futures_url: "https://fapi.binance.com".to_string(),
            coinbase_ws_url: "wss://ws-feed.exchange.coinbase.com".to_string(),
            coinbase_product: "BTC-USD".to_string(),
            sentiment_url: "https://api.alternative.me/fng/".to_string(),
            sentiment_interval_secs: 300,
            reconnect_initial_ms: 1000,
            reconnect_max_secs: 30,
            request_timeout_secs: 5,
        }
    }
}

/// Market discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    pub gamma_url: String,
    pub clob_url: String,
    /// Catalog series holding the 15-minute BTC events
    pub series_id: String,
    pub page_limit: u32,
    /// Any of these must appear in the question text
    pub asset_keywords: Vec<String>,
    /// Entries are refused with less time than this left
    pub min_minutes_to_expiry: i64,
    pub max_duration_minutes: i64,
    /// Ceiling on remaining time for title-parsed flash windows
    pub max_lookahead_minutes: i64,
    /// Window length assumed when the catalog omits a start time
    pub default_window_minutes: i64,
    pub liquidity_floor: Decimal,
    pub liquidity_ceiling: Decimal,
    pub max_spread: Decimal,
    /// Description-derived strikes below this are ignored
    pub min_description_strike: f64,
    /// Fixed UTC offset of the exchange timezone used in titles
    pub exchange_utc_offset_hours: i32,
    pub request_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            clob_url: "https://clob.polymarket.com".to_string(),
            series_id: "10192".to_string(),
            page_limit: 50,
            asset_keywords: vec!["Bitcoin".to_string(), "BTC".to_string()],
            min_minutes_to_expiry: 2,
            max_duration_minutes: 60,
            max_lookahead_minutes: 25,
            default_window_minutes: 15,
            liquidity_floor: dec!(0.10),
            liquidity_ceiling: dec!(0.90),
            max_spread: dec!(0.05),
            min_description_strike: 1000.0,
            exchange_utc_offset_hours: -5,
            request_timeout_secs: 10,
        }
    }
}

/// Signal fusion and decision thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Prior probability of an UP settlement
    pub prior: f64,
    pub buy_threshold: f64,
    pub short_threshold: f64,
    /// Entries are vetoed on bearish divergence at or above this probability
    pub divergence_veto_threshold: f64,
    /// Cross-venue lead, in percent, needed to register a divergence
    pub divergence_threshold_pct: f64,
    /// Fallback decision cadence when no candle closes
    pub decision_interval_secs: u64,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            prior: 0.5,
            buy_threshold: 0.78,
            short_threshold: 0.30,
            divergence_veto_threshold: 0.65,
            divergence_threshold_pct: 0.05,
            decision_interval_secs: 30,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
        }
    }
}

/// Risk profile selecting the Kelly multiplier and cap
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    #[default]
    Normal,
    Aggressive,
}

/// Risk management configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    pub profile: RiskProfile,
    pub kelly_multiplier: Decimal,
    pub risk_cap: Decimal,
    pub kelly_multiplier_aggressive: Decimal,
    pub risk_cap_aggressive: Decimal,
    /// Hard ceiling on any single position as a share of bankroll
    pub bankroll_cap: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub halt_duration_hours: i64,
    pub min_trade_usd: Decimal,
    /// Positive Kelly sizes below this are raised to it
    pub min_bet_usd: Decimal,
    pub max_shares: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            profile: RiskProfile::Normal,
            kelly_multiplier: dec!(0.15),
            risk_cap: dec!(0.25),
            kelly_multiplier_aggressive: dec!(0.40),
            risk_cap_aggressive: dec!(0.60),
            bankroll_cap: dec!(0.95),
            max_daily_loss_pct: dec!(0.10),
            halt_duration_hours: 6,
            min_trade_usd: dec!(1),
            min_bet_usd: dec!(5),
            max_shares: dec!(100),
        }
    }
}

impl RiskConfig {
    /// Kelly multiplier for the active profile
    pub fn multiplier(&self) -> Decimal {
        match self.profile {
            RiskProfile::Normal => self.kelly_multiplier,
            RiskProfile::Aggressive => self.kelly_multiplier_aggressive,
        }
    }

    /// Per-trade bankroll cap for the active profile
    pub fn cap(&self) -> Decimal {
        match self.profile {
            RiskProfile::Normal => self.risk_cap,
            RiskProfile::Aggressive => self.risk_cap_aggressive,
        }
    }
}

/// Position management configuration. ROI values are in percent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PositionConfig {
    pub hard_stop_pct: Decimal,
    pub trail_activation_pct: Decimal,
    pub trail_min_pct: Decimal,
    pub trail_max_pct: Decimal,
    pub atr_multiplier: Decimal,
    /// ATR used by the monitor while the indicator has no value
    pub fallback_atr: f64,
    pub take_profit_entry_threshold: Decimal,
    pub take_profit_high: Decimal,
    pub take_profit_low: Decimal,
    pub hedge_exit_long: f64,
    pub hedge_exit_short: f64,
    pub cooldown_secs: i64,
    pub grace_period_secs: i64,
    pub dust_shares: Decimal,
    pub monitor_holding_secs: u64,
    pub monitor_flat_secs: u64,
    pub maintenance_interval_secs: u64,
    pub ghost_recovery_interval_secs: i64,
    /// Entry price assumed for adopted ghost positions
    pub recovery_entry_price: Decimal,
    pub resolution_batch: usize,
    /// Marking price for an illiquid position younger than `low_liquidity_age_secs`
    pub low_liquidity_floor: Decimal,
    pub low_liquidity_age_secs: i64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            hard_stop_pct: dec!(-15),
            trail_activation_pct: dec!(5),
            trail_min_pct: dec!(10),
            trail_max_pct: dec!(20),
            atr_multiplier: dec!(3),
            fallback_atr: 0.05,
            take_profit_entry_threshold: dec!(0.88),
            take_profit_high: dec!(0.95),
            take_profit_low: dec!(0.90),
            hedge_exit_long: 0.20,
            hedge_exit_short: 0.80,
            cooldown_secs: 60,
            grace_period_secs: 180,
            dust_shares: dec!(0.1),
            monitor_holding_secs: 1,
            monitor_flat_secs: 10,
            maintenance_interval_secs: 30,
            ghost_recovery_interval_secs: 300,
            recovery_entry_price: dec!(0.50),
            resolution_batch: 5,
            low_liquidity_floor: dec!(0.05),
            low_liquidity_age_secs: 300,
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub paper_balance: Decimal,
    /// Route entries through the alternate submission path
    pub alternate_submission: bool,
    pub buy_offset: Decimal,
    pub max_buy_price: Decimal,
    /// Highest acceptable best ask under the normal profile
    pub max_ask: Decimal,
    /// Highest acceptable best ask under the aggressive profile
    pub max_ask_aggressive: Decimal,
    pub sell_offset: Decimal,
    pub paper_sell_offset: Decimal,
    pub min_sell_price: Decimal,
    /// Signing key, only ever read from the environment
    #[serde(skip)]
    pub private_key: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            paper_balance: dec!(1000),
            alternate_submission: false,
            buy_offset: dec!(0.02),
            max_buy_price: dec!(0.99),
            max_ask: dec!(0.98),
            max_ask_aggressive: dec!(0.99),
            sell_offset: dec!(0.05),
            paper_sell_offset: dec!(0.01),
            min_sell_price: dec!(0.01),
            private_key: None,
        }
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Paper => "paper",
            ExecutionMode::Live => "live",
        }
    }

    pub fn is_paper(&self) -> bool {
        matches!(self, ExecutionMode::Paper)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus exporter port, 0 disables the exporter
    pub metrics_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file (or defaults when it does not exist), apply the process
    /// environment and validate. `force_paper` wins over `PAPER_TRADING`.
    pub fn from_environment(path: impl AsRef<Path>, force_paper: bool) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        if force_paper {
            config.execution.mode = ExecutionMode::Paper;
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PAPER_TRADING") {
            self.execution.mode = if parse_flag("PAPER_TRADING", &v)? {
                ExecutionMode::Paper
            } else {
                ExecutionMode::Live
            };
        }
        if let Some(v) = lookup("AGGRESSIVE_MODE") {
            self.risk.profile = if parse_flag("AGGRESSIVE_MODE", &v)? {
                RiskProfile::Aggressive
            } else {
                RiskProfile::Normal
            };
        }
        if let Some(v) = lookup("PAPER_BALANCE") {
            self.execution.paper_balance =
                Decimal::from_str(v.trim()).map_err(|_| ConfigError::Invalid {
                    key: "PAPER_BALANCE",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = lookup("USE_ALT_SUBMISSION") {
            self.execution.alternate_submission = parse_flag("USE_ALT_SUBMISSION", &v)?;
        }
        if let Some(v) = lookup(PRIVATE_KEY_ENV) {
            if !v.trim().is_empty() {
                self.execution.private_key = Some(v.trim().to_string());
            }
        }
        Ok(())
    }

    /// Reject configurations that must not run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.mode == ExecutionMode::Live && self.execution.private_key.is_none() {
            return Err(ConfigError::MissingCredential(PRIVATE_KEY_ENV));
        }
        if self.execution.paper_balance < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "execution.paper_balance",
                value: self.execution.paper_balance.to_string(),
            });
        }
        if self.strategy.prior <= 0.0 || self.strategy.prior >= 1.0 {
            return Err(ConfigError::Invalid {
                key: "strategy.prior",
                value: self.strategy.prior.to_string(),
            });
        }
        if self.feed.primary_capacity < self.feed.warmup_candles {
            return Err(ConfigError::Invalid {
                key: "feed.primary_capacity",
                value: self.feed.primary_capacity.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
