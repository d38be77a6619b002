//! Per-cycle status snapshot
//!
//! Built once per decision cycle and published on a watch channel. Readers
//! always see a complete snapshot, never a half-updated one.

use crate::config::ExecutionMode;
use crate::feed::{CandleWindow, SentimentReading};
use crate::indicators::{CandleColor, IndicatorSnapshot};
use crate::market::Market;
use crate::position::{ControllerState, Direction, Position};
use crate::predictor::{Bias, PredictionTrace};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorStatus {
    pub rsi: f64,
    pub rsi_rising: bool,
    /// "bullish" or "bearish" by MACD histogram sign
    pub macd: &'static str,
    /// e.g. "green x3"
    pub heiken_ashi: String,
    pub vwap: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorStatus {
    pub fn from_snapshot(snapshot: &IndicatorSnapshot) -> Self {
        let color = match snapshot.heiken_ashi.color {
            CandleColor::Green => "green",
            CandleColor::Red => "red",
        };
        Self {
            rsi: snapshot.rsi,
            rsi_rising: snapshot.rsi_slope > 0.0,
            macd: if snapshot.macd.histogram > 0.0 {
                "bullish"
            } else {
                "bearish"
            },
            heiken_ashi: format!("{} x{}", color, snapshot.heiken_ashi.streak),
            vwap: snapshot.vwap(),
            atr: snapshot.atr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStatus {
    pub id: String,
    pub question: String,
    pub time_left: String,
    pub minutes_to_expiry: f64,
    /// Strike the settlement is measured against
    pub price_to_beat: Option<f64>,
    /// YES mid in cents
    pub up_cents: Option<f64>,
    pub entry_blocked: bool,
}

impl MarketStatus {
    pub fn new(
        market: &Market,
        price_to_beat: Option<f64>,
        yes_mid: Option<f64>,
        min_minutes_to_expiry: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let remaining = market.remaining(now);
        let minutes = remaining.num_milliseconds() as f64 / 60_000.0;
        Self {
            id: market.id.clone(),
            question: market.question.clone(),
            time_left: format_time_left(remaining),
            minutes_to_expiry: (minutes * 10.0).round() / 10.0,
            price_to_beat,
            up_cents: yes_mid.map(|p| p * 100.0),
            entry_blocked: minutes < min_minutes_to_expiry as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub direction: Direction,
    pub token_id: String,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub highest_roi: Decimal,
    pub take_profit: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl From<&Position> for PositionSummary {
    fn from(position: &Position) -> Self {
        Self {
            direction: position.direction,
            token_id: position.token_id.clone(),
            entry_price: position.entry_price,
            size: position.size,
            highest_roi: position.highest_roi,
            take_profit: position.take_profit,
            opened_at: position.opened_at,
        }
    }
}

/// Everything a presentation layer needs after one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub mode: ExecutionMode,
    pub price: f64,
    pub indicators: IndicatorStatus,
    pub probability: f64,
    /// `max(p, 1 - p)` in percent
    pub confidence: f64,
    pub bias: Bias,
    /// LONG, SHORT or NEUTRAL
    pub signal: &'static str,
    pub trace: PredictionTrace,
    pub market: Option<MarketStatus>,
    pub delta_1m: f64,
    pub delta_3m: f64,
    pub sentiment: Option<SentimentReading>,
    pub position: Option<PositionSummary>,
    pub state: ControllerState,
    pub account_value: Option<Decimal>,
    pub halted: bool,
}

/// 1-minute and 3-minute close deltas of the fine-grained window
pub fn short_term_deltas(window: &CandleWindow) -> (f64, f64) {
    let delta = |n: usize| match (window.close_back(0), window.close_back(n)) {
        (Some(last), Some(prev)) => last - prev,
        _ => 0.0,
    };
    (delta(1), delta(3))
}

/// `"{m}m {s}s"`, or `"Expired"` once the window has closed
pub fn format_time_left(remaining: Duration) -> String {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        return "Expired".to_string();
    }
    format!("{}m {}s", secs / 60, secs % 60)
}
