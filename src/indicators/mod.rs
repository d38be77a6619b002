//! Indicator engine
//!
//! Pure transforms from a candle window to indicator values. Every function
//! returns [`InsufficientData`] instead of guessing when the window is too
//! short; callers skip the cycle on it.

mod heiken_ashi;
mod momentum;
mod order_flow;
mod volatility;
mod vwap;

pub use heiken_ashi::{heiken_ashi, CandleColor, HeikenAshi};
pub use momentum::{ema_series, macd, rsi, Macd};
pub use order_flow::{imbalance_ratio, weighted_obi, OBI_DEPTH};
pub use volatility::atr;
pub use vwap::{vwap_intraday, vwap_slope};

use crate::config::StrategyConfig;
use crate::feed::Candle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Not enough history to compute an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Insufficient data: need {required}, have {available}")]
pub struct InsufficientData {
    pub required: usize,
    pub available: usize,
}

impl InsufficientData {
    pub fn new(required: usize, available: usize) -> Self {
        Self {
            required,
            available,
        }
    }

    /// Err when `available < required`
    pub fn check(required: usize, available: usize) -> Result<(), Self> {
        if available < required {
            Err(Self::new(required, available))
        } else {
            Ok(())
        }
    }
}

/// Indicator periods
#[derive(Debug, Clone, Copy)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
        }
    }
}

impl From<&StrategyConfig> for IndicatorParams {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            rsi_period: config.rsi_period,
            macd_fast: config.macd_fast,
            macd_slow: config.macd_slow,
            macd_signal: config.macd_signal,
            atr_period: config.atr_period,
        }
    }
}

/// All indicators for one decision cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    /// RSI change vs. the window without its newest bar
    pub rsi_slope: f64,
    pub macd: Macd,
    /// `None` until enough bars; the monitor substitutes its fallback
    pub atr: Option<f64>,
    pub vwap_series: Vec<f64>,
    pub vwap_slope: f64,
    pub heiken_ashi: HeikenAshi,
}

impl IndicatorSnapshot {
    /// Compute the snapshot. ATR alone may be missing; everything else is
    /// required and reported as [`InsufficientData`].
    pub fn compute(candles: &[Candle], params: IndicatorParams) -> Result<Self, InsufficientData> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let rsi_now = rsi(&closes, params.rsi_period)?;
        let rsi_prev = rsi(&closes[..closes.len() - 1], params.rsi_period)?;
        let macd = macd(
            &closes,
            params.macd_fast,
            params.macd_slow,
            params.macd_signal,
        )?;
        let vwap_series = vwap_intraday(candles)?;
        let heiken_ashi = heiken_ashi(candles)?;

        Ok(Self {
            rsi: rsi_now,
            rsi_slope: rsi_now - rsi_prev,
            macd,
            atr: atr(candles, params.atr_period).ok(),
            vwap_slope: vwap_slope(&vwap_series),
            vwap_series,
            heiken_ashi,
        })
    }

    /// Latest VWAP value
    pub fn vwap(&self) -> Option<f64> {
        self.vwap_series.last().copied()
    }
}
