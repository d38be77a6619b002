//! Heiken-Ashi trend persistence

use super::InsufficientData;
use crate::feed::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    Green,
    Red,
}

/// Color of the newest synthetic bar and how many bars in a row share it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeikenAshi {
    pub color: CandleColor,
    pub streak: usize,
}

pub fn heiken_ashi(candles: &[Candle]) -> Result<HeikenAshi, InsufficientData> {
    let first = candles.first().ok_or(InsufficientData::new(1, 0))?;

    let mut ha_open = (first.open + first.close) / 2.0;
    let mut ha_close = (first.open + first.high + first.low + first.close) / 4.0;
    let mut colors = Vec::with_capacity(candles.len());
    colors.push(color_of(ha_open, ha_close));

    for c in &candles[1..] {
        ha_open = (ha_open + ha_close) / 2.0;
        ha_close = (c.open + c.high + c.low + c.close) / 4.0;
        colors.push(color_of(ha_open, ha_close));
    }

    let color = colors[colors.len() - 1];
    let streak = colors.iter().rev().take_while(|c| **c == color).count();
    Ok(HeikenAshi { color, streak })
}

fn color_of(open: f64, close: f64) -> CandleColor {
    if close >= open {
        CandleColor::Green
    } else {
        CandleColor::Red
    }
}
