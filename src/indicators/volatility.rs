//! Average true range

use super::InsufficientData;
use crate::feed::Candle;

/// Wilder-smoothed ATR. Needs `period + 1` candles.
pub fn atr(candles: &[Candle], period: usize) -> Result<f64, InsufficientData> {
    if period == 0 {
        return Err(InsufficientData::new(1, 0));
    }
    InsufficientData::check(period + 1, candles.len())?;

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let (prev, curr) = (&w[0], &w[1]);
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .collect();

    let p = period as f64;
    let seed = true_ranges[..period].iter().sum::<f64>() / p;
    Ok(true_ranges[period..]
        .iter()
        .fold(seed, |acc, tr| (acc * (p - 1.0) + tr) / p))
}
