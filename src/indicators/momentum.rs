//! RSI, EMA and MACD

use super::InsufficientData;
use serde::{Deserialize, Serialize};

/// MACD reading at the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    /// Histogram change vs. the previous bar
    pub histogram_delta: f64,
}

/// Wilder-smoothed RSI over `closes`.
///
/// Needs `period + 1` closes. Returns 100 when the smoothed average loss is
/// exactly zero. A zero-loss seed window alone does not pin the result to
/// 100: later losses still smooth into the average.
pub fn rsi(closes: &[f64], period: usize) -> Result<f64, InsufficientData> {
    InsufficientData::check(period + 1, closes.len())?;
    if period == 0 {
        return Err(InsufficientData::new(1, 0));
    }
    let p = period as f64;

    let (mut avg_gain, mut avg_loss) = closes[..=period]
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });
    avg_gain /= p;
    avg_loss /= p;

    for w in closes[period..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Ok(100.0);
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// EMA series seeded with the simple average of the first `length` values.
///
/// Output has `values.len() - length + 1` entries; entry `i` aligns with
/// input index `length - 1 + i`.
pub fn ema_series(values: &[f64], length: usize) -> Result<Vec<f64>, InsufficientData> {
    if length == 0 {
        return Err(InsufficientData::new(1, 0));
    }
    InsufficientData::check(length, values.len())?;

    let k = 2.0 / (length as f64 + 1.0);
    let seed = values[..length].iter().sum::<f64>() / length as f64;

    let mut out = Vec::with_capacity(values.len() - length + 1);
    out.push(seed);
    let mut current = seed;
    for value in &values[length..] {
        current = value * k + current * (1.0 - k);
        out.push(current);
    }
    Ok(out)
}

/// MACD with signal line. Needs `slow + signal` closes.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Macd, InsufficientData> {
    InsufficientData::check(slow + signal, closes.len())?;

    let fast_ema = ema_series(closes, fast)?;
    let slow_ema = ema_series(closes, slow)?;

    // Align both series on their most recent values
    let overlap = fast_ema.len().min(slow_ema.len());
    let fast_tail = &fast_ema[fast_ema.len() - overlap..];
    let slow_tail = &slow_ema[slow_ema.len() - overlap..];
    let line: Vec<f64> = fast_tail
        .iter()
        .zip(slow_tail)
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema_series(&line, signal)?;
    if signal_line.len() < 2 {
        return Err(InsufficientData::new(slow + signal, closes.len()));
    }

    let n = line.len();
    let m = signal_line.len();
    let histogram = line[n - 1] - signal_line[m - 1];
    let prev_histogram = line[n - 2] - signal_line[m - 2];

    Ok(Macd {
        line: line[n - 1],
        signal: signal_line[m - 1],
        histogram,
        histogram_delta: histogram - prev_histogram,
    })
}
