//! Intraday VWAP, reset at UTC midnight

use super::InsufficientData;
use crate::feed::Candle;

/// VWAP series for the UTC day of the newest candle.
///
/// One value per candle from the first candle of that day. While the
/// cumulative volume is still zero the typical price stands in.
pub fn vwap_intraday(candles: &[Candle]) -> Result<Vec<f64>, InsufficientData> {
    let last = candles.last().ok_or(InsufficientData::new(1, 0))?;
    let day = last.open_time.date_naive();

    let start = candles
        .iter()
        .rposition(|c| c.open_time.date_naive() < day)
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut pv_sum = 0.0;
    let mut v_sum = 0.0;
    Ok(candles[start..]
        .iter()
        .map(|c| {
            let tp = c.typical_price();
            pv_sum += tp * c.volume;
            v_sum += c.volume;
            if v_sum > 0.0 {
                pv_sum / v_sum
            } else {
                tp
            }
        })
        .collect())
}

/// Change over the last three bars, zero for shorter series
pub fn vwap_slope(series: &[f64]) -> f64 {
    if series.len() > 3 {
        series[series.len() - 1] - series[series.len() - 4]
    } else {
        0.0
    }
}
