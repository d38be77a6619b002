//! Evidence rules
//!
//! Each rule inspects one signal and contributes at most one factor.

use super::{Evidence, Factor};
use crate::indicators::{CandleColor, HeikenAshi, IndicatorSnapshot, Macd};
use chrono::Duration;

const RSI_HIGH: f64 = 55.0;
const RSI_LOW: f64 = 45.0;
const CROWD_MAX_SPREAD: f64 = 0.05;
const CROWD_HIGH: f64 = 0.60;
const CROWD_LOW: f64 = 0.40;
const OBI_THRESHOLD: f64 = 0.3;
const FUNDING_HIGH: f64 = 0.01;
const FUNDING_LOW: f64 = -0.01;
const CONTINUATION_THRESHOLD: f64 = 0.005;
const MIN_STREAK: usize = 2;

/// Price and indicator readings for one cycle
#[derive(Debug, Clone)]
pub struct SignalInputs {
    /// Live reference price
    pub price: f64,
    pub vwap: Option<f64>,
    pub vwap_slope: f64,
    pub rsi: f64,
    pub rsi_slope: f64,
    pub macd: Macd,
    pub heiken_ashi: HeikenAshi,
    /// Close of the latest completed primary candle
    pub last_close: Option<f64>,
}

impl SignalInputs {
    pub fn from_snapshot(price: f64, snapshot: &IndicatorSnapshot, last_close: Option<f64>) -> Self {
        Self {
            price,
            vwap: snapshot.vwap(),
            vwap_slope: snapshot.vwap_slope,
            rsi: snapshot.rsi,
            rsi_slope: snapshot.rsi_slope,
            macd: snapshot.macd,
            heiken_ashi: snapshot.heiken_ashi,
            last_close,
        }
    }
}

/// Context of the selected market
#[derive(Debug, Clone, PartialEq)]
pub struct MarketContext {
    /// Mid of the YES token quote
    pub mid_price: Option<f64>,
    pub spread: Option<f64>,
    /// Weighted bid volume on the YES book
    pub imbalance_up: f64,
    /// Weighted ask volume on the YES book
    pub imbalance_down: f64,
    pub funding_rate: f64,
    /// -1, 0 or +1, see [`divergence_score`]
    pub latency_divergence: i8,
    /// Reference price minus strike
    pub moneyness: Option<f64>,
    pub time_decay_factor: f64,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            mid_price: None,
            spread: None,
            imbalance_up: 0.0,
            imbalance_down: 0.0,
            funding_rate: 0.0,
            latency_divergence: 0,
            moneyness: None,
            time_decay_factor: 1.0,
        }
    }
}

/// Amplifier for the moneyness rule as settlement approaches
pub fn time_decay_factor(remaining: Duration) -> f64 {
    let secs = remaining.num_seconds();
    if secs < 180 {
        2.0
    } else if secs < 600 {
        1.5
    } else {
        1.0
    }
}

/// +1 when the secondary venue trades above the primary by more than
/// `threshold_pct` percent, -1 when below, 0 otherwise or without a quote.
pub fn divergence_score(primary: f64, secondary: Option<f64>, threshold_pct: f64) -> i8 {
    let Some(secondary) = secondary.filter(|p| *p > 0.0) else {
        return 0;
    };
    if primary <= 0.0 {
        return 0;
    }
    let delta_pct = (secondary - primary) / primary * 100.0;
    if delta_pct > threshold_pct {
        1
    } else if delta_pct < -threshold_pct {
        -1
    } else {
        0
    }
}

/// Apply every rule to the inputs
pub fn collect_evidence(inputs: &SignalInputs, context: &MarketContext) -> Vec<Evidence> {
    let mut out = Vec::with_capacity(12);
    let mut push = |factor: Factor, bf: Option<f64>| {
        if let Some(bf) = bf {
            out.push(Evidence::new(factor, bf));
        }
    };

    push(
        Factor::VwapTrend,
        inputs
            .vwap
            .filter(|v| *v > 0.0 && inputs.price > 0.0)
            .and_then(|vwap| signed(inputs.price - vwap, 2.0, 0.5)),
    );
    push(Factor::VwapSlope, signed(inputs.vwap_slope, 1.5, 0.66));
    push(Factor::RsiMomentum, rsi_momentum(inputs.rsi, inputs.rsi_slope));
    push(Factor::MacdExpansion, macd_expansion(&inputs.macd));
    push(Factor::MacdTrend, signed(inputs.macd.histogram, 1.2, 0.83));
    push(Factor::HeikenAshiTrend, heiken_ashi_trend(&inputs.heiken_ashi));
    push(
        Factor::Moneyness,
        context
            .moneyness
            .and_then(|m| moneyness(m, context.time_decay_factor)),
    );
    push(Factor::Crowd, crowd(context.mid_price, context.spread));
    push(
        Factor::OrderFlow,
        order_flow(context.imbalance_up, context.imbalance_down),
    );
    // Crowded shorts squeeze up, crowded longs squeeze down
    push(
        Factor::FundingSqueeze,
        if context.funding_rate < FUNDING_LOW {
            Some(1.5)
        } else if context.funding_rate > FUNDING_HIGH {
            Some(0.66)
        } else {
            None
        },
    );
    push(
        Factor::CrossVenueDivergence,
        signed(context.latency_divergence as f64, 4.0, 0.25),
    );
    push(
        Factor::CandleContinuation,
        inputs
            .last_close
            .filter(|c| *c > 0.0 && inputs.price > 0.0)
            .and_then(|close| {
                let change = (inputs.price - close) / close;
                beyond(change, CONTINUATION_THRESHOLD, 1.5, 0.66)
            }),
    );

    out
}

fn signed(value: f64, up: f64, down: f64) -> Option<f64> {
    beyond(value, 0.0, up, down)
}

fn beyond(value: f64, threshold: f64, up: f64, down: f64) -> Option<f64> {
    if value > threshold {
        Some(up)
    } else if value < -threshold {
        Some(down)
    } else {
        None
    }
}

fn rsi_momentum(rsi: f64, slope: f64) -> Option<f64> {
    if rsi > RSI_HIGH && slope > 0.0 {
        Some(2.0)
    } else if rsi < RSI_LOW && slope < 0.0 {
        Some(0.5)
    } else {
        None
    }
}

fn macd_expansion(macd: &Macd) -> Option<f64> {
    if macd.histogram > 0.0 && macd.histogram_delta > 0.0 {
        Some(2.0)
    } else if macd.histogram < 0.0 && macd.histogram_delta < 0.0 {
        Some(0.5)
    } else {
        None
    }
}

fn heiken_ashi_trend(ha: &HeikenAshi) -> Option<f64> {
    if ha.streak < MIN_STREAK {
        return None;
    }
    match ha.color {
        CandleColor::Green => Some(1.5),
        CandleColor::Red => Some(0.66),
    }
}

fn moneyness(distance: f64, time_decay: f64) -> Option<f64> {
    let decay = time_decay.max(1.0);
    signed(distance, 1.5 * decay, 0.66 / decay)
}

fn crowd(mid: Option<f64>, spread: Option<f64>) -> Option<f64> {
    let (mid, spread) = (mid?, spread?);
    if spread >= CROWD_MAX_SPREAD {
        return None;
    }
    if mid > CROWD_HIGH {
        Some(2.0)
    } else if mid < CROWD_LOW {
        Some(0.5)
    } else {
        None
    }
}

fn order_flow(up: f64, down: f64) -> Option<f64> {
    if up <= 0.0 || down <= 0.0 {
        return None;
    }
    let obi = (up - down) / (up + down);
    beyond(obi, OBI_THRESHOLD, 1.5, 0.66)
}
