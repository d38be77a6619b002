//! Distance-weighted order book imbalance

use crate::orderbook::{OrderBook, PriceLevel};
use rust_decimal::prelude::ToPrimitive;

/// Levels per side that contribute to the imbalance
pub const OBI_DEPTH: usize = 5;

/// Weighted (bid volume, ask volume) over the top levels of each side.
///
/// Each level's size is weighted by `1 / (1 + |price - mid|)`. A book
/// missing either side yields `(0, 0)`.
pub fn weighted_obi(book: &OrderBook, mid_price: f64) -> (f64, f64) {
    if book.bids.is_empty() || book.asks.is_empty() {
        return (0.0, 0.0);
    }
    (
        side_volume(&book.bids, mid_price),
        side_volume(&book.asks, mid_price),
    )
}

/// Imbalance ratio in [-1, 1]; `None` unless both sides carry volume
pub fn imbalance_ratio(bid_volume: f64, ask_volume: f64) -> Option<f64> {
    if bid_volume > 0.0 && ask_volume > 0.0 {
        Some((bid_volume - ask_volume) / (bid_volume + ask_volume))
    } else {
        None
    }
}

fn side_volume(levels: &[PriceLevel], mid: f64) -> f64 {
    levels
        .iter()
        .take(OBI_DEPTH)
        .filter_map(|l| {
            let price = l.price.to_f64()?;
            let size = l.size.to_f64()?;
            Some(size / (1.0 + (price - mid).abs()))
        })
        .sum()
}
