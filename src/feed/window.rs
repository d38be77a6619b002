//! Fixed-capacity candle history

use super::Candle;
use std::collections::VecDeque;

/// Ordered candle window. Oldest bars are evicted once capacity is reached.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append a closed candle.
    ///
    /// A bar with the same open time as the newest one replaces it (a
    /// reconnect can replay the last close); a bar older than the newest one
    /// is ignored. Returns whether the window changed.
    pub fn push(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.candles.back_mut() {
            if candle.open_time == last.open_time {
                *last = candle;
                return true;
            }
            if candle.open_time < last.open_time {
                return false;
            }
        }
        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        true
    }

    /// Seed from a historical batch (oldest first)
    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.push(candle);
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Close `n` bars before the newest one
    pub fn close_back(&self, n: usize) -> Option<f64> {
        let idx = self.candles.len().checked_sub(n + 1)?;
        self.candles.get(idx).map(|c| c.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }
}
