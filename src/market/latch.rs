//! Per-market strike latch

use super::Market;

/// Holds the strike of the market currently being traded.
///
/// Up/down markets rarely publish a strike, so the reference price seen when
/// the market is first selected becomes its anchor. Once latched, a strike is
/// kept for as long as the same market id stays selected.
#[derive(Debug, Clone, Default)]
pub struct StrikeLatch {
    market_id: Option<String>,
    strike: Option<f64>,
}

impl StrikeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch (or recall) the strike for `market`
    pub fn latch(&mut self, market: &Market, reference_price: f64) -> Option<f64> {
        if self.market_id.as_deref() != Some(market.id.as_str()) {
            self.market_id = Some(market.id.clone());
            self.strike = market.strike_price;
        }

        if self.strike.is_none() {
            self.strike = market
                .strike_price
                .or_else(|| (market.is_updown && reference_price > 0.0).then_some(reference_price));
        }

        self.strike
    }

    pub fn market_id(&self) -> Option<&str> {
        self.market_id.as_deref()
    }

    pub fn strike(&self) -> Option<f64> {
        self.strike
    }
}
