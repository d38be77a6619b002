//! Strike extraction
//!
//! Tiers are tried in order; the first positive value wins.

use super::gamma::GammaMarket;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a strike was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeSource {
    /// `groupItemThreshold`
    Threshold,
    /// `strikePrice`, `targetPrice` or `line`
    StructuredField,
    /// Dollar amount in the question
    Question,
    /// Dollar amount in the description, sanity-checked
    Description,
}

impl StrikeSource {
    /// Extraction order
    pub const TIERS: [StrikeSource; 4] = [
        StrikeSource::Threshold,
        StrikeSource::StructuredField,
        StrikeSource::Question,
        StrikeSource::Description,
    ];

    fn extract(self, market: &GammaMarket, min_description_strike: f64) -> Option<f64> {
        match self {
            StrikeSource::Threshold => positive(market.group_item_threshold),
            StrikeSource::StructuredField => [market.strike_price, market.target_price, market.line]
                .into_iter()
                .find_map(positive),
            StrikeSource::Question => dollar_amount(&market.question).filter(|v| *v > 0.0),
            StrikeSource::Description => market
                .description
                .as_deref()
                .and_then(dollar_amount)
                .filter(|v| *v > min_description_strike),
        }
    }
}

/// First strike found across the tiers, with its source
pub fn extract_strike(market: &GammaMarket, min_description_strike: f64) -> Option<(f64, StrikeSource)> {
    StrikeSource::TIERS
        .into_iter()
        .find_map(|tier| Some((tier.extract(market, min_description_strike)?, tier)))
}

fn positive(value: Option<Decimal>) -> Option<f64> {
    value.filter(|v| *v > Decimal::ZERO)?.to_f64()
}

/// First `$` amount in `text`, e.g. `$97,500.25` -> 97500.25.
///
/// A `$` must be followed by digits or commas to count; a fractional part
/// is only taken when at least one digit follows the point.
pub fn dollar_amount(text: &str) -> Option<f64> {
    text.match_indices('$').find_map(|(idx, _)| {
        let rest = &text[idx + 1..];
        let int_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == ','))
            .unwrap_or(rest.len());
        if int_len == 0 {
            return None;
        }

        let mut end = int_len;
        if let Some(frac) = rest[int_len..].strip_prefix('.') {
            let frac_len = frac
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(frac.len());
            if frac_len > 0 {
                end += 1 + frac_len;
            }
        }

        let cleaned = rest[..end].replace(',', "");
        // "$," matches the pattern but is not a number; stop here as a
        // failed tier rather than scanning further
        Some(Decimal::from_str(&cleaned).ok().and_then(|d| d.to_f64()))
    })?
}
