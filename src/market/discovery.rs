//! Market eligibility pipeline
//!
//! Every candidate runs the same ordered checks; the first failure is
//! reported as a [`MarketRejection`] and the candidate is never traded.

use super::gamma::{GammaEvent, GammaMarket};
use super::strike::extract_strike;
use super::title::parse_title_window;
use super::{Market, WindowSource};
use crate::config::MarketConfig;
use crate::telemetry::{increment_counter, CounterMetric};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

/// Question keywords marking a price-settled market
const PRICE_KEYWORDS: [&str; 9] = [
    ">", "Above", "Below", "Price", "High", "Low", "Up", "Down", "Settle",
];

/// Why a candidate market was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketRejection {
    #[error("question does not reference the tracked asset")]
    NotTrackedAsset,
    #[error("not a short-duration price market")]
    NotShortDuration,
    #[error("expected exactly two outcome tokens")]
    MissingTokens,
    #[error("no parseable settlement window")]
    UnparseableWindow,
    #[error("window opens at {0}")]
    NotStarted(DateTime<Utc>),
    #[error("window closed at {0}")]
    Expired(DateTime<Utc>),
    #[error("window lasts {0} minutes")]
    TooLong(i64),
    #[error("only {0:.1} minutes left")]
    ExpiringSoon(f64),
    #[error("{0:.1} minutes left exceeds the look-ahead ceiling")]
    TooFarAhead(f64),
    #[error("no two-sided quote")]
    NoQuote,
    #[error("mid {0} outside the liquidity band")]
    Illiquid(Decimal),
    #[error("spread {0} too wide")]
    WideSpread(Decimal),
}

impl MarketRejection {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            MarketRejection::NotTrackedAsset => "not_tracked_asset",
            MarketRejection::NotShortDuration => "not_short_duration",
            MarketRejection::MissingTokens => "missing_tokens",
            MarketRejection::UnparseableWindow => "unparseable_window",
            MarketRejection::NotStarted(_) => "not_started",
            MarketRejection::Expired(_) => "expired",
            MarketRejection::TooLong(_) => "too_long",
            MarketRejection::ExpiringSoon(_) => "expiring_soon",
            MarketRejection::TooFarAhead(_) => "too_far_ahead",
            MarketRejection::NoQuote => "no_quote",
            MarketRejection::Illiquid(_) => "illiquid",
            MarketRejection::WideSpread(_) => "wide_spread",
        }
    }
}

/// Two-sided quote that passed the liquidity filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub spread: Decimal,
}

/// Eligibility rules for catalog candidates
#[derive(Debug, Clone)]
pub struct MarketDiscovery {
    config: MarketConfig,
}

impl MarketDiscovery {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    /// Eligible markets across `events`, soonest settlement first.
    ///
    /// Events that have not started are skipped whole.
    pub fn discover(&self, events: &[GammaEvent], now: DateTime<Utc>) -> Vec<Market> {
        let mut markets: Vec<Market> = events
            .iter()
            .filter(|event| event.has_started(now))
            .flat_map(|event| event.markets.iter())
            .filter_map(|raw| match self.evaluate(raw, now) {
                Ok(market) => Some(market),
                Err(rejection) => {
                    debug!(
                        question = %raw.question,
                        reason = rejection.reason(),
                        detail = %rejection,
                        "Market rejected"
                    );
                    increment_counter(CounterMetric::RejectedMarkets, rejection.reason());
                    None
                }
            })
            .collect();

        markets.sort_by_key(|m| m.window_end);
        markets
    }

    /// Run every eligibility check on one catalog market
    pub fn evaluate(&self, raw: &GammaMarket, now: DateTime<Utc>) -> Result<Market, MarketRejection> {
        let question = raw.question.as_str();

        let description = raw.description.as_deref().unwrap_or_default();
        if !self
            .config
            .asset_keywords
            .iter()
            .any(|kw| question.contains(kw.as_str()) || description.contains(kw.as_str()))
        {
            return Err(MarketRejection::NotTrackedAsset);
        }

        let title_window =
            parse_title_window(question, now, self.config.exchange_utc_offset_hours);
        let is_updown = is_updown(question);
        if title_window.is_none()
            && !is_updown
            && !PRICE_KEYWORDS.iter().any(|kw| question.contains(kw))
        {
            return Err(MarketRejection::NotShortDuration);
        }

        let (yes_token, no_token) = raw.token_ids().ok_or(MarketRejection::MissingTokens)?;

        let (window_start, window_end, window_source) = match title_window {
            Some((start, end)) => (start, end, WindowSource::Title),
            None => {
                let end = raw.end_time().ok_or(MarketRejection::UnparseableWindow)?;
                let start = raw.start_time().unwrap_or_else(|| {
                    end - Duration::minutes(self.config.default_window_minutes)
                });
                (start, end, WindowSource::Catalog)
            }
        };

        let minutes_to_expiry = self.check_window(window_start, window_end, window_source, now)?;
        let strike = extract_strike(raw, self.config.min_description_strike);

        Ok(Market {
            id: raw.market_id(),
            question: raw.question.clone(),
            yes_token,
            no_token,
            window_start,
            window_end,
            window_source,
            strike_price: strike.map(|(value, _)| value),
            strike_source: strike.map(|(_, source)| source),
            best_bid: raw.best_bid,
            best_ask: raw.best_ask,
            last_trade: raw.last_trade_price,
            is_updown,
            minutes_to_expiry,
        })
    }

    /// Window bounds, returning the minutes left
    fn check_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source: WindowSource,
        now: DateTime<Utc>,
    ) -> Result<f64, MarketRejection> {
        if now < start {
            return Err(MarketRejection::NotStarted(start));
        }
        if now >= end {
            return Err(MarketRejection::Expired(end));
        }

        let duration = (end - start).num_minutes();
        if end - start > Duration::minutes(self.config.max_duration_minutes) {
            return Err(MarketRejection::TooLong(duration));
        }

        let remaining = (end - now).num_milliseconds() as f64 / 60_000.0;
        if remaining < self.config.min_minutes_to_expiry as f64 {
            return Err(MarketRejection::ExpiringSoon(remaining));
        }
        if source == WindowSource::Title && remaining > self.config.max_lookahead_minutes as f64 {
            return Err(MarketRejection::TooFarAhead(remaining));
        }

        Ok(remaining)
    }

    /// Decision-time liquidity filter on a two-sided quote
    pub fn check_liquidity(
        &self,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
    ) -> Result<Quote, MarketRejection> {
        let (bid, ask) = match (bid, ask) {
            (Some(bid), Some(ask)) if bid > Decimal::ZERO && ask > Decimal::ZERO => (bid, ask),
            _ => return Err(MarketRejection::NoQuote),
        };

        let mid = (bid + ask) / Decimal::TWO;
        let spread = ask - bid;
        if mid < self.config.liquidity_floor || mid > self.config.liquidity_ceiling {
            return Err(MarketRejection::Illiquid(mid));
        }
        if spread > self.config.max_spread {
            return Err(MarketRejection::WideSpread(spread));
        }

        Ok(Quote {
            bid,
            ask,
            mid,
            spread,
        })
    }
}

/// Binary "Up or Down" question without a dollar strike
pub fn is_updown(question: &str) -> bool {
    let lower = question.to_lowercase();
    lower.contains("up or down")
        || lower.contains("up/down")
        || (lower.contains("up") && lower.contains("down") && !question.contains('$'))
}
