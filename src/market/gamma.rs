//! Gamma API client for market discovery
//!
//! Lists the events of the BTC 15-minute series and looks up single markets
//! for resolution. Gamma is loose with types: numeric fields arrive as
//! numbers, numeric strings or empty strings, and list fields arrive either
//! as JSON arrays or as JSON-encoded strings. Everything is decoded
//! leniently here so one odd field never drops a whole page.

use super::{MarketCatalog, Resolution};
use crate::config::MarketConfig;
use crate::feed::FeedError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Outcome prices at or above this mark a resolved side
const RESOLVED_PRICE: Decimal = rust_decimal_macros::dec!(0.99);

/// Client for Polymarket's Gamma API
pub struct GammaClient {
    base_url: String,
    series_id: String,
    page_limit: u32,
    client: Client,
}

impl GammaClient {
    pub fn new(config: &MarketConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.gamma_url.trim_end_matches('/').to_string(),
            series_id: config.series_id.clone(),
            page_limit: config.page_limit,
            client,
        })
    }

    /// Active, unarchived events of the series, soonest end first
    pub async fn fetch_events(&self) -> Result<Vec<GammaEvent>, FeedError> {
        let url = format!("{}/events", self.base_url);
        let limit = self.page_limit.to_string();

        tracing::debug!(url = %url, series_id = %self.series_id, "Fetching series events");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", self.series_id.as_str()),
                ("limit", limit.as_str()),
                ("active", "true"),
                ("archived", "false"),
                ("closed", "false"),
                ("order", "endDate"),
                ("ascending", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let events: Vec<GammaEvent> = response.json().await?;
        tracing::debug!(events = events.len(), "Fetched series events");
        Ok(events)
    }

    /// Fetch a single market by its Gamma id
    pub async fn fetch_market(&self, market_id: &str) -> Result<GammaMarket, FeedError> {
        let url = format!("{}/markets/{}", self.base_url, market_id);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketCatalog for GammaClient {
    async fn fetch_events(&self) -> Result<Vec<GammaEvent>, FeedError> {
        GammaClient::fetch_events(self).await
    }

    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Resolution>, FeedError> {
        let market = self.fetch_market(market_id).await?;
        Ok(market.resolution())
    }
}

/// Event record (one settlement window of the series)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaEvent {
    #[serde(default)]
    pub title: Option<String>,
    /// Events that have not started yet are skipped
    #[serde(default)]
    pub event_start_time: Option<String>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

impl GammaEvent {
    /// True when the event has started or carries no usable start time
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.event_start_time
            .as_deref()
            .and_then(parse_timestamp)
            .map_or(true, |start| start <= now)
    }
}

/// Raw market record from the Gamma API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON array or JSON-encoded string of exactly two ids, YES first
    #[serde(default)]
    pub clob_token_ids: Option<Value>,
    #[serde(default)]
    pub outcome_prices: Option<Value>,
    #[serde(default)]
    pub start_date_iso: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date_iso: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub best_bid: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub best_ask: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub last_trade_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub group_item_threshold: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub strike_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub target_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub line: Option<Decimal>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl GammaMarket {
    /// Market identifier: Gamma id, falling back to the condition id
    pub fn market_id(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.condition_id.clone())
            .unwrap_or_default()
    }

    /// (YES, NO) token ids, only when exactly two are listed
    pub fn token_ids(&self) -> Option<(String, String)> {
        let tokens = string_list(self.clob_token_ids.as_ref()?)?;
        parse_token_ids(tokens)
    }

    /// Catalog end timestamp, ISO field preferred
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_date_iso
            .as_deref()
            .or(self.end_date.as_deref())
            .and_then(parse_timestamp)
    }

    /// Catalog start timestamp, ISO field preferred
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_date_iso
            .as_deref()
            .or(self.start_date.as_deref())
            .and_then(parse_timestamp)
    }

    /// Resolved side, `None` while the market is open or undecided.
    ///
    /// A closed market resolves to the side whose outcome price reached
    /// 0.99; otherwise the explicit resolution string decides.
    pub fn resolution(&self) -> Option<Resolution> {
        if !self.closed {
            return None;
        }

        let prices: Vec<Decimal> = self
            .outcome_prices
            .as_ref()
            .and_then(string_list)
            .map(|p| {
                p.iter()
                    .filter_map(|s| Decimal::from_str(s.trim()).ok())
                    .collect()
            })
            .unwrap_or_default();
        if prices.len() >= 2 {
            if prices[0] >= RESOLVED_PRICE {
                return Some(Resolution::Yes);
            }
            if prices[1] >= RESOLVED_PRICE {
                return Some(Resolution::No);
            }
        }

        self.resolution.as_deref().and_then(Resolution::parse)
    }
}

/// Parse an ISO-8601 timestamp with `Z` or an explicit offset. A naive
/// timestamp is read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| {
            // Date-only values settle at midnight UTC
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

/// Decode a list that may arrive as an array or a JSON-encoded string
fn string_list(value: &Value) -> Option<Vec<String>> {
    let decoded;
    let array = match value {
        Value::Array(items) => items,
        Value::String(s) => {
            decoded = serde_json::from_str::<Value>(s).ok()?;
            decoded.as_array()?
        }
        _ => return None,
    };

    Some(
        array
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

/// First token is YES, second is NO
fn parse_token_ids(tokens: Vec<String>) -> Option<(String, String)> {
    let [yes, no]: [String; 2] = tokens.try_into().ok()?;
    if yes.is_empty() || no.is_empty() {
        return None;
    }
    Some((yes, no))
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
