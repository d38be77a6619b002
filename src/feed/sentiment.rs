//! Fear & greed index poller

use super::{FeedError, FeedEvent, MarketFeed, SentimentReading};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    #[serde(default)]
    value_classification: String,
}

/// Polls the fear & greed index on a fixed interval
pub struct SentimentPoller {
    client: Client,
    url: String,
    interval: Duration,
}

impl SentimentPoller {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self, FeedError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
            interval,
        })
    }

    /// Fetch the current reading
    pub async fn fetch(&self) -> Result<SentimentReading, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }
        let body: FngResponse = response.json().await?;
        parse_reading(body)
    }
}

fn parse_reading(body: FngResponse) -> Result<SentimentReading, FeedError> {
    let entry = body
        .data
        .into_iter()
        .next()
        .ok_or_else(|| FeedError::Decode("empty fear & greed payload".to_string()))?;
    let value: u8 = entry
        .value
        .parse()
        .map_err(|_| FeedError::Decode(format!("fear & greed value {}", entry.value)))?;
    Ok(SentimentReading {
        value: value.min(100),
        classification: entry.value_classification,
        timestamp: Utc::now(),
    })
}

#[async_trait]
impl MarketFeed for SentimentPoller {
    async fn subscribe(&self, events: mpsc::Sender<FeedEvent>) -> anyhow::Result<()> {
        let poller = Self {
            client: self.client.clone(),
            url: self.url.clone(),
            interval: self.interval,
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            loop {
                ticker.tick().await;
                match poller.fetch().await {
                    Ok(reading) => {
                        if events.send(FeedEvent::Sentiment(reading)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Fear & greed poll failed"),
                }
            }
        });
        Ok(())
    }
}
