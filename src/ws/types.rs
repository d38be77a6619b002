//! Connection settings, reconnect schedule and stream messages

use std::time::Duration;
use thiserror::Error;

/// Connection settings for one stream
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Text frame sent after every successful connect (venue subscriptions)
    pub subscribe_message: Option<String>,
    /// Give up after this many failed connections in a row, 0 retries forever
    pub max_reconnect_attempts: u32,
    pub backoff: Backoff,
    /// Silence on the socket longer than this triggers a ping; an unanswered
    /// ping drops the connection
    pub ping_interval: Duration,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscribe_message: None,
            max_reconnect_attempts: 0,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(30)),
            ping_interval: Duration::from_secs(30),
        }
    }

    pub fn subscribe(mut self, message: impl Into<String>) -> Self {
        self.subscribe_message = Some(message.into());
        self
    }

    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Reconnect delays doubling from `initial` up to `max`
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff = Backoff::new(initial, max);
        self
    }
}

/// Exponential reconnect schedule: doubles from the initial delay up to the
/// ceiling, and starts over after a connection was established.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; advances the schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// What the connection task hands to its consumer
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Connected,
    /// Retry budget spent, no more messages follow
    Disconnected,
    Reconnecting { attempt: u32 },
}

/// Why a connection ended
#[derive(Debug, Clone, Error)]
pub enum WsError {
    #[error("Connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("No pong within {0:?}")]
    PongTimeout(Duration),
    #[error("Gave up after {0} attempts")]
    RetriesExhausted(u32),
    #[error("Stream ended without a close frame")]
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("wss://ws-feed.exchange.coinbase.com")
            .subscribe(r#"{"type":"subscribe"}"#)
            .max_reconnects(5)
            .backoff(Duration::from_millis(500), Duration::from_secs(10));

        assert_eq!(config.url, "wss://ws-feed.exchange.coinbase.com");
        assert_eq!(config.subscribe_message.as_deref(), Some(r#"{"type":"subscribe"}"#));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.ping_interval, Duration::from_secs(30));

        let mut backoff = config.backoff;
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_error_display() {
        let err = WsError::Connect {
            url: "wss://stream.binance.com:9443/ws".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Connect to wss://stream.binance.com:9443/ws failed: timeout"
        );
        assert_eq!(WsError::RetriesExhausted(3).to_string(), "Gave up after 3 attempts");
    }
}
