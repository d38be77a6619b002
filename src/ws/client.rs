//! Self-healing WebSocket connection task

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Consumer buffer of the connection task
const CHANNEL_DEPTH: usize = 1024;

/// How a connection ended without a transport error
enum StreamEnd {
    /// Nobody listens any more; stop for good
    ReceiverDropped,
    /// Server sent a close frame; reconnect
    ServerClosed,
}

/// Reconnecting WebSocket client.
///
/// One spawned task owns the socket: it re-sends the subscribe frame on
/// every connect, answers pings, pings an idle server and backs off
/// exponentially between attempts.
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Spawn the connection task and return its message stream.
    ///
    /// The task ends when the receiver is dropped or, with a retry limit,
    /// once the limit is spent (after sending [`WsMessage::Disconnected`]).
    pub fn connect(&self) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = supervise(config, tx).await {
                error!(error = %e, "WebSocket task stopped");
            }
        });

        rx
    }
}

async fn supervise(mut config: WsConfig, tx: mpsc::Sender<WsMessage>) -> Result<(), WsError> {
    let mut failures = 0u32;

    loop {
        let mut connected = false;
        let outcome = stream_once(&config, &tx, &mut connected).await;
        if connected {
            failures = 0;
            config.backoff.reset();
        }

        match outcome {
            Ok(StreamEnd::ReceiverDropped) => {
                debug!(url = %config.url, "Receiver dropped, closing socket");
                return Ok(());
            }
            Ok(StreamEnd::ServerClosed) => info!(url = %config.url, "Server closed the socket"),
            Err(e) => warn!(url = %config.url, error = %e, "Socket failed"),
        }

        failures += 1;
        if config.max_reconnect_attempts > 0 && failures >= config.max_reconnect_attempts {
            let _ = tx.send(WsMessage::Disconnected).await;
            return Err(WsError::RetriesExhausted(failures));
        }
        if tx.is_closed() {
            return Ok(());
        }

        let _ = tx.send(WsMessage::Reconnecting { attempt: failures }).await;
        let delay = config.backoff.next_delay();
        info!(url = %config.url, attempt = failures, delay_ms = delay.as_millis() as u64, "Reconnecting");
        sleep(delay).await;
    }
}

/// One connection from handshake to disconnect
async fn stream_once(
    config: &WsConfig,
    tx: &mpsc::Sender<WsMessage>,
    connected: &mut bool,
) -> Result<StreamEnd, WsError> {
    let (socket, _) = connect_async(&config.url).await.map_err(|e| WsError::Connect {
        url: config.url.clone(),
        reason: e.to_string(),
    })?;
    let (mut sink, mut source) = socket.split();

    if let Some(frame) = &config.subscribe_message {
        sink.send(Message::Text(frame.clone()))
            .await
            .map_err(|e| WsError::Transport(e.to_string()))?;
    }

    *connected = true;
    info!(url = %config.url, "WebSocket connected");
    if tx.send(WsMessage::Connected).await.is_err() {
        return Ok(StreamEnd::ReceiverDropped);
    }

    let mut keepalive = tokio::time::interval(config.ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    keepalive.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            frame = source.next() => {
                let forward = match frame {
                    Some(Ok(Message::Text(text))) => WsMessage::Text(text),
                    Some(Ok(Message::Binary(data))) => WsMessage::Binary(data),
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data))
                            .await
                            .map_err(|e| WsError::Transport(e.to_string()))?;
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) => return Ok(StreamEnd::ServerClosed),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(WsError::Transport(e.to_string())),
                    None => return Err(WsError::Eof),
                };
                if tx.send(forward).await.is_err() {
                    return Ok(StreamEnd::ReceiverDropped);
                }
            }

            _ = keepalive.tick() => {
                if awaiting_pong {
                    return Err(WsError::PongTimeout(config.ping_interval));
                }
                sink.send(Message::Ping(Vec::new()))
                    .await
                    .map_err(|e| WsError::Transport(e.to_string()))?;
                awaiting_pong = true;
            }
        }
    }
}
