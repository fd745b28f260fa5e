//! WebSocket connection and telemetry push loop.
//!
//! Connects to the backend WebSocket endpoint, periodically collects
//! metrics via [`MetricsPoller`], and pushes them as JSON. Also listens
//! for incoming `refresh` commands, which trigger an immediate push.

use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use gputap_core::metric_names::MSG_TYPE_TELEMETRY;
use gputap_core::metrics::MetricMap;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::poller::{MetricsPoller, RefreshHandle};

/// Reconnection delay after a WebSocket failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Outgoing telemetry payload sent to the backend.
#[derive(Debug, Serialize)]
pub struct TelemetryPayload<'a> {
    r#type: &'static str,
    agent_id: &'a str,
    metrics: &'a MetricMap,
    timestamp: String,
}

impl<'a> TelemetryPayload<'a> {
    pub fn new(agent_id: &'a str, metrics: &'a MetricMap) -> Self {
        Self {
            r#type: MSG_TYPE_TELEMETRY,
            agent_id,
            metrics,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Envelope for incoming messages from the backend.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    #[serde(rename = "refresh")]
    Refresh,
}

/// Run the push loop until `cancel` fires.
///
/// Reconnects with a fixed delay if the WebSocket connection drops.
pub async fn run(
    ws_url: &str,
    agent_id: &str,
    interval: Duration,
    poller: &MetricsPoller,
    refresh: RefreshHandle,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        tracing::info!(url = %ws_url, "Connecting to backend WebSocket");

        match connect_async(ws_url).await {
            Ok((ws_stream, _response)) => {
                tracing::info!("WebSocket connected");
                run_session(ws_stream, agent_id, interval, poller, &refresh, &cancel).await;
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!("WebSocket session ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket connection failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    tracing::info!("Telemetry sender stopped");
}

/// Drive a single WebSocket session: push metrics on a timer or on
/// request and handle incoming commands via `tokio::select!`.
async fn run_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    agent_id: &str,
    interval: Duration,
    poller: &MetricsPoller,
    refresh: &RefreshHandle,
    cancel: &CancellationToken,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = send_metrics(&mut sink, agent_id, poller).await {
                    tracing::error!(error = %e, "Failed to send metrics");
                    break;
                }
            }
            _ = refresh.requested() => {
                if let Err(e) = send_metrics(&mut sink, agent_id, poller).await {
                    tracing::error!(error = %e, "Failed to send metrics");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if parse_incoming(&text).is_some() {
                            tracing::info!("Backend requested refresh");
                            refresh.trigger();
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Backend closed WebSocket");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary frames carry nothing for us.
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket receive error");
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream exhausted");
                        break;
                    }
                }
            }
        }
    }
}

/// Collect metrics and send them as a JSON text frame.
///
/// Nothing is sent when every source came back empty.
async fn send_metrics<S>(
    sink: &mut S,
    agent_id: &str,
    poller: &MetricsPoller,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let metrics = poller.collect();
    if metrics.is_empty() {
        tracing::trace!("No telemetry this cycle");
        return Ok(());
    }

    let json = serde_json::to_string(&TelemetryPayload::new(agent_id, &metrics))
        .expect("TelemetryPayload is always serialisable");
    tracing::debug!(count = metrics.len(), "Sending telemetry");
    sink.send(Message::Text(json)).await
}

/// Parse an incoming text frame; unknown messages are logged and dropped.
pub fn parse_incoming(text: &str) -> Option<IncomingMessage> {
    match serde_json::from_str::<IncomingMessage>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "Unknown or malformed incoming message");
            None
        }
    }
}
