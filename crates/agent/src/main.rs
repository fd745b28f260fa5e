//! `gputap-agent` -- GPU and frame-rate telemetry bridge.
//!
//! Polls the shared-memory segments published by the GPU monitor and the
//! frame-rate overlay, classifies the readings into canonical metric keys,
//! and publishes them either to the in-process variable store or, when
//! `BACKEND_WS_URL` is set, to a backend over WebSocket.
//!
//! Ctrl-C stops the agent. On unix, SIGHUP requests an immediate refresh.
//! See [`AgentConfig::from_env`] for the environment variables.

use std::sync::Arc;

use gputap_agent::config::AgentConfig;
use gputap_agent::poller::{self, MetricsPoller, RefreshHandle};
use gputap_agent::sender;
use gputap_agent::sink::{MetricSink, TracingSink, VariableStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gputap_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        afterburner_segment = %config.afterburner_segment,
        rtss_segment = %config.rtss_segment,
        interval_ms = config.poll_interval.as_millis() as u64,
        legacy_codepage = config.legacy_encoding.name(),
        "Starting gputap-agent",
    );

    let poller = Arc::new(MetricsPoller::from_config(&config));
    let refresh = RefreshHandle::new();
    let cancel = CancellationToken::new();

    spawn_signal_handlers(refresh.clone(), cancel.clone());

    match config.backend_ws_url.as_deref() {
        Some(ws_url) => {
            sender::run(
                ws_url,
                &config.agent_id,
                config.poll_interval,
                &poller,
                refresh,
                cancel,
            )
            .await;
        }
        None => {
            let store = VariableStore::new();
            let sink: Arc<dyn MetricSink> = Arc::new((store.clone(), TracingSink));
            poller::run(poller, sink, config.poll_interval, refresh, cancel).await;
            tracing::info!(variables = store.len(), "Variable store released");
        }
    }
}

/// Ctrl-C cancels the agent; SIGHUP (unix only) requests a refresh.
fn spawn_signal_handlers(refresh: RefreshHandle, cancel: CancellationToken) {
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        shutdown.cancel();
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP refresh trigger unavailable");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("SIGHUP received, refreshing");
                    refresh.trigger();
                }
            }
        }
    });

    #[cfg(not(unix))]
    drop(refresh);
}
