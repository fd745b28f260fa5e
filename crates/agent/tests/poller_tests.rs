//! Integration tests for the poll loop's lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gputap_agent::poller::{self, MetricsPoller, RefreshHandle};
use gputap_agent::reader::TelemetrySource;
use gputap_agent::sink::{MetricSink, VariableStore};
use gputap_core::error::DecodeError;
use gputap_core::metrics::MetricMap;
use tokio_util::sync::CancellationToken;

/// Reports how many times it has been decoded as `cycles`.
#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

impl TelemetrySource for CountingSource {
    fn label(&self) -> &str {
        "counting"
    }

    fn try_decode(&self) -> Result<MetricMap, DecodeError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut metrics = MetricMap::new();
        metrics.set("cycles", calls as i64);
        Ok(metrics)
    }
}

async fn wait_for_cycles(store: &VariableStore, at_least: i64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.get_integer("cycles").unwrap_or(0) < at_least {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poller should reach the expected cycle count");
}

/// With an hour-long interval, only the immediate first tick and manual
/// refreshes can produce cycles.
#[tokio::test]
async fn manual_refresh_runs_an_extra_cycle() {
    let poller = Arc::new(MetricsPoller::new(vec![Box::new(CountingSource::default())]));
    let store = VariableStore::new();
    let sink: Arc<dyn MetricSink> = Arc::new(store.clone());
    let refresh = RefreshHandle::new();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(poller::run(
        poller,
        sink,
        Duration::from_secs(3600),
        refresh.clone(),
        cancel.clone(),
    ));

    wait_for_cycles(&store, 1).await;
    refresh.trigger();
    wait_for_cycles(&store, 2).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("poller should stop after cancellation")
        .expect("poller task should not panic");

    assert_eq!(store.get_integer("cycles"), Some(2));
}

#[tokio::test]
async fn cancelled_poller_stops_immediately() {
    let poller = Arc::new(MetricsPoller::new(Vec::new()));
    let sink: Arc<dyn MetricSink> = Arc::new(VariableStore::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(
        Duration::from_secs(5),
        poller::run(poller, sink, Duration::from_millis(10), RefreshHandle::new(), cancel),
    )
    .await
    .expect("a cancelled poller returns without polling forever");
}

/// Absent producers leave the store untouched rather than clearing it.
#[test]
fn absent_producers_publish_nothing() {
    let config = gputap_agent::config::AgentConfig {
        afterburner_segment: "gputap-absent-mahm".into(),
        rtss_segment: "gputap-absent-rtss".into(),
        ..Default::default()
    };
    let poller = MetricsPoller::from_config(&config);
    let store = VariableStore::new();
    store.publish(&{
        let mut previous = MetricMap::new();
        previous.set("rtss_fps", 60_i64);
        previous
    });

    assert_eq!(poller.source_count(), 2);
    assert_eq!(poller.refresh_once(&store), 0);
    assert_eq!(store.get_integer("rtss_fps"), Some(60));
}
