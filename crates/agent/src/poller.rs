//! Poll loop: decode every source on a timer or on demand and publish.
//!
//! Decoding is synchronous and bounded, so a cycle runs inline on the
//! loop's task. A failed or empty decode just means nothing is published
//! for that source this cycle; the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use gputap_core::metrics::MetricMap;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::reader::{FrameTelemetryReader, GpuTelemetryReader, TelemetrySource};
use crate::sink::MetricSink;

/// Default period between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Requests an out-of-cycle refresh from outside the loop.
///
/// Triggers made while no cycle is waiting are remembered, so a request is
/// never lost; several requests before the loop wakes collapse into one.
#[derive(Debug, Clone, Default)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    /// Resolves once a refresh has been requested.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// The ordered set of telemetry sources polled each cycle.
pub struct MetricsPoller {
    sources: Vec<Box<dyn TelemetrySource>>,
}

impl MetricsPoller {
    pub fn new(sources: Vec<Box<dyn TelemetrySource>>) -> Self {
        Self { sources }
    }

    /// GPU segment first, then the frame overlay.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(vec![
            Box::new(GpuTelemetryReader::new(
                config.afterburner_segment.clone(),
                config.legacy_encoding,
            )),
            Box::new(FrameTelemetryReader::new(config.rtss_segment.clone())),
        ])
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Decode every source and merge the results into one map.
    pub fn collect(&self) -> MetricMap {
        let mut merged = MetricMap::new();
        for source in &self.sources {
            merged.merge(source.decode());
        }
        merged
    }

    /// Run one cycle, publishing each source's non-empty map separately.
    ///
    /// Returns the number of metrics published.
    pub fn refresh_once(&self, sink: &dyn MetricSink) -> usize {
        let mut published = 0;
        for source in &self.sources {
            let metrics = source.decode();
            if metrics.is_empty() {
                continue;
            }
            tracing::debug!(source = source.label(), count = metrics.len(), "Publishing metrics");
            published += metrics.len();
            sink.publish(&metrics);
        }
        published
    }
}

/// Poll until `cancel` fires.
///
/// A cycle runs immediately, then every `interval`, plus once per
/// [`RefreshHandle::trigger`]. Manual refreshes do not shift the timer.
pub async fn run(
    poller: Arc<MetricsPoller>,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
    refresh: RefreshHandle,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        sources = poller.source_count(),
        "Metrics poller started",
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Metrics poller stopping");
                break;
            }
            _ = ticker.tick() => {
                poller.refresh_once(sink.as_ref());
            }
            _ = refresh.requested() => {
                tracing::debug!("Manual refresh requested");
                poller.refresh_once(sink.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gputap_core::error::DecodeError;

    use super::*;
    use crate::sink::VariableStore;

    struct FixedSource {
        label: &'static str,
        metrics: MetricMap,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(label: &'static str, pairs: &[(&str, i64)]) -> Self {
            let mut metrics = MetricMap::new();
            for (key, value) in pairs {
                metrics.set(*key, *value);
            }
            Self {
                label,
                metrics,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TelemetrySource for FixedSource {
        fn label(&self) -> &str {
            self.label
        }

        fn try_decode(&self) -> Result<MetricMap, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.metrics.clone())
        }
    }

    struct FailingSource;

    impl TelemetrySource for FailingSource {
        fn label(&self) -> &str {
            "failing"
        }

        fn try_decode(&self) -> Result<MetricMap, DecodeError> {
            Err(DecodeError::MalformedHeader("bad signature".into()))
        }
    }

    #[test]
    fn refresh_once_publishes_every_non_empty_source() {
        let poller = MetricsPoller::new(vec![
            Box::new(FixedSource::new("gpu", &[("ab_gpu_temp_c", 65), ("ab_gpu0_temp_c", 65)])),
            Box::new(FailingSource),
            Box::new(FixedSource::new("frames", &[("rtss_fps", 144)])),
        ]);
        let store = VariableStore::new();

        assert_eq!(poller.refresh_once(&store), 3);
        assert_eq!(store.get_integer("ab_gpu_temp_c"), Some(65));
        assert_eq!(store.get_integer("rtss_fps"), Some(144));
    }

    #[test]
    fn collect_merges_sources() {
        let poller = MetricsPoller::new(vec![
            Box::new(FixedSource::new("gpu", &[("ab_fps", 60)])),
            Box::new(FixedSource::new("frames", &[("rtss_fps", 59)])),
        ]);
        let merged = poller.collect();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_integer("ab_fps"), Some(60));
    }

    #[test]
    fn failing_sources_publish_nothing() {
        let poller = MetricsPoller::new(vec![Box::new(FailingSource)]);
        let store = VariableStore::new();
        assert_eq!(poller.refresh_once(&store), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn trigger_before_wait_is_not_lost() {
        let refresh = RefreshHandle::new();
        refresh.trigger();
        tokio::time::timeout(Duration::from_secs(1), refresh.requested())
            .await
            .expect("stored permit should resolve immediately");
    }
}
