//! Per-producer telemetry readers.
//!
//! Each reader re-opens its segment on every call, since the producer may
//! have restarted between polls. It copies the header, then only the span
//! the header declares, and releases the mapping before decoding.
//! [`TelemetrySource::decode`] is the public boundary: every failure
//! collapses to an empty map there.

use encoding_rs::Encoding;
use gputap_core::afterburner::{self, MahmHeader};
use gputap_core::error::DecodeError;
use gputap_core::layout::FixedRecord;
use gputap_core::metric_names::{AFTERBURNER_SEGMENT_NAME, RTSS_SEGMENT_NAME};
use gputap_core::metrics::MetricMap;
use gputap_core::rtss::{self, RtssHeader};
use gputap_core::text::default_legacy_encoding;

use crate::shm::SharedSegment;

/// Something that can produce one cycle's worth of metrics.
pub trait TelemetrySource: Send + Sync {
    /// Short label for log lines.
    fn label(&self) -> &str;

    /// Decode, reporting why nothing was produced.
    fn try_decode(&self) -> Result<MetricMap, DecodeError>;

    /// Decode, treating any failure as "no data this cycle".
    fn decode(&self) -> MetricMap {
        match self.try_decode() {
            Ok(metrics) => metrics,
            Err(e) if e.is_unavailable() => {
                tracing::trace!(source = self.label(), error = %e, "Telemetry source not running");
                MetricMap::new()
            }
            Err(e) => {
                tracing::debug!(source = self.label(), error = %e, "Discarding unreadable segment");
                MetricMap::new()
            }
        }
    }
}

/// Copy the header, ask `required_len` how far its records extend, and
/// copy that much. A span past the end of the mapping is cut short and left
/// for the decoder to reject.
fn copy_declared_span(
    segment_name: &str,
    header_size: usize,
    required_len: fn(&[u8]) -> Result<u64, DecodeError>,
) -> Result<Vec<u8>, DecodeError> {
    let segment = SharedSegment::open(segment_name)?;
    let needed = required_len(&segment.snapshot_prefix(header_size))?;
    Ok(segment.snapshot_prefix(usize::try_from(needed).unwrap_or(usize::MAX)))
}

/// Reads the GPU-monitoring segment.
#[derive(Debug, Clone)]
pub struct GpuTelemetryReader {
    segment_name: String,
    legacy_encoding: &'static Encoding,
}

impl Default for GpuTelemetryReader {
    fn default() -> Self {
        Self::new(AFTERBURNER_SEGMENT_NAME, default_legacy_encoding())
    }
}

impl GpuTelemetryReader {
    pub fn new(segment_name: impl Into<String>, legacy_encoding: &'static Encoding) -> Self {
        Self {
            segment_name: segment_name.into(),
            legacy_encoding,
        }
    }

    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }
}

impl TelemetrySource for GpuTelemetryReader {
    fn label(&self) -> &str {
        "afterburner"
    }

    fn try_decode(&self) -> Result<MetricMap, DecodeError> {
        let snapshot = copy_declared_span(
            &self.segment_name,
            MahmHeader::SIZE,
            afterburner::required_len,
        )?;
        afterburner::decode_segment(&snapshot, self.legacy_encoding)
    }
}

/// Reads the frame-rate-overlay segment.
#[derive(Debug, Clone)]
pub struct FrameTelemetryReader {
    segment_name: String,
}

impl Default for FrameTelemetryReader {
    fn default() -> Self {
        Self::new(RTSS_SEGMENT_NAME)
    }
}

impl FrameTelemetryReader {
    pub fn new(segment_name: impl Into<String>) -> Self {
        Self {
            segment_name: segment_name.into(),
        }
    }

    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }
}

impl TelemetrySource for FrameTelemetryReader {
    fn label(&self) -> &str {
        "rtss"
    }

    fn try_decode(&self) -> Result<MetricMap, DecodeError> {
        let snapshot =
            copy_declared_span(&self.segment_name, RtssHeader::SIZE, rtss::required_len)?;
        rtss::decode_segment(&snapshot)
    }
}
