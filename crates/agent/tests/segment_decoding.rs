//! Integration tests for decoding synthetic producer segments.
//!
//! Segment images come from `gputap_core::fixtures`, laid out exactly as
//! the producers publish them.

use std::collections::BTreeSet;

use encoding_rs::WINDOWS_1252;
use gputap_core::fixtures::{MahmSegment, RtssApp, RtssSegment, Sensor};
use gputap_core::metrics::MetricMap;
use gputap_core::{afterburner, rtss};

fn decode_gpu(bytes: &[u8]) -> MetricMap {
    afterburner::decode_segment(bytes, WINDOWS_1252).unwrap_or_default()
}

fn decode_frames(bytes: &[u8]) -> MetricMap {
    rtss::decode_segment(bytes).unwrap_or_default()
}

fn keys(metrics: &MetricMap) -> BTreeSet<&str> {
    metrics.keys().collect()
}

// ---------------------------------------------------------------------------
// GPU segment
// ---------------------------------------------------------------------------

/// A well-formed segment yields exactly the keys the rule table dictates,
/// each holding the truncated reading.
#[test]
fn gpu_segment_yields_exact_canonical_keys() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("GPU temperature", "C", 65.7, 0))
        .with_sensor(Sensor::new("GPU usage", "%", 99.9, 0))
        .with_sensor(Sensor::new("Core clock", "MHz", 1830.4, 0))
        .with_sensor(Sensor::new("Memory clock", "MHz", 9501.0, 0))
        .with_sensor(Sensor::new("Memory usage", "MB", 4096.6, 0))
        .with_sensor(Sensor::new("Power", "W", 215.3, 0))
        .with_sensor(Sensor::new("Framerate", "FPS", 143.8, 0))
        .to_bytes();

    let metrics = decode_gpu(&bytes);

    let expected: BTreeSet<&str> = [
        "ab_gpu0_temp_c",
        "ab_gpu_temp_c",
        "ab_gpu0_usage_pct",
        "ab_gpu_usage_pct",
        "ab_gpu0_core_clock_mhz",
        "ab_gpu_core_clock_mhz",
        "ab_gpu0_mem_clock_mhz",
        "ab_mem_clock_mhz",
        "ab_gpu0_vram_used_mb",
        "ab_vram_used_mb",
        "ab_gpu0_power_w",
        "ab_power_w",
        "ab_fps",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys(&metrics), expected);

    assert_eq!(metrics.get_integer("ab_gpu_usage_pct"), Some(99));
    assert_eq!(metrics.get_integer("ab_gpu0_core_clock_mhz"), Some(1830));
    assert_eq!(metrics.get_integer("ab_vram_used_mb"), Some(4096));
    assert_eq!(metrics.get_integer("ab_power_w"), Some(215));
    assert_eq!(metrics.get_integer("ab_fps"), Some(143));
}

/// 65.7 truncates to 65 under both the per-device and aggregate key.
#[test]
fn temperature_is_truncated_not_rounded() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("GPU Temperature", "C", 65.7, 0))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.get_integer("ab_gpu0_temp_c"), Some(65));
    assert_eq!(metrics.get_integer("ab_gpu_temp_c"), Some(65));
    assert_eq!(metrics.len(), 2);
}

/// "Fan Speed" classifies by unit: `%` is a duty cycle, `RPM` a tach reading.
#[test]
fn fan_speed_is_disambiguated_by_unit() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("Fan Speed", "%", 80.0, 0))
        .with_sensor(Sensor::new("Fan Speed", "RPM", 1200.0, 0))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.get_integer("ab_gpu0_fan_pct"), Some(80));
    assert_eq!(metrics.get_integer("ab_fan_pct"), Some(80));
    assert_eq!(metrics.get_integer("ab_gpu0_fan_rpm"), Some(1200));
    assert_eq!(metrics.get_integer("ab_fan_rpm"), Some(1200));
}

/// Unrecognised sensors fall back to `raw_*`, and a second sensor with the
/// same name does not overwrite the first.
#[test]
fn unmatched_sensor_keeps_first_raw_value() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("Board Power Limit", "", 250.9, 0))
        .with_sensor(Sensor::new("Board Power Limit", "", 300.0, 1))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.get_integer("raw_board_power_limit"), Some(250));
    assert_eq!(metrics.len(), 1);
}

/// Per-device keys are distinct across GPUs; the aggregate alias keeps the
/// first GPU's reading.
#[test]
fn aggregate_alias_keeps_first_gpu() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("GPU temperature", "C", 61.0, 0))
        .with_sensor(Sensor::new("GPU temperature", "C", 74.0, 1))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.get_integer("ab_gpu0_temp_c"), Some(61));
    assert_eq!(metrics.get_integer("ab_gpu1_temp_c"), Some(74));
    assert_eq!(metrics.get_integer("ab_gpu_temp_c"), Some(61));
}

/// Entries with blank names are skipped entirely.
#[test]
fn blank_entries_are_skipped() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("", "C", 50.0, 0))
        .with_sensor(Sensor::new("   ", "%", 50.0, 0))
        .with_sensor(Sensor::new("GPU usage", "%", 12.0, 0))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics.get_integer("ab_gpu0_usage_pct"), Some(12));
}

/// Names that are not valid UTF-8 still decode through the legacy codepage.
#[test]
fn legacy_encoded_names_still_classify() {
    // "Temp\xe9rature" in windows-1252; no rule matches, so it lands in
    // the fallback key with the decoded accent intact.
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::from_raw(b"Temp\xe9rature", b"\xb0C", 48.2, 0))
        .to_bytes();

    let metrics = decode_gpu(&bytes);
    assert_eq!(metrics.get_integer("raw_temp\u{e9}rature"), Some(48));
}

#[test]
fn wrong_signature_decodes_to_empty() {
    let bytes = MahmSegment {
        signature: 0xDEAD_BEEF,
        ..MahmSegment::default()
    }
    .with_sensor(Sensor::new("GPU usage", "%", 50.0, 0))
    .to_bytes();

    assert!(afterburner::decode_segment(&bytes, WINDOWS_1252).is_err());
    assert!(decode_gpu(&bytes).is_empty());
}

/// A declared entry count that runs past the end of the snapshot must not
/// read out of bounds.
#[test]
fn entry_count_past_end_decodes_to_empty() {
    let bytes = MahmSegment {
        entry_count: Some(1_000),
        ..MahmSegment::default()
    }
    .with_sensor(Sensor::new("GPU usage", "%", 50.0, 0))
    .to_bytes();

    assert!(decode_gpu(&bytes).is_empty());
}

#[test]
fn truncated_header_decodes_to_empty() {
    let bytes = MahmSegment::default()
        .with_sensor(Sensor::new("GPU usage", "%", 50.0, 0))
        .to_bytes();

    assert!(decode_gpu(&bytes[..16]).is_empty());
    assert!(decode_gpu(&[]).is_empty());
}

// ---------------------------------------------------------------------------
// Frame-overlay segment
// ---------------------------------------------------------------------------

/// Three active apps at 0, 144.9 and 60.2 FPS: the 144.9 one is reported.
#[test]
fn fastest_app_is_reported() {
    let bytes = RtssSegment::default()
        .with_app(RtssApp::new(10, "launcher.exe", 0.0, 0.0))
        .with_app(RtssApp::new(20, "game.exe", 144.9, 6.9))
        .with_app(RtssApp::new(30, "video.exe", 60.2, 16.6))
        .to_bytes();

    let metrics = decode_frames(&bytes);
    assert_eq!(metrics.get_integer("rtss_fps"), Some(144));
    assert_eq!(metrics.get_integer("rtss_frametime_ms"), Some(6));
    assert_eq!(metrics.len(), 2);
}

/// Inactive slots are ignored even when they hold stale frame rates.
#[test]
fn inactive_slots_are_ignored() {
    let bytes = RtssSegment::default()
        .with_app(RtssApp::new(0, "", 240.0, 4.1))
        .with_app(RtssApp::new(42, "game.exe", 90.0, 11.1))
        .to_bytes();

    assert_eq!(decode_frames(&bytes).get_integer("rtss_fps"), Some(90));
}

#[test]
fn idle_overlay_decodes_to_empty() {
    let bytes = RtssSegment::default()
        .with_app(RtssApp::new(10, "launcher.exe", 0.0, 0.0))
        .to_bytes();

    assert!(decode_frames(&bytes).is_empty());
}

#[test]
fn frame_segment_with_bad_signature_decodes_to_empty() {
    let bytes = RtssSegment {
        signature: 0,
        ..RtssSegment::default()
    }
    .with_app(RtssApp::new(20, "game.exe", 144.9, 6.9))
    .to_bytes();

    assert!(decode_frames(&bytes).is_empty());
}

#[test]
fn app_array_past_end_decodes_to_empty() {
    let bytes = RtssSegment {
        app_array_size: Some(280 * 64),
        ..RtssSegment::default()
    }
    .with_app(RtssApp::new(20, "game.exe", 144.9, 6.9))
    .to_bytes();

    assert!(decode_frames(&bytes).is_empty());
}
