//! Canonical metric keys, segment names and wire message types.
//!
//! Keys are lowercase and underscore-delimited. Per-device keys are built
//! at runtime as `ab_gpu{index}_{metric}`; the aggregate keys below alias
//! the first device seen for each family.

/// Default name of the GPU-monitoring segment.
pub const AFTERBURNER_SEGMENT_NAME: &str = "MAHMSharedMemory";

/// Default name of the frame-rate-overlay segment.
pub const RTSS_SEGMENT_NAME: &str = "RTSSSharedMemoryV2";

/// Prefix shared by every classified GPU key.
pub const AFTERBURNER_PREFIX: &str = "ab";

/// Prefix for sensors that match no classification rule.
pub const RAW_PREFIX: &str = "raw_";

pub const AB_GPU_TEMP_C: &str = "ab_gpu_temp_c";
pub const AB_GPU_USAGE_PCT: &str = "ab_gpu_usage_pct";
pub const AB_GPU_CORE_CLOCK_MHZ: &str = "ab_gpu_core_clock_mhz";
pub const AB_MEM_CLOCK_MHZ: &str = "ab_mem_clock_mhz";
pub const AB_VRAM_USED_MB: &str = "ab_vram_used_mb";
pub const AB_FAN_PCT: &str = "ab_fan_pct";
pub const AB_FAN_RPM: &str = "ab_fan_rpm";
pub const AB_POWER_W: &str = "ab_power_w";
pub const AB_POWER_PCT: &str = "ab_power_pct";
pub const AB_FPS: &str = "ab_fps";

/// Frame rate of the selected foreground application.
pub const RTSS_FPS: &str = "rtss_fps";

/// Frame time in milliseconds of the selected foreground application.
pub const RTSS_FRAMETIME_MS: &str = "rtss_frametime_ms";

/// WebSocket message type discriminator for telemetry payloads.
pub const MSG_TYPE_TELEMETRY: &str = "telemetry";

/// WebSocket message type for an out-of-cycle refresh request.
pub const MSG_TYPE_REFRESH: &str = "refresh";
