//! Maps raw `(name, unit, value, gpu)` sensor readings onto canonical keys.
//!
//! Matching is case-insensitive substring containment against an ordered
//! rule table; the first rule whose name and unit predicates both hold
//! wins. Order matters: "fan speed" in `%` must be tried before "fan speed"
//! in `rpm`, and "power" in watts before "power" in `%`.
//!
//! Sensors no rule recognises are published under `raw_<sanitized name>`.

use crate::metric_names::{
    AB_FAN_PCT, AB_FAN_RPM, AB_FPS, AB_GPU_CORE_CLOCK_MHZ, AB_GPU_TEMP_C, AB_GPU_USAGE_PCT,
    AB_MEM_CLOCK_MHZ, AB_POWER_PCT, AB_POWER_W, AB_VRAM_USED_MB, AFTERBURNER_PREFIX, RAW_PREFIX,
};
use crate::metrics::truncate;

/// How a classified key is merged into the cycle's output map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    /// `ab_gpu{N}_*`; a later entry for the same key replaces it.
    Device,
    /// Family-wide alias; the first entry seen keeps the key.
    Aggregate,
    /// `raw_*` for unrecognised sensors; the first entry seen keeps the key.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMetric {
    pub key: String,
    pub value: i64,
    pub slot: KeySlot,
}

/// Unit predicate, evaluated on the lowercased unit string.
#[derive(Debug, Clone, Copy)]
pub enum UnitMatch {
    /// Contains any of the listed substrings.
    Contains(&'static [&'static str]),
    /// Equals `exact` or contains `contains`.
    ExactOrContains {
        exact: &'static str,
        contains: &'static str,
    },
    /// Contains the substring, or the unit is empty.
    ContainsOrEmpty(&'static str),
}

impl UnitMatch {
    pub fn matches(&self, unit: &str) -> bool {
        match *self {
            Self::Contains(needles) => needles.iter().any(|n| unit.contains(n)),
            Self::ExactOrContains { exact, contains } => unit == exact || unit.contains(contains),
            Self::ContainsOrEmpty(needle) => unit.is_empty() || unit.contains(needle),
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// The lowercased name must contain one of these.
    pub name_contains: &'static [&'static str],
    pub unit: UnitMatch,
    /// Suffix of the per-device key; `None` for aggregate-only families.
    pub device_metric: Option<&'static str>,
    pub aggregate_key: &'static str,
}

impl Rule {
    pub fn matches(&self, name: &str, unit: &str) -> bool {
        self.name_contains.iter().any(|n| name.contains(n)) && self.unit.matches(unit)
    }
}

/// Classification rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name_contains: &["gpu temperature"],
        unit: UnitMatch::Contains(&["c"]),
        device_metric: Some("temp_c"),
        aggregate_key: AB_GPU_TEMP_C,
    },
    Rule {
        name_contains: &["gpu usage"],
        unit: UnitMatch::Contains(&["%"]),
        device_metric: Some("usage_pct"),
        aggregate_key: AB_GPU_USAGE_PCT,
    },
    Rule {
        name_contains: &["gpu clock", "core clock"],
        unit: UnitMatch::Contains(&["mhz"]),
        device_metric: Some("core_clock_mhz"),
        aggregate_key: AB_GPU_CORE_CLOCK_MHZ,
    },
    Rule {
        name_contains: &["memory clock"],
        unit: UnitMatch::Contains(&["mhz"]),
        device_metric: Some("mem_clock_mhz"),
        aggregate_key: AB_MEM_CLOCK_MHZ,
    },
    Rule {
        name_contains: &["memory usage"],
        unit: UnitMatch::Contains(&["mb", "mib"]),
        device_metric: Some("vram_used_mb"),
        aggregate_key: AB_VRAM_USED_MB,
    },
    Rule {
        name_contains: &["fan speed"],
        unit: UnitMatch::Contains(&["%"]),
        device_metric: Some("fan_pct"),
        aggregate_key: AB_FAN_PCT,
    },
    Rule {
        name_contains: &["fan tach", "fan speed"],
        unit: UnitMatch::Contains(&["rpm"]),
        device_metric: Some("fan_rpm"),
        aggregate_key: AB_FAN_RPM,
    },
    Rule {
        name_contains: &["power"],
        unit: UnitMatch::ExactOrContains {
            exact: "w",
            contains: "watt",
        },
        device_metric: Some("power_w"),
        aggregate_key: AB_POWER_W,
    },
    Rule {
        name_contains: &["power"],
        unit: UnitMatch::Contains(&["%"]),
        device_metric: Some("power_pct"),
        aggregate_key: AB_POWER_PCT,
    },
    Rule {
        name_contains: &["framerate"],
        unit: UnitMatch::ContainsOrEmpty("fps"),
        device_metric: None,
        aggregate_key: AB_FPS,
    },
];

/// First rule matching `name` / `unit`, compared case-insensitively.
pub fn match_rule(name: &str, unit: &str) -> Option<&'static Rule> {
    let name = name.to_lowercase();
    let unit = unit.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&name, &unit))
}

/// Classify one sensor reading.
///
/// Returns a per-device and an aggregate key for recognised families
/// (aggregate only for frame rate), or a single fallback key otherwise.
/// Values are truncated toward zero.
pub fn classify(name: &str, unit: &str, value: f32, gpu_index: u32) -> Vec<ClassifiedMetric> {
    let value = truncate(value);

    let Some(rule) = match_rule(name, unit) else {
        return vec![ClassifiedMetric {
            key: fallback_key(name),
            value,
            slot: KeySlot::Fallback,
        }];
    };

    let mut out = Vec::with_capacity(2);
    if let Some(metric) = rule.device_metric {
        out.push(ClassifiedMetric {
            key: device_key(gpu_index, metric),
            value,
            slot: KeySlot::Device,
        });
    }
    out.push(ClassifiedMetric {
        key: rule.aggregate_key.to_owned(),
        value,
        slot: KeySlot::Aggregate,
    });
    out
}

/// `ab_gpu{index}_{metric}`.
pub fn device_key(gpu_index: u32, metric: &str) -> String {
    format!("{AFTERBURNER_PREFIX}_gpu{gpu_index}_{metric}")
}

/// `raw_` followed by the sanitized sensor name.
pub fn fallback_key(name: &str) -> String {
    format!("{RAW_PREFIX}{}", sanitize_key(name))
}

/// Lowercase, replace every non letter/digit with `_`, trim outer `_`.
pub fn sanitize_key(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_owned()
}
