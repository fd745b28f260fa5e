use std::time::Duration;

use encoding_rs::Encoding;
use gputap_core::metric_names::{AFTERBURNER_SEGMENT_NAME, RTSS_SEGMENT_NAME};
use gputap_core::text::default_legacy_encoding;

use crate::poller::DEFAULT_POLL_INTERVAL;

/// Identifier sent with WebSocket payloads when `AGENT_ID` is unset.
const DEFAULT_AGENT_ID: &str = "local";

/// Agent configuration loaded from environment variables.
///
/// Every field has a default suitable for a single desktop running both
/// producers; only `BACKEND_WS_URL` switches behaviour on.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Period between poll cycles (default: 1000 ms).
    pub poll_interval: Duration,
    /// GPU-monitoring segment name.
    pub afterburner_segment: String,
    /// Frame-overlay segment name.
    pub rtss_segment: String,
    /// Codepage for text fields that are not valid UTF-8.
    pub legacy_encoding: &'static Encoding,
    /// When set, metrics are pushed to this WebSocket endpoint instead of
    /// the in-process variable store.
    pub backend_ws_url: Option<String>,
    pub agent_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            afterburner_segment: AFTERBURNER_SEGMENT_NAME.to_owned(),
            rtss_segment: RTSS_SEGMENT_NAME.to_owned(),
            legacy_encoding: default_legacy_encoding(),
            backend_ws_url: None,
            agent_id: DEFAULT_AGENT_ID.to_owned(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var               | Default              |
    /// |-----------------------|----------------------|
    /// | `POLL_INTERVAL_MS`    | `1000`               |
    /// | `AFTERBURNER_SEGMENT` | `MAHMSharedMemory`   |
    /// | `RTSS_SEGMENT`        | `RTSSSharedMemoryV2` |
    /// | `LEGACY_CODEPAGE`     | `windows-1252`       |
    /// | `BACKEND_WS_URL`      | --                   |
    /// | `AGENT_ID`            | `local`              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_interval = match non_empty("POLL_INTERVAL_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidInterval(raw)),
            },
            None => defaults.poll_interval,
        };

        let legacy_encoding = match non_empty("LEGACY_CODEPAGE") {
            Some(label) => Encoding::for_label(label.trim().as_bytes())
                .ok_or(ConfigError::UnknownCodepage(label))?,
            None => defaults.legacy_encoding,
        };

        Ok(Self {
            poll_interval,
            afterburner_segment: non_empty("AFTERBURNER_SEGMENT")
                .unwrap_or(defaults.afterburner_segment),
            rtss_segment: non_empty("RTSS_SEGMENT").unwrap_or(defaults.rtss_segment),
            legacy_encoding,
            backend_ws_url: non_empty("BACKEND_WS_URL"),
            agent_id: non_empty("AGENT_ID").unwrap_or(defaults.agent_id),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("POLL_INTERVAL_MS must be a positive integer, got '{0}'")]
    InvalidInterval(String),

    #[error("LEGACY_CODEPAGE '{0}' is not a known encoding label")]
    UnknownCodepage(String),
}
