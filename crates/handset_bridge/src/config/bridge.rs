//! Top-level bridge configuration

use std::time::Duration;

use super::timing::{duration_from_secs, UssdTimingConfig, TIMING_CONFIG};
use crate::ui::DEFAULT_AGENT_URL;

/// Default controller endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:9000/ws";

/// Default ceiling for remembered inbox identifiers.
pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Which UI automation surface to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiBackendPreference {
    /// Check the device and use the richest backend available.
    #[default]
    Auto,
    /// Require the on-device uiautomator agent.
    Structured,
    /// Only parse `uiautomator dump` output.
    RawDump,
}

impl UiBackendPreference {
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "structured" | "agent" => Self::Structured,
            "raw" | "dump" | "rawdump" => Self::RawDump,
            _ => Self::Auto,
        }
    }
}

/// Configuration for a bridge process
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub endpoint: String,
    pub device_id: Option<String>,
    pub adb_path: String,
    pub reconnect_delay: Duration,
    /// `None` retries forever.
    pub max_reconnects: Option<u32>,
    pub poll_interval: Duration,
    pub seen_capacity: usize,
    pub ui_backend: UiBackendPreference,
    pub agent_url: String,
    pub ussd_timing: UssdTimingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            device_id: None,
            adb_path: "adb".to_string(),
            reconnect_delay: duration_from_secs(TIMING_CONFIG.connection.reconnect_delay),
            max_reconnects: None,
            poll_interval: duration_from_secs(TIMING_CONFIG.watcher.poll_interval),
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            ui_backend: UiBackendPreference::Auto,
            agent_url: DEFAULT_AGENT_URL.to_string(),
            ussd_timing: TIMING_CONFIG.ussd.clone(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnects(mut self, max: Option<u32>) -> Self {
        self.max_reconnects = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the seen-set ceiling. Zero is bumped to one.
    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity.max(1);
        self
    }

    pub fn with_ui_backend(mut self, preference: UiBackendPreference) -> Self {
        self.ui_backend = preference;
        self
    }

    pub fn with_agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = url.into();
        self
    }

    pub fn with_ussd_timing(mut self, timing: UssdTimingConfig) -> Self {
        self.ussd_timing = timing;
        self
    }
}
