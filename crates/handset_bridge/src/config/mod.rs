//! Configuration module for handset_bridge
//!
//! This module contains:
//! - `bridge`: Endpoint, device and loop settings
//! - `sim_labels`: Multilingual SIM chooser labels
//! - `timing`: Timing configurations for loops and automation

mod bridge;
mod sim_labels;
mod timing;

pub use bridge::{BridgeConfig, UiBackendPreference, DEFAULT_ENDPOINT, DEFAULT_SEEN_CAPACITY};
pub use sim_labels::{labels_for_slot, mentions_slot, SIM_LABELS};
pub use timing::{
    duration_from_secs, ConnectionTimingConfig, TimingConfig, UssdTimingConfig, WatcherTimingConfig, TIMING_CONFIG,
};
