//! Timing configuration for the bridge loops and UI automation

use lazy_static::lazy_static;
use std::env;
use std::time::Duration;

/// Seconds from the environment. Negative, NaN and infinite values fall
/// back to `default`.
fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

/// Seconds as a `Duration`; values `Duration` cannot hold become zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Controller link timing
#[derive(Debug, Clone)]
pub struct ConnectionTimingConfig {
    pub reconnect_delay: f64,
    pub command_timeout: f64,
}

impl Default for ConnectionTimingConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: env_f64("BRIDGE_RECONNECT_DELAY", 5.0),
            command_timeout: env_f64("BRIDGE_COMMAND_TIMEOUT", 30.0),
        }
    }
}

/// Inbox watcher timing
#[derive(Debug, Clone)]
pub struct WatcherTimingConfig {
    pub poll_interval: f64,
}

impl Default for WatcherTimingConfig {
    fn default() -> Self {
        Self {
            poll_interval: env_f64("BRIDGE_POLL_INTERVAL", 3.0),
        }
    }
}

/// USSD automation timing.
///
/// All of these are plain waits: the dialer gives no signal when the
/// SIM chooser or the operator response has finished rendering.
#[derive(Debug, Clone)]
pub struct UssdTimingConfig {
    pub prompt_settle_delay: f64,
    pub prompt_retry_delay: f64,
    pub response_settle_delay: f64,
    pub prompt_max_attempts: u32,
}

impl UssdTimingConfig {
    /// No waits at all. Useful for tests and for replaying captured dumps.
    pub fn immediate() -> Self {
        Self {
            prompt_settle_delay: 0.0,
            prompt_retry_delay: 0.0,
            response_settle_delay: 0.0,
            prompt_max_attempts: 4,
        }
    }

    pub fn prompt_settle(&self) -> Duration {
        duration_from_secs(self.prompt_settle_delay)
    }

    pub fn prompt_retry(&self) -> Duration {
        duration_from_secs(self.prompt_retry_delay)
    }

    pub fn response_settle(&self) -> Duration {
        duration_from_secs(self.response_settle_delay)
    }
}

impl Default for UssdTimingConfig {
    fn default() -> Self {
        Self {
            prompt_settle_delay: env_f64("BRIDGE_USSD_PROMPT_SETTLE_DELAY", 1.5),
            prompt_retry_delay: env_f64("BRIDGE_USSD_PROMPT_RETRY_DELAY", 1.0),
            response_settle_delay: env_f64("BRIDGE_USSD_RESPONSE_DELAY", 4.0),
            prompt_max_attempts: env::var("BRIDGE_USSD_PROMPT_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}

/// Master timing configuration
#[derive(Debug, Clone, Default)]
pub struct TimingConfig {
    pub connection: ConnectionTimingConfig,
    pub watcher: WatcherTimingConfig,
    pub ussd: UssdTimingConfig,
}

lazy_static! {
    /// Global timing configuration instance
    pub static ref TIMING_CONFIG: TimingConfig = TimingConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_f64_falls_back_on_garbage() {
        env::set_var("BRIDGE_TEST_GARBAGE_DELAY", "soon");
        assert_eq!(env_f64("BRIDGE_TEST_GARBAGE_DELAY", 2.5), 2.5);
        env::set_var("BRIDGE_TEST_GARBAGE_DELAY", "0.25");
        assert_eq!(env_f64("BRIDGE_TEST_GARBAGE_DELAY", 2.5), 0.25);
        env::remove_var("BRIDGE_TEST_GARBAGE_DELAY");
    }

    #[test]
    fn test_env_f64_rejects_unusable_seconds() {
        for bad in ["-1", "NaN", "inf", "-inf"] {
            env::set_var("BRIDGE_TEST_BAD_DELAY", bad);
            assert_eq!(env_f64("BRIDGE_TEST_BAD_DELAY", 1.5), 1.5, "{} accepted", bad);
        }
        env::set_var("BRIDGE_TEST_BAD_DELAY", "0");
        assert_eq!(env_f64("BRIDGE_TEST_BAD_DELAY", 1.5), 0.0);
        env::remove_var("BRIDGE_TEST_BAD_DELAY");
    }

    #[test]
    fn test_unusable_ussd_delays_become_zero() {
        let timing = UssdTimingConfig {
            prompt_settle_delay: -1.0,
            prompt_retry_delay: f64::NAN,
            response_settle_delay: f64::INFINITY,
            prompt_max_attempts: 1,
        };
        assert_eq!(timing.prompt_settle(), Duration::ZERO);
        assert_eq!(timing.prompt_retry(), Duration::ZERO);
        assert_eq!(timing.response_settle(), Duration::ZERO);
        assert_eq!(duration_from_secs(2.5), Duration::from_millis(2500));
    }

    #[test]
    fn test_immediate_ussd_timing() {
        let timing = UssdTimingConfig::immediate();
        assert_eq!(timing.prompt_settle(), Duration::ZERO);
        assert_eq!(timing.response_settle(), Duration::ZERO);
        assert_eq!(timing.prompt_max_attempts, 4);
    }
}
