//! Reconnection policy for the controller link
//!
//! Constant delay, no backoff. By default the bridge never gives up: it is
//! meant to be always on, and the controller may be down for hours.

use std::time::Duration;

use crate::config::{duration_from_secs, TIMING_CONFIG};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait between the end of one attempt and the start of the next.
    pub delay: Duration,
    /// Consecutive failed connects tolerated; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: duration_from_secs(TIMING_CONFIG.connection.reconnect_delay),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether another connect should follow `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => failures < max,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_forever() {
        let policy = ReconnectPolicy::new(Duration::from_secs(5));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(u32::MAX));
    }

    #[test]
    fn test_capped_policy() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10)).with_max_attempts(Some(3));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
