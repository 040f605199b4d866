//! Termux:API messaging commands
//!
//! The bridge runs inside Termux on the handset itself, so these commands are
//! local processes rather than `adb shell` invocations.

use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{duration_from_secs, TIMING_CONFIG};
use crate::error::{BridgeError, Result};

pub const SMS_LIST_PROGRAM: &str = "termux-sms-list";
pub const SMS_SEND_PROGRAM: &str = "termux-sms-send";

/// Inbox size requested when the unbounded listing is unusable.
const FALLBACK_LIST_LIMIT: &str = "50";

#[derive(Debug, Clone)]
pub struct TermuxMessaging {
    timeout: Duration,
}

impl TermuxMessaging {
    pub fn new() -> Self {
        Self {
            timeout: duration_from_secs(TIMING_CONFIG.connection.command_timeout),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| BridgeError::Timeout(format!("{} timed out after {:?}", program, self.timeout)))??;

        if !output.status.success() {
            return Err(BridgeError::CommandFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Raw inbox records, newest first as Termux reports them.
    pub async fn list_inbox(&self) -> Result<Vec<Value>> {
        match self.run(SMS_LIST_PROGRAM, &[]).await.and_then(|out| parse_listing(&out)) {
            Ok(records) => Ok(records),
            Err(e) => {
                debug!("{} unusable ({}), retrying with a limit", SMS_LIST_PROGRAM, e);
                let out = self
                    .run(SMS_LIST_PROGRAM, &["--limit", FALLBACK_LIST_LIMIT])
                    .await?;
                parse_listing(&out)
            }
        }
    }

    /// Send `text` to `number` from SIM `sim`.
    pub async fn send_message(&self, number: &str, text: &str, sim: u8) -> Result<bool> {
        let slot = sim.to_string();
        match self
            .run(SMS_SEND_PROGRAM, &["-n", number, "-s", &slot, text])
            .await
        {
            Ok(_) => Ok(true),
            Err(BridgeError::CommandFailed(msg)) => {
                warn!("SMS send to {} failed: {}", number, msg);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for TermuxMessaging {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_listing(output: &str) -> Result<Vec<Value>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(output)? {
        Value::Array(records) => Ok(records),
        other => Err(BridgeError::ParseError(format!(
            "expected a JSON array of messages, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing() {
        let out = r#"[{"threadid": 3, "type": "inbox", "read": false, "number": "+6281", "received": "2024-05-01 10:00:00", "body": "hi", "_id": 41}]"#;
        let records = parse_listing(out).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["number"], json!("+6281"));
    }

    #[test]
    fn test_parse_listing_empty_output() {
        assert!(parse_listing("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_rejects_non_array() {
        assert!(matches!(
            parse_listing(r#"{"error": "permission denied"}"#),
            Err(BridgeError::ParseError(_))
        ));
        assert!(matches!(parse_listing("not json"), Err(BridgeError::Json(_))));
    }
}
