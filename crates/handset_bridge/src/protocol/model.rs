//! Data carried inside protocol events

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Identity snapshot sent in `bridge_hello`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub platform: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub serial: Option<String>,
    pub local_ip: Option<String>,
    pub sims: Vec<SimInfo>,
}

impl DeviceProfile {
    /// Profile with every field unknown and both SIM slots present.
    pub fn unknown(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            brand: None,
            model: None,
            os_version: None,
            serial: None,
            local_ip: None,
            sims: vec![SimInfo::empty(0), SimInfo::empty(1)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimInfo {
    pub slot: u8,
    pub imei: Option<String>,
    pub operator: Option<String>,
    pub phone_number: Option<String>,
}

impl SimInfo {
    pub fn empty(slot: u8) -> Self {
        Self {
            slot,
            imei: None,
            operator: None,
            phone_number: None,
        }
    }
}

/// Outcome of one USSD run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdResult {
    pub ok: bool,
    pub error: Option<String>,
    pub raw_ui: Option<String>,
    pub ussd_text: Option<String>,
}

impl UssdResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            raw_ui: None,
            ussd_text: None,
        }
    }

    pub fn captured(raw_ui: Option<String>, ussd_text: Option<String>) -> Self {
        Self {
            ok: true,
            error: None,
            raw_ui,
            ussd_text,
        }
    }
}

/// A message as forwarded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxRecord {
    pub id: String,
    pub sender: Option<String>,
    pub body: Option<String>,
    pub timestamp: Option<String>,
    pub raw: Value,
}

/// Scalar JSON field as text; null and empty strings count as absent.
fn scalar_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_of(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| scalar_text(value, k))
}

impl InboxRecord {
    /// Normalise a backend record. The identifier falls back through
    /// `id`, `_id`, `date`, `timestamp` and finally a digest of the record.
    pub fn from_raw(raw: Value) -> Self {
        let id = first_of(&raw, &["id", "_id", "date", "timestamp"])
            .unwrap_or_else(|| content_digest(&raw));
        Self {
            id,
            sender: first_of(&raw, &["address", "number", "sender"]),
            body: first_of(&raw, &["body", "text"]),
            timestamp: first_of(&raw, &["received", "date", "timestamp"]),
            raw,
        }
    }

    /// Timestamp as epoch milliseconds, when it can be read.
    ///
    /// Accepts epoch seconds or milliseconds and `YYYY-MM-DD HH:MM:SS`.
    pub fn timestamp_millis(&self) -> Option<i64> {
        let ts = self.timestamp.as_deref()?.trim();
        if let Ok(n) = ts.parse::<i64>() {
            // Ten digits or fewer is seconds.
            return Some(if n.abs() < 100_000_000_000 { n * 1000 } else { n });
        }
        NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis())
    }
}

/// Hex SHA-256 of the record's JSON text (object keys are sorted).
fn content_digest(raw: &Value) -> String {
    let canonical = raw.to_string();
    Sha256::digest(canonical.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_priority() {
        let with_id = InboxRecord::from_raw(json!({"id": 7, "date": 100}));
        assert_eq!(with_id.id, "7");

        let termux = InboxRecord::from_raw(json!({"_id": 41, "received": "2024-05-01 10:00:00"}));
        assert_eq!(termux.id, "41");

        let by_date = InboxRecord::from_raw(json!({"id": null, "date": "1714557600000"}));
        assert_eq!(by_date.id, "1714557600000");

        let by_ts = InboxRecord::from_raw(json!({"timestamp": 1714557600}));
        assert_eq!(by_ts.id, "1714557600");
    }

    #[test]
    fn test_digest_fallback_is_stable() {
        let a = InboxRecord::from_raw(json!({"number": "+62", "body": "hello"}));
        let b = InboxRecord::from_raw(json!({"body": "hello", "number": "+62"}));
        assert_eq!(a.id.len(), 64);
        assert_eq!(a.id, b.id);

        let c = InboxRecord::from_raw(json!({"number": "+62", "body": "hello!"}));
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_sender_body_timestamp() {
        let r = InboxRecord::from_raw(json!({
            "_id": 1,
            "number": "+628111",
            "body": "Sisa pulsa Rp5.000",
            "received": "2024-05-01 10:00:00"
        }));
        assert_eq!(r.sender.as_deref(), Some("+628111"));
        assert_eq!(r.body.as_deref(), Some("Sisa pulsa Rp5.000"));
        assert_eq!(r.timestamp_millis(), Some(1_714_557_600_000));
        assert_eq!(r.raw["_id"], 1);
    }

    #[test]
    fn test_timestamp_millis_forms() {
        let secs = InboxRecord::from_raw(json!({"id": "a", "timestamp": 1714557600}));
        let millis = InboxRecord::from_raw(json!({"id": "b", "date": 1714557600000i64}));
        assert_eq!(secs.timestamp_millis(), millis.timestamp_millis());

        let junk = InboxRecord::from_raw(json!({"id": "c", "date": "yesterday"}));
        assert_eq!(junk.timestamp_millis(), None);
    }

    #[test]
    fn test_ussd_result_wire_names() {
        let value = serde_json::to_value(UssdResult::captured(
            Some("<hierarchy/>".to_string()),
            None,
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "error": null, "rawUi": "<hierarchy/>", "ussdText": null})
        );
    }

    #[test]
    fn test_unknown_profile_has_two_sims() {
        let profile = DeviceProfile::unknown("termux");
        assert_eq!(profile.sims.len(), 2);
        assert_eq!(profile.sims[1].slot, 1);
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("osVersion").is_some());
        assert!(value["sims"][0].get("phoneNumber").is_some());
    }
}
