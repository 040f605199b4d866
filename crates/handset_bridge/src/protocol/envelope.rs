//! Inbound envelopes and outbound events

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::model::{DeviceProfile, InboxRecord, UssdResult};
use crate::adb::Screenshot;
use crate::error::{BridgeError, Result};
use crate::ui::UiNode;

/// A command from the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub action: String,
    pub data: Value,
    pub id: Option<Value>,
}

impl Envelope {
    /// Parse a text frame. Anything without a string `action` is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| BridgeError::ParseError(format!("not JSON: {}", e)))?;
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(BridgeError::ParseError(format!(
                    "expected an object, got {}",
                    kind_of(&other)
                )))
            }
        };

        let action = match obj.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Err(BridgeError::ParseError("missing action".to_string())),
        };
        let data = match obj.remove("data") {
            Some(data @ Value::Object(_)) => data,
            _ => json!({}),
        };
        let id = obj.remove("id").filter(|id| !id.is_null());

        Ok(Self { action, data, id })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A reply or unsolicited push. The payload fields sit next to `type`
/// and `id` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub id: Option<Value>,
}

impl OutboundEvent {
    pub fn new(kind: &str, payload: Value, id: Option<Value>) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            kind: kind.to_string(),
            payload,
            id,
        }
    }

    pub fn bridge_hello(profile: &DeviceProfile) -> Self {
        Self::new(
            "bridge_hello",
            json!({ "info": profile }),
            Some(Value::String(Uuid::new_v4().to_string())),
        )
    }

    pub fn message_received(record: &InboxRecord) -> Self {
        Self::new("message_received", json!({ "data": record }), None)
    }

    pub fn send_sms_result(ok: bool, id: Option<Value>) -> Self {
        Self::new("send_sms_result", json!({ "ok": ok }), id)
    }

    pub fn open_app_result(ok: bool, id: Option<Value>) -> Self {
        Self::new("open_app_result", json!({ "ok": ok }), id)
    }

    pub fn adb_shell_result(out: &str, id: Option<Value>) -> Self {
        Self::new("adb_shell_result", json!({ "out": out }), id)
    }

    pub fn send_ussd_result(result: &UssdResult, id: Option<Value>) -> Self {
        Self::new("send_ussd_result", json!({ "result": result }), id)
    }

    pub fn find_ui_result(node: Option<&UiNode>, id: Option<Value>) -> Self {
        Self::new("find_ui_result", json!({ "result": node }), id)
    }

    pub fn click_ui_result(ok: bool, id: Option<Value>) -> Self {
        Self::new("click_ui_result", json!({ "ok": ok }), id)
    }

    pub fn screenshot_result(shot: Option<&Screenshot>, id: Option<Value>) -> Self {
        let payload = match shot {
            Some(shot) => json!({
                "ok": true,
                "image": shot.base64_data,
                "width": shot.width,
                "height": shot.height,
            }),
            None => json!({ "ok": false, "image": null, "width": null, "height": null }),
        };
        Self::new("screenshot_result", payload, id)
    }

    pub fn unknown_action(action: &str, id: Option<Value>) -> Self {
        Self::new("unknown_action", json!({ "action": action }), id)
    }

    pub fn error(msg: impl Into<String>, id: Option<Value>) -> Self {
        Self::new("error", json!({ "msg": msg.into() }), id)
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let env = Envelope::parse(r#"{"action":"send_sms","data":{"number":"123"},"id":"r1"}"#).unwrap();
        assert_eq!(env.action, "send_sms");
        assert_eq!(env.data["number"], "123");
        assert_eq!(env.id, Some(json!("r1")));
    }

    #[test]
    fn test_parse_defaults() {
        let env = Envelope::parse(r#"{"action":"screenshot","data":[1,2],"id":null}"#).unwrap();
        assert_eq!(env.data, json!({}));
        assert_eq!(env.id, None);

        let numeric = Envelope::parse(r#"{"action":"x","id":42}"#).unwrap();
        assert_eq!(numeric.id, Some(json!(42)));
    }

    #[test]
    fn test_parse_malformed() {
        for text in [
            "",
            "not json",
            "[1,2,3]",
            "\"send_sms\"",
            r#"{"data":{}}"#,
            r#"{"action":5}"#,
            r#"{"action":"send_sms""#,
        ] {
            assert!(
                matches!(Envelope::parse(text), Err(BridgeError::ParseError(_))),
                "{:?} should be malformed",
                text
            );
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let event = OutboundEvent::send_sms_result(true, Some(json!("abc")));
        let value: Value = serde_json::from_str(&event.to_text().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "send_sms_result", "ok": true, "id": "abc"}));

        let push = OutboundEvent::unknown_action("reboot", None);
        let value = serde_json::to_value(&push).unwrap();
        assert_eq!(value, json!({"type": "unknown_action", "action": "reboot", "id": null}));
    }

    #[test]
    fn test_bridge_hello_has_fresh_id() {
        let profile = DeviceProfile::unknown("termux");
        let a = OutboundEvent::bridge_hello(&profile);
        let b = OutboundEvent::bridge_hello(&profile);
        assert_ne!(a.id, b.id);
        assert_eq!(a.payload["info"]["platform"], "termux");
    }

    #[test]
    fn test_screenshot_result_failure() {
        let value = serde_json::to_value(OutboundEvent::screenshot_result(None, Some(json!(1)))).unwrap();
        assert_eq!(value["ok"], false);
        assert!(value["image"].is_null());
    }
}
