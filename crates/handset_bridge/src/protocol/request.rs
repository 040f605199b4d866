//! Typed view of the actions a controller can request

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::envelope::Envelope;
use crate::error::{BridgeError, Result};
use crate::ui::UiNode;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SendSms { number: String, text: String, sim: u8 },
    OpenApp { package: String },
    AdbShell { cmd: String },
    SendUssd { code: String, sim: u8 },
    FindUi { by: String, value: String },
    ClickUi { node: Option<UiNode> },
    Screenshot,
    Unknown(String),
}

/// SIM slot given as a number, a numeric string, or not at all.
fn sim_slot<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| de::Error::custom(format!("invalid sim slot {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid sim slot {:?}", s))),
        Some(other) => Err(de::Error::custom(format!("invalid sim slot {}", other))),
    }
}

#[derive(Deserialize)]
struct SendSmsParams {
    number: String,
    text: String,
    #[serde(default, deserialize_with = "sim_slot")]
    sim: u8,
}

#[derive(Deserialize)]
struct OpenAppParams {
    package: String,
}

#[derive(Deserialize)]
struct AdbShellParams {
    cmd: String,
}

#[derive(Deserialize)]
struct SendUssdParams {
    #[serde(default)]
    code: String,
    #[serde(default, deserialize_with = "sim_slot")]
    sim: u8,
}

#[derive(Deserialize)]
struct FindUiParams {
    by: String,
    value: String,
}

#[derive(Deserialize)]
struct ClickUiParams {
    #[serde(default)]
    node: Option<UiNode>,
}

fn params<T: DeserializeOwned>(action: &str, data: &Value) -> Result<T> {
    T::deserialize(data)
        .map_err(|e| BridgeError::InvalidRequest(format!("{}: {}", action, e)))
}

impl Request {
    pub fn from_envelope(env: &Envelope) -> Result<Self> {
        let data = &env.data;
        Ok(match env.action.as_str() {
            "send_sms" => {
                let p: SendSmsParams = params(&env.action, data)?;
                Request::SendSms {
                    number: p.number,
                    text: p.text,
                    sim: p.sim,
                }
            }
            "open_app" => {
                let p: OpenAppParams = params(&env.action, data)?;
                Request::OpenApp { package: p.package }
            }
            "adb_shell" => {
                let p: AdbShellParams = params(&env.action, data)?;
                Request::AdbShell { cmd: p.cmd }
            }
            "send_ussd" => {
                let p: SendUssdParams = params(&env.action, data)?;
                Request::SendUssd {
                    code: p.code,
                    sim: p.sim,
                }
            }
            "find_ui" => {
                let p: FindUiParams = params(&env.action, data)?;
                Request::FindUi {
                    by: p.by,
                    value: p.value,
                }
            }
            "click_ui" => {
                let p: ClickUiParams = params(&env.action, data)?;
                Request::ClickUi { node: p.node }
            }
            "screenshot" => Request::Screenshot,
            other => Request::Unknown(other.to_string()),
        })
    }

    /// Action name as it appears on the wire.
    pub fn action(&self) -> &str {
        match self {
            Request::SendSms { .. } => "send_sms",
            Request::OpenApp { .. } => "open_app",
            Request::AdbShell { .. } => "adb_shell",
            Request::SendUssd { .. } => "send_ussd",
            Request::FindUi { .. } => "find_ui",
            Request::ClickUi { .. } => "click_ui",
            Request::Screenshot => "screenshot",
            Request::Unknown(action) => action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: &str, data: Value) -> Result<Request> {
        Request::from_envelope(&Envelope {
            action: action.to_string(),
            data,
            id: Some(json!("1")),
        })
    }

    #[test]
    fn test_send_sms_sim_forms() {
        let default = request("send_sms", json!({"number": "123", "text": "hi"})).unwrap();
        assert_eq!(
            default,
            Request::SendSms {
                number: "123".to_string(),
                text: "hi".to_string(),
                sim: 0
            }
        );

        for sim in [json!(1), json!("1"), json!(" 1 ")] {
            match request("send_sms", json!({"number": "1", "text": "t", "sim": sim})).unwrap() {
                Request::SendSms { sim, .. } => assert_eq!(sim, 1),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            request("send_sms", json!({"text": "hi"})),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            request("send_ussd", json!({"code": "*123#", "sim": "two"})),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            request("send_ussd", json!({"code": "*123#", "sim": -1})),
            Err(BridgeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_missing_ussd_code_is_empty() {
        assert_eq!(
            request("send_ussd", json!({})).unwrap(),
            Request::SendUssd {
                code: String::new(),
                sim: 0
            }
        );
    }

    #[test]
    fn test_click_ui_node() {
        let req = request("click_ui", json!({"node": {"bounds": "[0,0][10,10]"}})).unwrap();
        match req {
            Request::ClickUi { node: Some(node) } => assert_eq!(node.center(), Some((5, 5))),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            request("click_ui", json!({})).unwrap(),
            Request::ClickUi { node: None }
        );
    }

    #[test]
    fn test_unknown_action() {
        let req = request("reboot", json!({})).unwrap();
        assert_eq!(req, Request::Unknown("reboot".to_string()));
        assert_eq!(req.action(), "reboot");
        assert_eq!(request("screenshot", json!({})).unwrap().action(), "screenshot");
    }
}
