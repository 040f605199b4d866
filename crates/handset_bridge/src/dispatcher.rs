//! Request dispatch: one envelope in, exactly one correlated reply out

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adb::{encode_screenshot, launch_package, shell_quote, start_activity, tap};
use crate::device::{DeviceCommands, SharedDevice};
use crate::profile::gather_device_profile;
use crate::protocol::{Envelope, OutboundEvent, Request};
use crate::transport::SessionHandler;
use crate::ui::{UiAutomationBackend, UiNode, UiSelector};
use crate::ussd::UssdAutomator;

/// Collaborators the handlers run against, built once at startup.
pub struct Handlers {
    pub device: SharedDevice,
    /// UI strategies in preference order.
    pub ui: Vec<Arc<dyn UiAutomationBackend>>,
    pub ussd: UssdAutomator,
}

pub struct Dispatcher {
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    pub async fn dispatch(&self, envelope: Envelope) -> OutboundEvent {
        let id = envelope.id.clone();
        let request = match Request::from_envelope(&envelope) {
            Ok(request) => request,
            Err(e) => {
                warn!(action = %envelope.action, id = ?id, "Rejecting request: {}", e);
                return OutboundEvent::error(e.to_string(), id);
            }
        };

        if let Request::Unknown(action) = &request {
            warn!(action = %action, id = ?id, "Unknown action");
            return OutboundEvent::unknown_action(action, id);
        }

        info!(action = %request.action(), id = ?id, "Handling request");
        // Held for the whole handler so the inbox poll cannot interleave.
        let device = self.handlers.device.lock().await;
        self.execute(&*device, request, id).await
    }

    async fn execute(&self, device: &dyn DeviceCommands, request: Request, id: Option<Value>) -> OutboundEvent {
        match request {
            Request::SendSms { number, text, sim } => {
                let ok = send_sms(device, &number, &text, sim).await;
                OutboundEvent::send_sms_result(ok, id)
            }
            Request::OpenApp { package } => {
                let ok = launch_package(device, &package).await.unwrap_or_else(|e| {
                    warn!("Launching {} failed: {}", package, e);
                    false
                });
                OutboundEvent::open_app_result(ok, id)
            }
            Request::AdbShell { cmd } => {
                let out = device.shell(&cmd).await.unwrap_or_else(|e| {
                    warn!("Shell command failed: {}", e);
                    String::new()
                });
                OutboundEvent::adb_shell_result(&out, id)
            }
            Request::SendUssd { code, sim } => {
                let result = self.handlers.ussd.run(device, &code, sim).await;
                OutboundEvent::send_ussd_result(&result, id)
            }
            Request::FindUi { by, value } => {
                let node = match UiSelector::from_wire(&by, &value) {
                    Some(selector) => self.find_ui(&selector).await,
                    None => {
                        debug!("Unsupported find_ui strategy {:?}", by);
                        None
                    }
                };
                OutboundEvent::find_ui_result(node.as_ref(), id)
            }
            Request::ClickUi { node } => {
                let ok = match node {
                    Some(node) => self.click_ui(device, &node).await,
                    None => false,
                };
                OutboundEvent::click_ui_result(ok, id)
            }
            Request::Screenshot => {
                let shot = match device.capture_screenshot().await {
                    Ok(Some(png)) => encode_screenshot(&png)
                        .map_err(|e| warn!("Screenshot could not be encoded: {}", e))
                        .ok(),
                    Ok(None) => None,
                    Err(e) => {
                        warn!("Screenshot failed: {}", e);
                        None
                    }
                };
                OutboundEvent::screenshot_result(shot.as_ref(), id)
            }
            Request::Unknown(action) => OutboundEvent::unknown_action(&action, id),
        }
    }

    async fn find_ui(&self, selector: &UiSelector) -> Option<UiNode> {
        for strategy in &self.handlers.ui {
            match strategy.find(selector).await {
                Ok(Some(node)) => return Some(node),
                Ok(None) => {}
                Err(e) => debug!("{} backend lookup failed: {}", strategy.kind(), e),
            }
        }
        None
    }

    /// Tap the node's centre; without bounds let a backend click it by id.
    async fn click_ui(&self, device: &dyn DeviceCommands, node: &UiNode) -> bool {
        if let Some((x, y)) = node.center() {
            return match tap(device, x, y).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Tap at ({}, {}) failed: {}", x, y, e);
                    false
                }
            };
        }

        for strategy in &self.handlers.ui {
            match strategy.click(node).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!("{} backend click failed: {}", strategy.kind(), e),
            }
        }
        false
    }
}

/// Messaging backend first, then the SMS composer intent.
async fn send_sms(device: &dyn DeviceCommands, number: &str, text: &str, sim: u8) -> bool {
    match device.send_message(number, text, sim).await {
        Ok(true) => return true,
        Ok(false) => warn!("Messaging backend refused SMS to {}", number),
        Err(e) => warn!("Messaging backend failed for {}: {}", number, e),
    }

    let args = format!(
        "-a android.intent.action.SENDTO -d {} --es sms_body {} --ez exit_on_sent true",
        shell_quote(&format!("smsto:{}", number)),
        shell_quote(text)
    );
    match start_activity(device, &args).await {
        Ok(started) => {
            info!("SMS composer fallback for {} started: {}", number, started);
            started
        }
        Err(e) => {
            warn!("SMS composer fallback failed: {}", e);
            false
        }
    }
}

#[async_trait]
impl SessionHandler for Dispatcher {
    async fn hello(&self) -> OutboundEvent {
        let device = self.handlers.device.lock().await;
        let profile = gather_device_profile(&*device).await;
        OutboundEvent::bridge_hello(&profile)
    }

    async fn handle(&self, envelope: Envelope) -> Option<OutboundEvent> {
        Some(self.dispatch(envelope).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::solid_png;
    use crate::config::UssdTimingConfig;
    use crate::testing::{button, FakeDevice, FakeUiBackend};
    use crate::ui::UiBackendKind;
    use serde_json::json;

    struct Fixture {
        device: Arc<FakeDevice>,
        shared: SharedDevice,
        ui: Arc<FakeUiBackend>,
        dispatcher: Dispatcher,
    }

    fn fixture(device: FakeDevice, ui: FakeUiBackend) -> Fixture {
        let device = Arc::new(device);
        let shared = SharedDevice::new(device.clone());
        let ui = Arc::new(ui);
        let strategies: Vec<Arc<dyn UiAutomationBackend>> = vec![ui.clone()];
        let dispatcher = Dispatcher::new(Handlers {
            device: shared.clone(),
            ui: strategies.clone(),
            ussd: UssdAutomator::new(strategies, UssdTimingConfig::immediate()),
        });
        Fixture {
            device,
            shared,
            ui,
            dispatcher,
        }
    }

    fn simple() -> Fixture {
        fixture(FakeDevice::new(), FakeUiBackend::new(UiBackendKind::RawDump))
    }

    fn envelope(action: &str, data: Value, id: Value) -> Envelope {
        Envelope {
            action: action.to_string(),
            data,
            id: Some(id),
        }
    }

    async fn reply(f: &Fixture, action: &str, data: Value) -> Value {
        let event = f.dispatcher.dispatch(envelope(action, data, json!("req-1"))).await;
        serde_json::to_value(event).unwrap()
    }

    #[tokio::test]
    async fn test_reply_id_matches_request() {
        let f = simple();
        let requests = [
            ("send_sms", json!({"number": "1", "text": "t"})),
            ("open_app", json!({"package": "com.whatsapp"})),
            ("adb_shell", json!({"cmd": "id"})),
            ("send_ussd", json!({"code": ""})),
            ("find_ui", json!({"by": "text", "value": "OK"})),
            ("click_ui", json!({})),
            ("screenshot", json!({})),
            ("bogus", json!({})),
            ("send_sms", json!({})),
        ];
        for (i, (action, data)) in requests.into_iter().enumerate() {
            let id = json!(format!("id-{}", i));
            let event = f.dispatcher.dispatch(envelope(action, data, id.clone())).await;
            assert_eq!(event.id, Some(id), "{} lost its id", action);
        }
    }

    #[tokio::test]
    async fn test_send_sms_primary_path() {
        let f = simple();
        let value = reply(&f, "send_sms", json!({"number": "123", "text": "hi", "sim": 1})).await;
        assert_eq!(value, json!({"type": "send_sms_result", "ok": true, "id": "req-1"}));
        assert_eq!(f.device.sent_messages(), vec![("123".to_string(), "hi".to_string(), 1)]);
        assert!(f.device.commands_containing("SENDTO").is_empty());
    }

    #[tokio::test]
    async fn test_send_sms_fallback_succeeds() {
        let f = fixture(
            FakeDevice::new()
                .with_send_outcome(Some(false))
                .respond("SENDTO", "Starting: Intent { act=android.intent.action.SENDTO dat=smsto:xxx }"),
            FakeUiBackend::new(UiBackendKind::RawDump),
        );
        let value = reply(&f, "send_sms", json!({"number": "123", "text": "hi", "sim": 1})).await;
        assert_eq!(value["ok"], true);

        let fallback = f.device.commands_containing("SENDTO");
        assert_eq!(fallback.len(), 1);
        assert!(fallback[0].contains("'smsto:123'"));
        assert!(fallback[0].contains("--es sms_body 'hi'"));
    }

    #[tokio::test]
    async fn test_send_sms_fallback_fails() {
        let f = fixture(
            FakeDevice::new().with_send_outcome(None).fail_on("SENDTO"),
            FakeUiBackend::new(UiBackendKind::RawDump),
        );
        let value = reply(&f, "send_sms", json!({"number": "123", "text": "hi", "sim": 1})).await;
        assert_eq!(value["ok"], false);
        assert_eq!(f.device.commands_containing("SENDTO").len(), 1);
    }

    #[tokio::test]
    async fn test_adb_shell_failure_is_empty_output() {
        let f = fixture(FakeDevice::new().fail_on("reboot"), FakeUiBackend::new(UiBackendKind::RawDump));
        let value = reply(&f, "adb_shell", json!({"cmd": "reboot"})).await;
        assert_eq!(value, json!({"type": "adb_shell_result", "out": "", "id": "req-1"}));

        let f = fixture(FakeDevice::new().respond("getprop", "12\n"), FakeUiBackend::new(UiBackendKind::RawDump));
        let value = reply(&f, "adb_shell", json!({"cmd": "getprop ro.build.version.release"})).await;
        assert_eq!(value["out"], "12\n");
    }

    #[tokio::test]
    async fn test_send_ussd_empty_code() {
        let f = simple();
        let value = reply(&f, "send_ussd", json!({"code": "", "sim": 0})).await;
        assert_eq!(value["type"], "send_ussd_result");
        assert_eq!(value["result"]["ok"], false);
        assert_eq!(value["result"]["error"], "empty ussd code");
        assert!(f.device.commands().is_empty());
    }

    #[tokio::test]
    async fn test_send_ussd_without_prompt() {
        let f = fixture(
            FakeDevice::new().respond("am start", "Starting: Intent { act=android.intent.action.CALL }"),
            FakeUiBackend::new(UiBackendKind::RawDump)
                .with_dump(r#"<hierarchy><node text="Your balance is 5.00" class="android.widget.TextView" /></hierarchy>"#)
                .hidden_for(usize::MAX),
        );
        let value = reply(&f, "send_ussd", json!({"code": "*123#", "sim": 0})).await;
        assert_eq!(value["result"]["ok"], true);
        assert_eq!(value["result"]["ussdText"], "Your balance is 5.00");
        assert!(f.device.commands()[0].contains("tel:%2A123%23"));
    }

    #[tokio::test]
    async fn test_find_ui() {
        let f = fixture(
            FakeDevice::new(),
            FakeUiBackend::new(UiBackendKind::RawDump).with_nodes(vec![button("Send", 500)]),
        );
        let value = reply(&f, "find_ui", json!({"by": "text", "value": "Send"})).await;
        assert_eq!(value["result"]["text"], "Send");
        assert_eq!(value["result"]["bounds"], "[0,500][400,600]");

        let value = reply(&f, "find_ui", json!({"by": "text", "value": "Cancel"})).await;
        assert!(value["result"].is_null());

        let value = reply(&f, "find_ui", json!({"by": "xpath", "value": "//node"})).await;
        assert!(value["result"].is_null());
    }

    #[tokio::test]
    async fn test_click_ui_taps_bounds_centre() {
        let f = simple();
        let value = reply(&f, "click_ui", json!({"node": {"text": "Send", "bounds": "[0,500][400,600]"}})).await;
        assert_eq!(value["ok"], true);
        assert_eq!(f.device.commands(), vec!["input tap 200 550".to_string()]);
        assert!(f.ui.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_click_ui_by_resource_id() {
        let f = simple();
        let value = reply(&f, "click_ui", json!({"node": {"resource-id": "android:id/button1"}})).await;
        assert_eq!(value["ok"], true);
        assert_eq!(f.ui.clicks()[0].resource_id.as_deref(), Some("android:id/button1"));

        let value = reply(&f, "click_ui", json!({"node": {"text": "nothing to go on"}})).await;
        assert_eq!(value["ok"], false);
    }

    #[tokio::test]
    async fn test_screenshot() {
        let f = fixture(
            FakeDevice::new().with_screenshot(solid_png(8, 16)),
            FakeUiBackend::new(UiBackendKind::RawDump),
        );
        let value = reply(&f, "screenshot", json!({})).await;
        assert_eq!(value["ok"], true);
        assert_eq!(value["width"], 8);
        assert_eq!(value["height"], 16);
        assert!(value["image"].as_str().unwrap().len() > 10);

        let value = reply(&simple(), "screenshot", json!({})).await;
        assert_eq!(value["ok"], false);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid() {
        let f = simple();
        let value = reply(&f, "reboot", json!({})).await;
        assert_eq!(value, json!({"type": "unknown_action", "action": "reboot", "id": "req-1"}));

        let value = reply(&f, "open_app", json!({})).await;
        assert_eq!(value["type"], "error");
        assert!(value["msg"].as_str().unwrap().contains("package"));
        assert_eq!(value["id"], "req-1");
    }

    #[tokio::test]
    async fn test_handler_waits_for_device() {
        let f = Arc::new(simple());
        let guard = f.shared.lock().await;

        let pending = tokio::spawn({
            let f = f.clone();
            async move {
                f.dispatcher
                    .dispatch(envelope("adb_shell", json!({"cmd": "id"}), json!(1)))
                    .await
            }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(f.device.commands().is_empty());

        drop(guard);
        assert_eq!(pending.await.unwrap().kind, "adb_shell_result");
        assert_eq!(f.device.commands(), vec!["id".to_string()]);
    }

    #[tokio::test]
    async fn test_hello_carries_profile() {
        let f = fixture(
            FakeDevice::new().respond("ro.product.brand", "xiaomi"),
            FakeUiBackend::new(UiBackendKind::RawDump),
        );
        let hello = serde_json::to_value(f.dispatcher.hello().await).unwrap();
        assert_eq!(hello["type"], "bridge_hello");
        assert_eq!(hello["info"]["brand"], "xiaomi");
        assert_eq!(hello["info"]["sims"].as_array().unwrap().len(), 2);
    }
}
