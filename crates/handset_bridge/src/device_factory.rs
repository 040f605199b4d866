//! Device factory: builds the concrete handset backend and the UI strategy list

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adb::{capture_png, AdbConnection};
use crate::config::{BridgeConfig, UiBackendPreference};
use crate::device::{DeviceCommands, SharedDevice};
use crate::dispatcher::Handlers;
use crate::error::Result;
use crate::termux::TermuxMessaging;
use crate::ui::{RawDumpBackend, StructuredBackend, UiAutomationBackend};
use crate::ussd::UssdAutomator;

/// The real handset: shell work over adb, messaging through Termux.
pub struct HandsetDevice {
    adb: AdbConnection,
    messaging: TermuxMessaging,
}

impl HandsetDevice {
    pub fn new(adb: AdbConnection, messaging: TermuxMessaging) -> Self {
        Self { adb, messaging }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            AdbConnection::new(config.adb_path.clone(), config.device_id.clone()),
            TermuxMessaging::new(),
        )
    }

    pub fn adb(&self) -> &AdbConnection {
        &self.adb
    }
}

#[async_trait]
impl DeviceCommands for HandsetDevice {
    async fn shell(&self, cmd: &str) -> Result<String> {
        self.adb.shell(cmd).await
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        self.adb.push(local, remote).await
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        self.adb.pull(remote, local).await
    }

    async fn capture_screenshot(&self) -> Result<Option<Vec<u8>>> {
        capture_png(&self.adb).await
    }

    async fn list_inbox_records(&self) -> Result<Vec<Value>> {
        self.messaging.list_inbox().await
    }

    async fn send_message(&self, number: &str, text: &str, sim: u8) -> Result<bool> {
        self.messaging.send_message(number, text, sim).await
    }
}

/// Factory for the device and the collaborators built around it
#[derive(Debug, Clone)]
pub struct DeviceFactory {
    config: BridgeConfig,
}

impl DeviceFactory {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The gated handset device.
    pub fn device(&self) -> SharedDevice {
        SharedDevice::new(Arc::new(HandsetDevice::from_config(&self.config)))
    }

    /// UI strategies in preference order. The raw-dump backend is always
    /// present and always last.
    pub async fn ui_strategies(&self, device: &SharedDevice) -> Vec<Arc<dyn UiAutomationBackend>> {
        let mut strategies: Vec<Arc<dyn UiAutomationBackend>> = Vec::new();
        let agent_url = self.config.agent_url.as_str();

        let use_structured = match self.config.ui_backend {
            UiBackendPreference::RawDump => false,
            UiBackendPreference::Structured => true,
            UiBackendPreference::Auto => {
                let available = StructuredBackend::is_available(agent_url).await;
                if !available {
                    info!("No uiautomator agent at {}, using raw dumps only", agent_url);
                }
                available
            }
        };

        if use_structured {
            match StructuredBackend::new(agent_url) {
                Ok(backend) => strategies.push(Arc::new(backend)),
                Err(e) => warn!("Structured UI backend unavailable: {}", e),
            }
        }
        strategies.push(Arc::new(RawDumpBackend::new(device.handle())));

        let kinds: Vec<String> = strategies.iter().map(|s| s.kind().to_string()).collect();
        info!("UI strategies: {}", kinds.join(", "));
        strategies
    }

    /// Everything the dispatcher needs, sharing one device gate.
    pub async fn handlers(&self, device: SharedDevice) -> Handlers {
        let ui = self.ui_strategies(&device).await;
        let ussd = UssdAutomator::new(ui.clone(), self.config.ussd_timing.clone());
        Handlers { device, ui, ussd }
    }
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
