//! Backend that only needs a shell: `uiautomator dump` plus `input tap`

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::hierarchy::{self, parse_hierarchy};
use super::node::{UiNode, UiSelector};
use super::{UiAutomationBackend, UiBackendKind};
use crate::adb::tap;
use crate::device::DeviceCommands;
use crate::error::{BridgeError, Result};

/// Where `uiautomator dump` writes on the device.
pub const WINDOW_DUMP_PATH: &str = "/sdcard/window_dump.xml";

pub struct RawDumpBackend {
    device: Arc<dyn DeviceCommands>,
}

impl RawDumpBackend {
    pub fn new(device: Arc<dyn DeviceCommands>) -> Self {
        Self { device }
    }

    async fn read_dump_file(&self) -> Result<String> {
        let inline = self.device.shell(&format!("cat {}", WINDOW_DUMP_PATH)).await?;
        if inline.contains("<hierarchy") {
            return Ok(inline);
        }

        // Some shells refuse to cat from /sdcard; pulling still works there.
        debug!("cat of UI dump returned no hierarchy, pulling the file instead");
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("window_dump.xml");
        self.device.pull(WINDOW_DUMP_PATH, &local).await?;
        Ok(tokio::fs::read_to_string(&local).await?)
    }

    async fn nodes(&self) -> Result<Vec<UiNode>> {
        Ok(parse_hierarchy(&self.dump_hierarchy().await?))
    }
}

#[async_trait]
impl UiAutomationBackend for RawDumpBackend {
    fn kind(&self) -> UiBackendKind {
        UiBackendKind::RawDump
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        let output = self
            .device
            .shell(&format!("uiautomator dump {}", WINDOW_DUMP_PATH))
            .await?;
        if output.contains("ERROR") {
            warn!("uiautomator dump reported: {}", output.trim());
        }

        let xml = self.read_dump_file().await.unwrap_or_else(|e| {
            debug!("Failed to read UI dump: {}", e);
            String::new()
        });
        if !xml.contains("<hierarchy") {
            return Err(BridgeError::Automation(format!(
                "no UI hierarchy available: {}",
                output.trim()
            )));
        }
        Ok(xml)
    }

    async fn find(&self, selector: &UiSelector) -> Result<Option<UiNode>> {
        let nodes = self.nodes().await?;
        Ok(hierarchy::search(&nodes, selector).cloned())
    }

    async fn find_by_labels(&self, labels: &[&str]) -> Result<Option<UiNode>> {
        let nodes = self.nodes().await?;
        Ok(hierarchy::best_label_match(&nodes, labels))
    }

    async fn buttons(&self) -> Result<Vec<UiNode>> {
        let nodes = self.nodes().await?;
        Ok(hierarchy::buttons(&nodes))
    }

    async fn click(&self, node: &UiNode) -> Result<bool> {
        match node.center() {
            Some((x, y)) => {
                tap(self.device.as_ref(), x, y).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
