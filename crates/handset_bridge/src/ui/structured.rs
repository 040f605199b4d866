//! Backend talking JSON-RPC to the on-device uiautomator agent
//!
//! The agent (atx-agent / uiautomator2 server) answers element queries
//! directly, so no hierarchy dump is needed for lookups or clicks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::node::{Bounds, UiNode, UiSelector};
use super::{UiAutomationBackend, UiBackendKind};
use crate::error::{BridgeError, Result};

pub const DEFAULT_AGENT_URL: &str = "http://127.0.0.1:7912";

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(2);
const RPC_TIMEOUT: Duration = Duration::from_secs(20);
/// Upper bound on `buttons()`; SIM choosers never show more than a handful.
const MAX_BUTTONS: u32 = 6;

// Selector field bits understood by the agent.
const MASK_TEXT_CONTAINS: u32 = 0x02;
const MASK_TEXT_MATCHES: u32 = 0x04;
const MASK_CLASS_NAME: u32 = 0x10;
const MASK_RESOURCE_ID: u32 = 0x20_0000;
const MASK_INSTANCE: u32 = 0x100_0000;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentSelector {
    mask: u32,
    child_or_sibling: Vec<Value>,
    child_or_sibling_selector: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_matches: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<u32>,
}

impl AgentSelector {
    fn text_contains(text: &str) -> Self {
        Self {
            mask: MASK_TEXT_CONTAINS,
            text_contains: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Case-insensitive containment, quoted so labels are matched literally.
    fn label(label: &str) -> Self {
        Self {
            mask: MASK_TEXT_MATCHES,
            text_matches: Some(format!("(?is).*\\Q{}\\E.*", label)),
            ..Default::default()
        }
    }

    fn resource_id(id: &str) -> Self {
        Self {
            mask: MASK_RESOURCE_ID,
            resource_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn button(instance: u32) -> Self {
        Self {
            mask: MASK_CLASS_NAME | MASK_INSTANCE,
            class_name: Some("android.widget.Button".to_string()),
            instance: Some(instance),
            ..Default::default()
        }
    }

    fn from_ui(selector: &UiSelector) -> Self {
        match selector {
            UiSelector::Text(text) => Self::text_contains(text),
            UiSelector::ResourceId(id) => Self::resource_id(id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentObjInfo {
    #[serde(default)]
    bounds: Option<Bounds>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    content_description: Option<String>,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    clickable: bool,
}

impl From<AgentObjInfo> for UiNode {
    fn from(info: AgentObjInfo) -> Self {
        UiNode {
            class_name: info.class_name,
            text: info.text,
            resource_id: info.resource_name,
            content_desc: info.content_description,
            package: info.package_name,
            bounds: info.bounds,
            clickable: info.clickable,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

pub struct StructuredBackend {
    client: reqwest::Client,
    base_url: String,
    next_id: AtomicU64,
}

impl StructuredBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Whether an agent answers at `base_url`.
    pub async fn is_available(base_url: &str) -> bool {
        let url = format!("{}/version", base_url.trim_end_matches('/'));
        let client = match reqwest::Client::builder().timeout(AVAILABILITY_TIMEOUT).build() {
            Ok(c) => c,
            Err(_) => return false,
        };
        match client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("uiautomator agent check at {} failed: {}", url, e);
                false
            }
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(format!("{}/jsonrpc/0", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Automation(format!(
                "agent returned HTTP {} for {}: {}",
                status, method, text
            )));
        }

        let reply: RpcResponse = response.json().await?;
        if let Some(err) = reply.error {
            return Err(BridgeError::Automation(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    async fn object(&self, selector: &AgentSelector) -> Result<Option<UiNode>> {
        let exists = self.rpc("exist", json!([selector])).await?;
        if !exists.as_bool().unwrap_or(false) {
            return Ok(None);
        }
        let info: AgentObjInfo = serde_json::from_value(self.rpc("objInfo", json!([selector])).await?)?;
        Ok(Some(info.into()))
    }
}

#[async_trait]
impl UiAutomationBackend for StructuredBackend {
    fn kind(&self) -> UiBackendKind {
        UiBackendKind::Structured
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        match self.rpc("dumpWindowHierarchy", json!([false])).await? {
            Value::String(xml) => Ok(xml),
            other => Err(BridgeError::Automation(format!(
                "unexpected hierarchy payload: {}",
                other
            ))),
        }
    }

    async fn find(&self, selector: &UiSelector) -> Result<Option<UiNode>> {
        self.object(&AgentSelector::from_ui(selector)).await
    }

    async fn find_by_labels(&self, labels: &[&str]) -> Result<Option<UiNode>> {
        for label in labels {
            if let Some(node) = self.object(&AgentSelector::label(label)).await? {
                debug!("agent matched label {:?}", label);
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    async fn buttons(&self) -> Result<Vec<UiNode>> {
        let mut found = Vec::new();
        for instance in 0..MAX_BUTTONS {
            match self.object(&AgentSelector::button(instance)).await? {
                Some(node) => found.push(node),
                None => break,
            }
        }
        Ok(found)
    }

    async fn click(&self, node: &UiNode) -> Result<bool> {
        let clicked = if let Some((x, y)) = node.center() {
            self.rpc("click", json!([x, y])).await?
        } else if let Some(id) = node.resource_id.as_deref().filter(|id| !id.is_empty()) {
            self.rpc("click", json!([AgentSelector::resource_id(id)])).await?
        } else {
            return Ok(false);
        };
        // Coordinate clicks answer with null on some agent versions.
        Ok(clicked.as_bool().unwrap_or(true))
    }
}
