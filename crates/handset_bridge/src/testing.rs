//! Scripted stand-ins for the handset and the UI automation surface

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::device::DeviceCommands;
use crate::error::{BridgeError, Result};
use crate::ui::{hierarchy, UiAutomationBackend, UiBackendKind, UiNode, UiSelector};

/// Device whose shell answers from a table of substring patterns.
///
/// The first pattern contained in a command wins; unmatched commands
/// return empty output.
pub struct FakeDevice {
    responses: Vec<(String, String)>,
    failing: Vec<String>,
    files: HashMap<String, String>,
    commands: Mutex<Vec<String>>,
    inbox: Mutex<Option<Vec<Value>>>,
    send_outcome: Mutex<Option<bool>>,
    sent: Mutex<Vec<(String, String, u8)>>,
    screenshot: Option<Vec<u8>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            failing: Vec::new(),
            files: HashMap::new(),
            commands: Mutex::new(Vec::new()),
            inbox: Mutex::new(Some(Vec::new())),
            send_outcome: Mutex::new(Some(true)),
            sent: Mutex::new(Vec::new()),
            screenshot: None,
        }
    }

    pub fn respond(mut self, pattern: &str, output: &str) -> Self {
        self.responses.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Shell commands containing `pattern` return an error.
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    /// Contents served by `pull` for `remote`.
    pub fn with_file(mut self, remote: &str, contents: &str) -> Self {
        self.files.insert(remote.to_string(), contents.to_string());
        self
    }

    pub fn with_inbox(self, records: Vec<Value>) -> Self {
        self.set_inbox(records);
        self
    }

    /// `Some(ok)` is returned from `send_message`; `None` makes it error.
    pub fn with_send_outcome(self, outcome: Option<bool>) -> Self {
        *self.send_outcome.lock().unwrap() = outcome;
        self
    }

    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    pub fn set_inbox(&self, records: Vec<Value>) {
        *self.inbox.lock().unwrap() = Some(records);
    }

    pub fn fail_inbox(&self) {
        *self.inbox.lock().unwrap() = None;
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn commands_containing(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<(String, String, u8)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceCommands for FakeDevice {
    async fn shell(&self, cmd: &str) -> Result<String> {
        self.commands.lock().unwrap().push(cmd.to_string());
        if self.failing.iter().any(|p| cmd.contains(p.as_str())) {
            return Err(BridgeError::CommandFailed(format!("scripted failure: {}", cmd)));
        }
        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("push {} {}", local.display(), remote));
        Ok(())
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        match self.files.get(remote) {
            Some(contents) => Ok(std::fs::write(local, contents)?),
            None => Err(BridgeError::CommandFailed(format!("no such file: {}", remote))),
        }
    }

    async fn capture_screenshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.screenshot.clone())
    }

    async fn list_inbox_records(&self) -> Result<Vec<Value>> {
        self.inbox
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::CommandFailed("inbox unavailable".to_string()))
    }

    async fn send_message(&self, number: &str, text: &str, sim: u8) -> Result<bool> {
        self.sent
            .lock()
            .unwrap()
            .push((number.to_string(), text.to_string(), sim));
        let outcome = *self.send_outcome.lock().unwrap();
        outcome.ok_or_else(|| BridgeError::CommandFailed("messaging unavailable".to_string()))
    }
}

/// UI surface showing a fixed set of nodes.
///
/// The nodes only become visible once `find_by_labels` has been asked more
/// than `hidden_for` times, which models a dialog that renders late.
pub struct FakeUiBackend {
    kind: UiBackendKind,
    nodes: Vec<UiNode>,
    dump: String,
    hidden_for: usize,
    failing: bool,
    label_queries: AtomicUsize,
    clicks: Mutex<Vec<UiNode>>,
}

impl FakeUiBackend {
    pub fn new(kind: UiBackendKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            dump: String::new(),
            hidden_for: 0,
            failing: false,
            label_queries: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<UiNode>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Hierarchy returned by `dump_hierarchy`; its nodes are also what
    /// the queries see.
    pub fn with_dump(mut self, xml: &str) -> Self {
        self.nodes = hierarchy::parse_hierarchy(xml);
        self.dump = xml.to_string();
        self
    }

    pub fn hidden_for(mut self, queries: usize) -> Self {
        self.hidden_for = queries;
        self
    }

    /// Every call errors.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn clicks(&self) -> Vec<UiNode> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn label_queries(&self) -> usize {
        self.label_queries.load(Ordering::SeqCst)
    }

    fn visible(&self) -> bool {
        self.label_queries() > self.hidden_for
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            Err(BridgeError::Automation(format!("{} backend unavailable", self.kind)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UiAutomationBackend for FakeUiBackend {
    fn kind(&self) -> UiBackendKind {
        self.kind
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        self.check()?;
        Ok(self.dump.clone())
    }

    async fn find(&self, selector: &UiSelector) -> Result<Option<UiNode>> {
        self.check()?;
        Ok(hierarchy::search(&self.nodes, selector).cloned())
    }

    async fn find_by_labels(&self, labels: &[&str]) -> Result<Option<UiNode>> {
        self.label_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if !self.visible() {
            return Ok(None);
        }
        Ok(hierarchy::best_label_match(&self.nodes, labels))
    }

    async fn buttons(&self) -> Result<Vec<UiNode>> {
        self.check()?;
        if !self.visible() {
            return Ok(Vec::new());
        }
        Ok(hierarchy::buttons(&self.nodes))
    }

    async fn click(&self, node: &UiNode) -> Result<bool> {
        self.check()?;
        self.clicks.lock().unwrap().push(node.clone());
        Ok(node.bounds.is_some() || node.resource_id.is_some())
    }
}

/// A labelled button node with bounds.
pub fn button(label: &str, top: i32) -> UiNode {
    UiNode {
        class_name: Some("android.widget.Button".to_string()),
        text: Some(label.to_string()),
        bounds: crate::ui::Bounds::parse(&format!("[0,{}][400,{}]", top, top + 100)),
        clickable: true,
        ..Default::default()
    }
}
