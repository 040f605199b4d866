//! UI automation for dialogs the bridge has to drive without a human
//!
//! This module provides:
//! - `node`: Element, bounds and selector types
//! - `hierarchy`: Parsing and querying of `uiautomator dump` XML
//! - `structured`: Backend talking to the on-device uiautomator agent
//! - `raw_dump`: Backend that only needs a shell and `uiautomator dump`

pub mod hierarchy;
mod node;
mod raw_dump;
mod structured;

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

pub use node::{Bounds, UiNode, UiSelector};
pub use raw_dump::{RawDumpBackend, WINDOW_DUMP_PATH};
pub use structured::{StructuredBackend, DEFAULT_AGENT_URL};

/// Capability level of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiBackendKind {
    /// Element queries answered by the device-side agent.
    Structured,
    /// Heuristics over a raw hierarchy dump.
    RawDump,
}

impl fmt::Display for UiBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiBackendKind::Structured => write!(f, "structured"),
            UiBackendKind::RawDump => write!(f, "raw-dump"),
        }
    }
}

/// What the core needs from a UI automation surface.
#[async_trait]
pub trait UiAutomationBackend: Send + Sync {
    fn kind(&self) -> UiBackendKind;

    /// Current window hierarchy as uiautomator XML.
    async fn dump_hierarchy(&self) -> Result<String>;

    /// First element matching `selector`.
    async fn find(&self, selector: &UiSelector) -> Result<Option<UiNode>>;

    /// First element whose label names one of `labels` (case-insensitive).
    async fn find_by_labels(&self, labels: &[&str]) -> Result<Option<UiNode>>;

    /// Generic button elements on screen, in layout order.
    async fn buttons(&self) -> Result<Vec<UiNode>>;

    /// Activate `node`. `Ok(false)` means the node carried nothing to click on.
    async fn click(&self, node: &UiNode) -> Result<bool>;
}
