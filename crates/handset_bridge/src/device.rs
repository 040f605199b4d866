//! Device command interface consumed by the bridge core
//!
//! The core never talks to `adb` or Termux directly; it goes through
//! [`DeviceCommands`]. [`SharedDevice`] adds the single-owner gate so the
//! receive loop and the inbox poller never interleave commands on the same
//! handset session.

use async_trait::async_trait;
use serde_json::Value;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Result;

/// Commands the handset can execute. Every call is best effort: callers
/// decide whether an `Err` is worth more than a log line.
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    /// Run a shell command and return its combined output.
    async fn shell(&self, cmd: &str) -> Result<String>;

    /// Copy a local file onto the device.
    async fn push(&self, local: &Path, remote: &str) -> Result<()>;

    /// Copy a device file to the local filesystem.
    async fn pull(&self, remote: &str, local: &Path) -> Result<()>;

    /// PNG bytes of the current screen, `None` when the screen refuses capture.
    async fn capture_screenshot(&self) -> Result<Option<Vec<u8>>>;

    /// Raw inbox records as reported by the messaging backend.
    async fn list_inbox_records(&self) -> Result<Vec<Value>>;

    /// Send a text message from the given SIM slot.
    async fn send_message(&self, number: &str, text: &str, sim: u8) -> Result<bool>;
}

/// Cloneable handle to a device plus the gate serialising access to it.
#[derive(Clone)]
pub struct SharedDevice {
    device: Arc<dyn DeviceCommands>,
    gate: Arc<Mutex<()>>,
}

impl SharedDevice {
    pub fn new(device: Arc<dyn DeviceCommands>) -> Self {
        Self {
            device,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Wait for exclusive use of the device.
    pub async fn lock(&self) -> DeviceGuard<'_> {
        DeviceGuard {
            _permit: self.gate.lock().await,
            device: self.device.clone(),
        }
    }

    /// Ungated handle, for collaborators that only run while a
    /// [`DeviceGuard`] is held by their caller.
    pub fn handle(&self) -> Arc<dyn DeviceCommands> {
        self.device.clone()
    }

    /// Whether someone currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Exclusive access to the device for as long as it lives.
pub struct DeviceGuard<'a> {
    _permit: MutexGuard<'a, ()>,
    device: Arc<dyn DeviceCommands>,
}

impl Deref for DeviceGuard<'_> {
    type Target = dyn DeviceCommands;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}
