//! ADB process plumbing for a single handset

use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::{duration_from_secs, TIMING_CONFIG};
use crate::error::{BridgeError, Result};

/// Type of ADB connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Remote,
}

/// Information about a connected device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }
}

/// Runs `adb` against one device (or the only attached one).
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
    device_id: Option<String>,
    timeout: Duration,
}

impl AdbConnection {
    pub fn new(adb_path: impl Into<String>, device_id: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            device_id,
            timeout: duration_from_secs(TIMING_CONFIG.connection.command_timeout),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(id) = &self.device_id {
            cmd.arg("-s").arg(id);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, what: &str) -> Result<Output> {
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                BridgeError::Timeout(format!("{} timed out after {:?}", what, self.timeout))
            })??;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no devices/emulators found")
            || (stderr.contains("device '") && stderr.contains("not found"))
        {
            return Err(BridgeError::DeviceNotFound(stderr.trim().to_string()));
        }
        Ok(output)
    }

    /// `adb shell <cmd>`, stdout and stderr combined.
    pub async fn shell(&self, cmd: &str) -> Result<String> {
        debug!("adb shell {}", cmd);
        let mut command = self.command();
        command.arg("shell").arg(cmd);
        let output = self.run(command, "adb shell").await?;

        Ok(format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ))
    }

    /// `adb exec-out <args>`, raw stdout bytes.
    pub async fn exec_out(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut command = self.command();
        command.arg("exec-out").args(args);
        let output = self.run(command, "adb exec-out").await?;
        if !output.status.success() {
            return Err(BridgeError::CommandFailed(format!(
                "exec-out {} exited with {}",
                args.join(" "),
                output.status
            )));
        }
        Ok(output.stdout)
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let mut command = self.command();
        command.arg("push").arg(local).arg(remote);
        self.checked(command, "adb push").await
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        let mut command = self.command();
        command.arg("pull").arg(remote).arg(local);
        self.checked(command, "adb pull").await
    }

    async fn checked(&self, command: Command, what: &str) -> Result<()> {
        let output = self.run(command, what).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BridgeError::CommandFailed(format!(
                "{}: {}",
                what,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// List all attached devices
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut command = Command::new(&self.adb_path);
        command.arg("devices").arg("-l").kill_on_drop(true);
        let output = self.run(command, "adb devices").await?;
        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Whether the configured device (or any device) is online.
    pub async fn is_connected(&self) -> Result<bool> {
        let devices = self.list_devices().await?;
        Ok(match &self.device_id {
            Some(id) => devices.iter().any(|d| &d.device_id == id && d.is_online()),
            None => devices.iter().any(DeviceInfo::is_online),
        })
    }

    /// Get the IP address of the device
    pub async fn get_device_ip(&self) -> Result<Option<String>> {
        let routes = self.shell("ip route").await?;
        if let Some(ip) = parse_route_src(&routes) {
            return Ok(Some(ip));
        }

        let addr = self.shell("ip addr show wlan0").await?;
        Ok(parse_inet_addr(&addr))
    }
}

fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let device_id = parts[0].to_string();
            let connection_type = if device_id.contains(':') {
                ConnectionType::Remote
            } else {
                ConnectionType::Usb
            };
            let model = parts[2..]
                .iter()
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceInfo {
                device_id,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}

/// Source address from `ip route` output.
pub fn parse_route_src(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        parts
            .iter()
            .position(|p| *p == "src")
            .and_then(|i| parts.get(i + 1))
            .map(|ip| ip.to_string())
    })
}

fn parse_inet_addr(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("inet ")?;
        let ip = rest.split(['/', ' ']).next()?;
        (!ip.is_empty()).then(|| ip.to_string())
    })
}
