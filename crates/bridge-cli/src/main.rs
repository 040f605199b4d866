//! handset-bridged - keeps an Android handset connected to its controller
//!
//! Usage:
//!     handset-bridged [OPTIONS]
//!
//! Environment Variables:
//!     BRIDGE_WS: Controller websocket endpoint (default: ws://127.0.0.1:9000/ws)
//!     BRIDGE_DEVICE_ID: ADB device ID for multi-device setups
//!     BRIDGE_POLL_INTERVAL: Seconds between inbox polls (default: 3)
//!     BRIDGE_RECONNECT_DELAY: Seconds between reconnect attempts (default: 5)
//!     BRIDGE_UI_BACKEND: auto, structured or raw (default: auto)

use anyhow::Result;
use clap::Parser;
use handset_bridge::config::duration_from_secs;
use handset_bridge::ui::{StructuredBackend, DEFAULT_AGENT_URL};
use handset_bridge::{
    init_logging, AdbConnection, BridgeConfig, ConnectionManager, DeviceFactory, Dispatcher,
    LogFormat, MessageWatcher, ReconnectPolicy, UiBackendPreference, DEFAULT_ENDPOINT,
    DEFAULT_SEEN_CAPACITY,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Handset bridge - remote control of an Android handset over a websocket
#[derive(Parser, Debug)]
#[command(name = "handset-bridged")]
#[command(about = "Handset bridge - remote control of an Android handset over a websocket")]
#[command(after_help = r#"Examples:
    # Connect to the default controller endpoint
    handset-bridged

    # Use a specific controller and device
    handset-bridged --endpoint ws://10.0.0.2:9000/ws --device-id emulator-5554

    # Check requirements and exit
    handset-bridged --check

    # List connected devices
    handset-bridged --list-devices

    # Only use uiautomator dumps, log JSON to a file
    handset-bridged --ui-backend raw --log-format json --log-file bridge.log
"#)]
struct Cli {
    // Controller options
    /// Controller websocket endpoint
    #[arg(long, env = "BRIDGE_WS", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Seconds between reconnect attempts
    #[arg(long, env = "BRIDGE_RECONNECT_DELAY", allow_negative_numbers = true)]
    reconnect_delay: Option<f64>,

    /// Give up after this many consecutive failed connects (default: never)
    #[arg(long, env = "BRIDGE_MAX_RECONNECTS")]
    max_reconnects: Option<u32>,

    // Device options
    /// ADB device ID
    #[arg(short = 'd', long, env = "BRIDGE_DEVICE_ID")]
    device_id: Option<String>,

    /// Path to the adb executable
    #[arg(long, env = "BRIDGE_ADB_PATH", default_value = "adb")]
    adb_path: String,

    /// List connected devices and exit
    #[arg(long)]
    list_devices: bool,

    // Inbox options
    /// Seconds between inbox polls
    #[arg(long, env = "BRIDGE_POLL_INTERVAL", allow_negative_numbers = true)]
    poll_interval: Option<f64>,

    /// Number of forwarded message ids to remember
    #[arg(long, env = "BRIDGE_SEEN_CAPACITY", default_value_t = DEFAULT_SEEN_CAPACITY)]
    seen_capacity: usize,

    // UI automation options
    /// UI automation backend
    #[arg(long, env = "BRIDGE_UI_BACKEND", default_value = "auto", value_parser = ["auto", "structured", "raw"])]
    ui_backend: String,

    /// Base URL of the on-device uiautomator agent
    #[arg(long, env = "BRIDGE_AGENT_URL", default_value = DEFAULT_AGENT_URL)]
    agent_url: String,

    // Other options
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Log output format
    #[arg(long, env = "BRIDGE_LOG_FORMAT", default_value = "text", value_parser = ["text", "json"])]
    log_format: String,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "BRIDGE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Run the requirement checks and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn verbosity(&self) -> u8 {
        if self.quiet {
            1
        } else {
            self.verbose.saturating_add(2)
        }
    }

    fn to_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::new()
            .with_endpoint(self.endpoint.clone())
            .with_adb_path(self.adb_path.clone())
            .with_max_reconnects(self.max_reconnects)
            .with_seen_capacity(self.seen_capacity)
            .with_ui_backend(UiBackendPreference::from_name(&self.ui_backend))
            .with_agent_url(self.agent_url.clone());
        if let Some(device_id) = &self.device_id {
            config = config.with_device_id(device_id.clone());
        }
        if let Some(secs) = self.reconnect_delay.filter(|s| s.is_finite() && *s > 0.0) {
            config = config.with_reconnect_delay(duration_from_secs(secs));
        }
        if let Some(secs) = self.poll_interval.filter(|s| s.is_finite() && *s > 0.0) {
            config = config.with_poll_interval(duration_from_secs(secs));
        }
        config
    }
}

/// Check system requirements before starting the bridge
async fn check_system_requirements(config: &BridgeConfig) -> bool {
    println!("\u{1F50D} Checking system requirements...");
    println!("{}", "-".repeat(50));

    // Check 1: adb installed
    print!("1. Checking ADB installation... ");
    io::stdout().flush().ok();

    if which::which(&config.adb_path).is_err() {
        println!("\u{274C} FAILED");
        println!("   Error: {} is not installed or not in PATH.", config.adb_path);
        println!("   Solution:");
        println!("     - Termux: pkg install android-tools");
        println!("     - Linux: sudo apt install android-tools-adb");
        println!("{}", "-".repeat(50));
        println!("\u{274C} System check failed. Please fix the issues above.");
        return false;
    }

    let version = tokio::time::timeout(
        Duration::from_secs(10),
        Command::new(&config.adb_path).arg("version").output(),
    )
    .await;
    match version {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let line = stdout.lines().next().filter(|l| !l.is_empty()).unwrap_or("installed");
            println!("\u{2705} OK ({})", line);
        }
        Ok(_) => {
            println!("\u{274C} FAILED");
            println!("   Error: adb command failed to run.");
            return false;
        }
        Err(_) => {
            println!("\u{274C} FAILED");
            println!("   Error: adb command timed out.");
            return false;
        }
    }

    // Check 2: device reachable
    print!("2. Checking connected devices... ");
    io::stdout().flush().ok();

    let conn = AdbConnection::new(config.adb_path.clone(), None);
    match conn.list_devices().await {
        Ok(devices) => {
            let online: Vec<String> = devices
                .into_iter()
                .filter(|d| d.is_online())
                .map(|d| d.device_id)
                .collect();
            let reachable = match &config.device_id {
                Some(id) => online.iter().any(|d| d == id),
                None => !online.is_empty(),
            };
            if reachable {
                println!("\u{2705} OK ({} device(s): {})", online.len(), online.join(", "));
                let target = AdbConnection::new(config.adb_path.clone(), config.device_id.clone());
                if let Ok(Some(ip)) = target.get_device_ip().await {
                    println!("   Device IP: {}", ip);
                }
            } else {
                println!("\u{274C} FAILED");
                match &config.device_id {
                    Some(id) => println!("   Error: Device {} is not connected.", id),
                    None => println!("   Error: No devices connected."),
                }
                println!("   Solution:");
                println!("     1. Enable wireless debugging on the handset");
                println!("     2. Pair and connect: adb connect 127.0.0.1:<port>");
                println!("{}", "-".repeat(50));
                println!("\u{274C} System check failed. Please fix the issues above.");
                return false;
            }
        }
        Err(e) => {
            println!("\u{274C} FAILED");
            println!("   Error: {}", e);
            return false;
        }
    }

    // Check 3: Termux:API messaging (warning only)
    print!("3. Checking Termux:API messaging... ");
    io::stdout().flush().ok();

    if which::which("termux-sms-list").is_ok() {
        println!("\u{2705} OK");
    } else {
        println!("\u{26A0}\u{FE0F}  WARNING");
        println!("   termux-sms-list not found; inbox forwarding and SMS sending will fail.");
        println!("   Solution: pkg install termux-api");
    }

    // Check 4: uiautomator agent (informational)
    print!("4. Checking uiautomator agent ({})... ", config.agent_url);
    io::stdout().flush().ok();

    if StructuredBackend::is_available(&config.agent_url).await {
        println!("\u{2705} OK");
    } else {
        println!("\u{2796} not running (raw dumps will be used)");
    }

    println!("{}", "-".repeat(50));
    println!("\u{2705} All system checks passed!\n");
    true
}

/// Handle --list-devices
async fn list_devices(config: &BridgeConfig) -> Result<()> {
    let conn = AdbConnection::new(config.adb_path.clone(), None);
    let devices = conn.list_devices().await?;
    if devices.is_empty() {
        println!("No devices connected.");
        return Ok(());
    }

    println!("Connected devices:");
    println!("{}", "-".repeat(60));
    for device in devices {
        let status_icon = if device.is_online() { "\u{2713}" } else { "\u{2717}" };
        let model_info = device
            .model
            .map(|m| format!(" ({})", m))
            .unwrap_or_default();
        println!(
            "  {} {:<30} [{:?}]{}",
            status_icon, device.device_id, device.connection_type, model_info
        );
    }
    Ok(())
}

async fn run_bridge(config: BridgeConfig) -> Result<()> {
    let factory = DeviceFactory::new(config.clone());
    let device = factory.device();
    let dispatcher = Dispatcher::new(factory.handlers(device.clone()).await);

    let cancel = CancellationToken::new();
    let policy = ReconnectPolicy::new(config.reconnect_delay).with_max_attempts(config.max_reconnects);
    let manager = ConnectionManager::new(config.endpoint.clone(), policy, Arc::new(dispatcher))
        .with_cancel_token(cancel.clone());
    let watcher = MessageWatcher::new(
        device,
        manager.sender(),
        config.poll_interval,
        config.seen_capacity,
    );

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
            }
        }
    });

    let watcher_task = tokio::spawn(watcher.run(cancel.clone()));
    info!("Bridging to {}", config.endpoint);
    manager.run().await;

    // The manager also returns when its reconnect cap is reached.
    cancel.cancel();
    watcher_task.await?;
    info!("Bridge stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(
        cli.verbosity(),
        cli.log_file.as_deref(),
        LogFormat::from_name(&cli.log_format),
    )?;
    let config = cli.to_config();

    if cli.list_devices {
        return list_devices(&config).await;
    }

    let ready = check_system_requirements(&config).await;
    match after_checks(cli.check, ready) {
        Startup::Exit(code) => std::process::exit(code),
        Startup::Run => {
            if !ready {
                warn!("Requirement checks failed; starting anyway and retrying device commands");
            }
            run_bridge(config).await
        }
    }
}

/// What happens once the requirement checks have run.
#[derive(Debug, PartialEq, Eq)]
enum Startup {
    Exit(i32),
    Run,
}

/// `--check` reports and exits. Otherwise the bridge always starts: a
/// missing device is retried by the loops, never fatal.
fn after_checks(check_only: bool, ready: bool) -> Startup {
    match (check_only, ready) {
        (true, true) => Startup::Exit(0),
        (true, false) => Startup::Exit(1),
        (false, _) => Startup::Run,
    }
}
