//! handset_bridge: remote control of an Android handset over a websocket
//!
//! This library provides:
//! - A controller link that reconnects forever and greets with a device profile
//! - Dispatch of controller requests (SMS, app launch, shell, UI lookup and clicks, USSD, screenshots)
//! - Inbox forwarding with bounded deduplication
//! - USSD automation that dials, answers the SIM chooser and captures the reply
//!
//! # Example
//!
//! ```no_run
//! use handset_bridge::{BridgeConfig, ConnectionManager, DeviceFactory, Dispatcher, MessageWatcher, ReconnectPolicy};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BridgeConfig::new().with_endpoint("ws://10.0.0.2:9000/ws");
//!     let factory = DeviceFactory::new(config.clone());
//!     let device = factory.device();
//!     let dispatcher = Dispatcher::new(factory.handlers(device.clone()).await);
//!
//!     let manager = ConnectionManager::new(
//!         &config.endpoint,
//!         ReconnectPolicy::new(config.reconnect_delay),
//!         Arc::new(dispatcher),
//!     );
//!     let watcher = MessageWatcher::new(device, manager.sender(), config.poll_interval, config.seen_capacity);
//!
//!     let cancel = manager.cancel_token();
//!     tokio::join!(manager.run(), watcher.run(cancel));
//! }
//! ```

// Core modules
pub mod error;
pub mod logging;

// Configuration module
pub mod config;

// Device backends
pub mod adb;
pub mod device;
pub mod termux;

// UI automation
pub mod ui;

// Core functionality
pub mod device_factory;
pub mod dispatcher;
pub mod profile;
pub mod protocol;
pub mod transport;
pub mod ussd;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types and functions
pub use error::{BridgeError, Result};
pub use logging::{init_logging, LogFormat};

// Config re-exports
pub use config::{
    BridgeConfig, UiBackendPreference, UssdTimingConfig, DEFAULT_ENDPOINT, DEFAULT_SEEN_CAPACITY,
    TIMING_CONFIG,
};

// Device re-exports
pub use adb::{AdbConnection, ConnectionType, DeviceInfo, Screenshot};
pub use device::{DeviceCommands, SharedDevice};
pub use device_factory::{DeviceFactory, HandsetDevice};
pub use termux::TermuxMessaging;

// UI re-exports
pub use ui::{UiAutomationBackend, UiBackendKind, UiNode, UiSelector};

// Core re-exports
pub use dispatcher::{Dispatcher, Handlers};
pub use profile::gather_device_profile;
pub use protocol::{DeviceProfile, Envelope, InboxRecord, OutboundEvent, Request, SimInfo, UssdResult};
pub use transport::{ConnectionManager, ConnectionState, EventSender, ReconnectPolicy, SessionHandler};
pub use ussd::{UssdAutomator, UssdReport, UssdState};
pub use watcher::{MessageWatcher, SeenSet};
