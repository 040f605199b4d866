//! ADB (Android Debug Bridge) module for Android device control
//!
//! This module provides:
//! - `connection`: ADB process plumbing (shell, exec-out, push/pull, device listing)
//! - `device`: Device control operations (tap, app launch, activity start)
//! - `screenshot`: Screenshot capture and encoding

mod connection;
mod device;
mod screenshot;

pub use connection::{parse_route_src, AdbConnection, ConnectionType, DeviceInfo};
pub use device::{activity_started, launch_package, shell_quote, start_activity, tap};
pub use screenshot::{capture_png, encode_screenshot, Screenshot};

#[cfg(test)]
pub(crate) use screenshot::solid_png;
