//! Device control helpers for Android automation

use tracing::debug;

use crate::device::DeviceCommands;
use crate::error::Result;

/// Quote `s` for the device's `sh`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Whether `am start` output reports that the activity was launched.
pub fn activity_started(output: &str) -> bool {
    output.contains("Starting:") && !output.contains("Error:") && !output.contains("Exception")
}

/// Tap at the specified coordinates
pub async fn tap(device: &dyn DeviceCommands, x: i32, y: i32) -> Result<()> {
    device.shell(&format!("input tap {} {}", x, y)).await?;
    Ok(())
}

/// Launch a package through its launcher activity.
///
/// Returns `false` when the package has no launchable activity.
pub async fn launch_package(device: &dyn DeviceCommands, package: &str) -> Result<bool> {
    let output = device
        .shell(&format!(
            "monkey -p {} -c android.intent.category.LAUNCHER 1",
            shell_quote(package)
        ))
        .await?;
    debug!("monkey output for {}: {}", package, output.trim());

    let failed = output.contains("No activities found")
        || output.contains("monkey aborted")
        || output.contains("Error");
    Ok(!failed)
}

/// Run `am start` with the given arguments.
pub async fn start_activity(device: &dyn DeviceCommands, args: &str) -> Result<bool> {
    let output = device.shell(&format!("am start {}", args)).await?;
    debug!("am start {} -> {}", args, output.trim());
    Ok(activity_started(&output))
}
