//! Device identity snapshot for `bridge_hello`

use tracing::debug;

use crate::adb::parse_route_src;
use crate::device::DeviceCommands;
use crate::protocol::{DeviceProfile, SimInfo};

pub const PLATFORM: &str = "termux";

/// `iphonesubinfo` transaction codes for the per-slot getters (AOSP 9 to 12).
const IMEI_FOR_SLOT: u32 = 4;
const LINE1_NUMBER_FOR_SLOT: u32 = 15;

async fn shell_value(device: &dyn DeviceCommands, cmd: &str) -> Option<String> {
    match device.shell(cmd).await {
        Ok(out) => Some(out.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            debug!("{} failed: {}", cmd, e);
            None
        }
    }
}

async fn getprop(device: &dyn DeviceCommands, key: &str) -> Option<String> {
    shell_value(device, &format!("getprop {}", key)).await
}

/// String payload of a `service call` parcel dump.
///
/// The dump shows UTF-16 text as `'.1.2.3'` columns; the dots are the
/// zero bytes.
pub fn parse_parcel_string(output: &str) -> Option<String> {
    if !output.contains("Parcel(") {
        return None;
    }
    let text: String = output
        .lines()
        .filter_map(|line| {
            let start = line.find('\'')?;
            let end = line.rfind('\'')?;
            (end > start).then(|| &line[start + 1..end])
        })
        .flat_map(str::chars)
        .filter(|c| *c != '.')
        .collect();
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

fn valid_imei(s: &str) -> bool {
    (14..=16).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

fn valid_number(s: &str) -> bool {
    let digits = s.trim_start_matches('+');
    digits.len() >= 3 && digits.chars().all(|c| c.is_ascii_digit())
}

async fn subinfo(device: &dyn DeviceCommands, code: u32, slot: u8) -> Option<String> {
    let out = shell_value(device, &format!("service call iphonesubinfo {} i32 {}", code, slot)).await?;
    parse_parcel_string(&out)
}

async fn sim_info(device: &dyn DeviceCommands, slot: u8, operators: &[String]) -> SimInfo {
    SimInfo {
        slot,
        imei: subinfo(device, IMEI_FOR_SLOT, slot).await.filter(|s| valid_imei(s)),
        operator: operators.get(slot as usize).cloned(),
        phone_number: subinfo(device, LINE1_NUMBER_FOR_SLOT, slot)
            .await
            .filter(|s| valid_number(s)),
    }
}

/// Gather what the device will tell us about itself. Nothing here fails;
/// unknown fields stay `None`.
pub async fn gather_device_profile(device: &dyn DeviceCommands) -> DeviceProfile {
    let operators: Vec<String> = getprop(device, "gsm.sim.operator.alpha")
        .await
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let local_ip = match device.shell("ip route").await {
        Ok(out) => parse_route_src(&out),
        Err(e) => {
            debug!("ip route failed: {}", e);
            None
        }
    };

    let mut sims = Vec::with_capacity(2);
    for slot in 0..2u8 {
        sims.push(sim_info(device, slot, &operators).await);
    }
    // An empty operator slot is reported as unknown, not as "".
    for sim in &mut sims {
        sim.operator = sim.operator.take().filter(|o| !o.is_empty());
    }

    DeviceProfile {
        platform: PLATFORM.to_string(),
        brand: getprop(device, "ro.product.brand").await,
        model: getprop(device, "ro.product.model").await,
        os_version: getprop(device, "ro.build.version.release").await,
        serial: getprop(device, "ro.serialno").await,
        local_ip,
        sims,
    }
}
