//! Dialing a USSD code with a preselected SIM slot

use tracing::{debug, warn};

use crate::adb::{shell_quote, start_activity};
use crate::device::DeviceCommands;
use crate::error::{BridgeError, Result};

/// `tel:` URI for `code`. `#` would otherwise start a URI fragment.
pub fn dial_uri(code: &str) -> String {
    format!("tel:{}", urlencoding::encode(code))
}

/// Code carried by a `tel:` URI built with [`dial_uri`].
pub fn decode_dial_uri(uri: &str) -> Option<String> {
    let encoded = uri.strip_prefix("tel:")?;
    urlencoding::decode(encoded).ok().map(|c| c.into_owned())
}

/// One way of asking the dialer to use a particular SIM.
///
/// Vendors honour different intent extras; none is universal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialVariant {
    pub name: &'static str,
    extras: &'static [&'static str],
}

const VARIANTS: &[DialVariant] = &[
    DialVariant {
        name: "generic",
        extras: &["simSlot", "slot", "slot_id"],
    },
    DialVariant {
        name: "qualcomm",
        extras: &["com.android.phone.extra.slot", "subscription", "phone"],
    },
    DialVariant {
        name: "mediatek",
        extras: &["com.android.phone.force.slot", "Subscription", "sub_id"],
    },
    DialVariant {
        name: "plain",
        extras: &[],
    },
];

impl DialVariant {
    /// Every variant, in the order they are tried.
    pub fn all() -> &'static [DialVariant] {
        VARIANTS
    }

    /// `am start` arguments placing the call from `sim`.
    pub fn am_args(&self, uri: &str, sim: u8) -> String {
        let mut args = format!("-a android.intent.action.CALL -d {}", shell_quote(uri));
        for extra in self.extras {
            args.push_str(&format!(" --ei {} {}", extra, sim));
        }
        args
    }
}

/// Dial `code` from `sim`, trying each variant until the dialer starts.
///
/// Returns the name of the variant that worked.
pub async fn dial(device: &dyn DeviceCommands, code: &str, sim: u8) -> Result<&'static str> {
    let uri = dial_uri(code);
    for variant in DialVariant::all() {
        match start_activity(device, &variant.am_args(&uri, sim)).await {
            Ok(true) => {
                debug!("dialed {} via {} extras", uri, variant.name);
                return Ok(variant.name);
            }
            Ok(false) => debug!("{} dial variant was not accepted", variant.name),
            Err(e) => warn!("{} dial variant could not be issued: {}", variant.name, e),
        }
    }
    Err(BridgeError::CommandFailed("dial failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    #[test]
    fn test_dial_uri_round_trip() {
        for code in ["*123#", "*888*1*2#", "#100#", "*#06#", "12 3"] {
            let uri = dial_uri(code);
            assert!(!uri.contains('#'), "{} leaks a fragment marker", uri);
            assert_eq!(decode_dial_uri(&uri).as_deref(), Some(code));
        }
        assert_eq!(dial_uri("*123#"), "tel:%2A123%23");
        assert_eq!(decode_dial_uri("sms:123"), None);
    }

    #[test]
    fn test_variant_args() {
        let args = DialVariant::all()[1].am_args("tel:%2A123%23", 1);
        assert_eq!(
            args,
            "-a android.intent.action.CALL -d 'tel:%2A123%23' --ei com.android.phone.extra.slot 1 --ei subscription 1 --ei phone 1"
        );
        let plain = DialVariant::all().last().unwrap();
        assert!(!plain.am_args("tel:1", 0).contains("--ei"));
    }

    #[tokio::test]
    async fn test_first_accepted_variant_wins() {
        let device = FakeDevice::new().respond("am start", "Starting: Intent { act=android.intent.action.CALL }");
        assert_eq!(dial(&device, "*123#", 1).await.unwrap(), "generic");
        let starts = device.commands_containing("am start");
        assert_eq!(starts.len(), 1);
        assert!(starts[0].contains("--ei simSlot 1"));
    }

    #[tokio::test]
    async fn test_falls_through_variants() {
        let device = FakeDevice::new()
            .fail_on("simSlot")
            .respond(
                "extra.slot",
                "Starting: Intent { act=android.intent.action.CALL }\nError: Activity not started",
            )
            .respond("force.slot", "Starting: Intent { act=android.intent.action.CALL }");
        assert_eq!(dial(&device, "*123#", 0).await.unwrap(), "mediatek");
        assert_eq!(device.commands_containing("am start").len(), 3);
    }

    #[tokio::test]
    async fn test_no_variant_accepted() {
        let device = FakeDevice::new().respond("am start", "Error: Activity not started, unable to resolve Intent");
        let err = dial(&device, "*123#", 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Command execution failed: dial failed");
        assert_eq!(device.commands_containing("am start").len(), DialVariant::all().len());
    }
}
