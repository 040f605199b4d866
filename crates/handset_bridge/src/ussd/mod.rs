//! USSD automation
//!
//! This module provides:
//! - `dial`: `tel:` encoding and the vendor-specific dial intents
//! - `automator`: The run state machine (dial, SIM chooser, response capture)

mod automator;
mod dial;

pub use automator::{UssdAutomator, UssdReport, UssdState};
pub use dial::{decode_dial_uri, dial, dial_uri, DialVariant};
