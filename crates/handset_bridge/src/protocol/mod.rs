//! Control protocol spoken with the controller
//!
//! This module provides:
//! - `envelope`: Inbound envelope parsing and outbound event construction
//! - `request`: The closed set of actions, with typed parameters
//! - `model`: Device profile, inbox record and USSD result types

mod envelope;
mod model;
mod request;

pub use envelope::{Envelope, OutboundEvent};
pub use model::{DeviceProfile, InboxRecord, SimInfo, UssdResult};
pub use request::Request;
