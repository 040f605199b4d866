//! Controller link
//!
//! This module provides:
//! - `manager`: The websocket connection loop and its observable state
//! - `sender`: Best-effort event sending shared across tasks
//! - `reconnect`: Reconnect delay and cap

mod manager;
mod reconnect;
mod sender;

use async_trait::async_trait;

use crate::protocol::{Envelope, OutboundEvent};

pub use manager::{ConnectionManager, ConnectionState};
pub use reconnect::ReconnectPolicy;
pub use sender::EventSender;

/// What a connected session delegates to the rest of the bridge.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Greeting sent first on every new connection.
    async fn hello(&self) -> OutboundEvent;

    /// Reply to one well-formed envelope.
    async fn handle(&self, envelope: Envelope) -> Option<OutboundEvent>;
}
