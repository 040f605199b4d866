//! Best-effort outbound path shared by the dispatcher and the watcher

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::OutboundEvent;

/// Cloneable handle for pushing events to whatever connection is live.
///
/// Sending never fails loudly: with no connection the event is dropped.
#[derive(Clone, Default)]
pub struct EventSender {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<OutboundEvent>>>>,
}

impl EventSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender wired straight to a receiver, without any connection.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Self::new();
        sender.attach(tx);
        (sender, rx)
    }

    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<OutboundEvent>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tx);
        }
    }

    pub(crate) fn detach(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.take();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().map(|tx| !tx.is_closed()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Queue `event` for the live connection. Returns whether it was queued.
    pub fn send(&self, event: OutboundEvent) -> bool {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(_) => return false,
        };
        match slot.as_ref() {
            Some(tx) => match tx.send(event) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Dropping {} event, connection closed", e.0.kind);
                    false
                }
            },
            None => {
                debug!("Dropping {} event while disconnected", event.kind);
                false
            }
        }
    }
}
