//! Inbox forwarding
//!
//! Polls the device inbox on a fixed interval and pushes every record it
//! has not seen before as a `message_received` event.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::SharedDevice;
use crate::protocol::{InboxRecord, OutboundEvent};
use crate::transport::EventSender;

/// Identifiers already forwarded, bounded by a ceiling.
///
/// Eviction drops the oldest insertions first.
#[derive(Debug)]
pub struct SeenSet {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Returns false when `id` was already present.
    pub fn insert(&mut self, id: String) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct MessageWatcher {
    device: SharedDevice,
    sender: EventSender,
    interval: Duration,
    seen: SeenSet,
}

impl MessageWatcher {
    pub fn new(device: SharedDevice, sender: EventSender, interval: Duration, capacity: usize) -> Self {
        Self {
            device,
            sender,
            interval,
            seen: SeenSet::new(capacity),
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// One poll cycle. Returns the records emitted, oldest first.
    pub async fn poll_once(&mut self) -> Vec<InboxRecord> {
        let listing = {
            let device = self.device.lock().await;
            device.list_inbox_records().await
        };
        let raw = match listing {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Inbox listing failed, skipping cycle: {}", e);
                return Vec::new();
            }
        };

        let mut batch = HashSet::new();
        let mut fresh: Vec<InboxRecord> = raw
            .into_iter()
            .map(InboxRecord::from_raw)
            .filter(|record| !self.seen.contains(&record.id) && batch.insert(record.id.clone()))
            .collect();
        oldest_first(&mut fresh);

        for record in &fresh {
            self.sender.send(OutboundEvent::message_received(record));
            self.seen.insert(record.id.clone());
        }
        if !fresh.is_empty() {
            info!("Forwarded {} new inbox record(s)", fresh.len());
        }
        fresh
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Watching inbox every {:?}", self.interval);
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.poll_once().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Inbox watcher stopped");
    }
}

/// Listings come newest first. Sort by timestamp only when every record
/// has one, otherwise trust the reversed listing order.
fn oldest_first(records: &mut Vec<InboxRecord>) {
    records.reverse();
    let stamps: Option<Vec<i64>> = records.iter().map(InboxRecord::timestamp_millis).collect();
    if let Some(stamps) = stamps {
        let mut keyed: Vec<(i64, InboxRecord)> = stamps.into_iter().zip(records.drain(..)).collect();
        keyed.sort_by_key(|(stamp, _)| *stamp);
        records.extend(keyed.into_iter().map(|(_, record)| record));
    }
}
