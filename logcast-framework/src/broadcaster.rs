//! Viewer registry and fan-out.
//!
//! Every connected viewer is represented by the sending half of an unbounded
//! channel; the transport owns the receiving half and forwards messages to the
//! socket. The registry and the delivered watermark share one lock, so a
//! snapshot and a broadcast never interleave: a viewer sees each line either
//! in its `initialLines` snapshot or in a later `newLine` batch, never both.

use crate::{
    provider::{Delta, LineFormatter},
    wire::WireMessage,
};
use anyhow::Result;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// outbound half of a viewer connection, carrying serialized wire messages
pub type ViewerSender = mpsc::UnboundedSender<Arc<str>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(Uuid);

impl ViewerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the trailing window sent to newly connected viewers.
pub trait SnapshotSource: Send + Sync {
    /// Up to `max_lines` complete lines ending at or before byte `end`
    /// (the current end of file when `None`), oldest first.
    fn snapshot_lines(&self, end: Option<u64>, max_lines: usize) -> Result<Vec<String>>;
}

/// a single viewer could not be reached during a broadcast
#[derive(Debug, Error)]
#[error("viewer {viewer} is no longer reachable")]
pub struct DeliveryError {
    pub viewer: ViewerId,
}

/// outcome of one broadcast
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// viewers whose connection was already closed
    pub skipped: usize,
    /// viewers that closed between the liveness check and the send
    pub failures: Vec<DeliveryError>,
}

struct Registry {
    viewers: HashMap<ViewerId, ViewerSender>,
    /// byte offset up to which lines have been broadcast
    watermark: Option<u64>,
}

pub struct Broadcaster {
    registry: Mutex<Registry>,
    source: Arc<dyn SnapshotSource>,
    formatter: Arc<dyn LineFormatter>,
    snapshot_size: usize,
}

impl Broadcaster {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        formatter: Arc<dyn LineFormatter>,
        snapshot_size: usize,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry {
                viewers: HashMap::new(),
                watermark: None,
            }),
            source,
            formatter,
            snapshot_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a viewer and send it the snapshot of the last lines.
    ///
    /// Nothing is sent when the file holds fewer than `snapshot_size` complete
    /// lines. A failing snapshot is logged and the viewer is registered anyway,
    /// it will still receive new lines.
    pub fn register(&self, sender: ViewerSender) -> ViewerId {
        let id = ViewerId::new();
        let mut registry = self.lock();

        match self.snapshot_message(registry.watermark) {
            Ok(Some(message)) => {
                log::debug!(
                    "Broadcaster: Sending {} snapshot lines to viewer {}",
                    message.lines().len(),
                    id
                );
                match message.to_json() {
                    Ok(json) => {
                        if sender.send(Arc::from(json)).is_err() {
                            log::debug!("Broadcaster: Viewer {} closed before its snapshot", id);
                        }
                    }
                    Err(e) => log::error!("Failed to encode snapshot: {}", e),
                }
            }
            Ok(None) => {
                log::debug!(
                    "Broadcaster: Fewer than {} lines available, no snapshot for viewer {}",
                    self.snapshot_size,
                    id
                );
            }
            Err(e) => log::error!("Failed to read snapshot for viewer {}: {:#}", id, e),
        }

        registry.viewers.insert(id, sender);
        log::info!(
            "Viewer {} connected ({} connected)",
            id,
            registry.viewers.len()
        );
        id
    }

    /// Remove a viewer. Returns false when it was not registered.
    pub fn deregister(&self, id: ViewerId) -> bool {
        let mut registry = self.lock();
        let removed = registry.viewers.remove(&id).is_some();
        if removed {
            log::info!(
                "Viewer {} disconnected ({} connected)",
                id,
                registry.viewers.len()
            );
        }
        removed
    }

    pub fn viewer_count(&self) -> usize {
        self.lock().viewers.len()
    }

    /// Deliver `entries` as one `newLine` message, in the order given, to every
    /// open viewer.
    pub fn broadcast(&self, entries: Vec<String>) -> BroadcastReport {
        let mut registry = self.lock();
        Self::send_to_all(&mut registry, WireMessage::NewLine { lines: entries })
    }

    /// Format a delta, broadcast it most-recent first and move the watermark
    /// to the delta's offset.
    pub fn publish(&self, delta: &Delta) -> BroadcastReport {
        let mut registry = self.lock();
        registry.watermark = Some(delta.offset);
        if delta.lines.is_empty() {
            return BroadcastReport::default();
        }

        let entries = self.formatter.format_batch(&delta.lines);
        Self::send_to_all(&mut registry, WireMessage::new_lines(entries))
    }

    /// Set the offset up to which viewers are considered up to date.
    pub fn set_watermark(&self, offset: Option<u64>) {
        self.lock().watermark = offset;
    }

    fn snapshot_message(&self, watermark: Option<u64>) -> Result<Option<WireMessage>> {
        if self.snapshot_size == 0 {
            return Ok(None);
        }
        let lines = self.source.snapshot_lines(watermark, self.snapshot_size)?;
        if lines.len() < self.snapshot_size {
            return Ok(None);
        }
        let entries = self.formatter.format_batch(&lines);
        Ok(Some(WireMessage::initial_lines(entries)))
    }

    fn send_to_all(registry: &mut Registry, message: WireMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let json: Arc<str> = match message.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                log::error!("Failed to encode broadcast: {}", e);
                return report;
            }
        };

        let mut dead = Vec::new();
        for (id, sender) in registry.viewers.iter() {
            if sender.is_closed() {
                report.skipped += 1;
                dead.push(*id);
                continue;
            }
            match sender.send(json.clone()) {
                Ok(()) => report.delivered += 1,
                // only reachable when the receiver drops after `is_closed`
                Err(_) => {
                    log::debug!("Broadcaster: Delivery to viewer {} failed", id);
                    report.failures.push(DeliveryError { viewer: *id });
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            registry.viewers.remove(&id);
        }

        report
    }
}
