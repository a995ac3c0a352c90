//! Event types for the photosift event system
//!
//! Provides shared event definitions and the EventBus used by the engine and
//! any attached front-end.

use crate::model::{Decision, ItemStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Photosift event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a detached front-end. All state-observing components consume this one
/// enum for exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SiftEvent {
    /// A triage session finished loading and reconciling
    ///
    /// Triggers:
    /// - Front-end: render the restored cursor position
    /// - Monitoring: log how much persisted state survived reconciliation
    SessionLoaded {
        /// Items in the loaded collection
        item_count: usize,
        /// Cursor position after clamping
        cursor: usize,
        /// Persisted entries matched to source items
        persisted_matched: usize,
        /// Persisted entries dropped as stale
        stale_dropped: usize,
        /// Which file produced the state ("primary" | "backup" | "default")
        source: String,
        /// When the session finished loading
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current item received a keep/delete decision
    ///
    /// Triggers:
    /// - Front-end: advance to the next item
    /// - Persistence: already scheduled by the controller
    ItemDecided {
        /// Item that was decided
        id: String,
        /// Status it transitioned to
        status: ItemStatus,
        /// Cursor position after the advance
        cursor: usize,
        /// When the decision was applied
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The cursor stepped back one item, resetting it to Unprocessed
    WentBack {
        /// Item the cursor retreated onto
        id: String,
        /// Cursor position after the step back
        cursor: usize,
        /// When the step back occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A decided item was returned to Unprocessed by id (trash restore)
    ItemRestored {
        /// Item that was restored
        id: String,
        /// When the restore occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every item was reset to Unprocessed and the cursor rewound
    SessionReset {
        /// Items in the session
        item_count: usize,
        /// When the reset occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Deleted items were permanently removed from the collection
    DeletedPurged {
        /// Number of items removed
        removed: usize,
        /// Cursor position after shifting
        cursor: usize,
        /// When the purge occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The cursor reached the end of the collection
    ///
    /// Triggers:
    /// - Front-end: show the completion summary
    TriageCompleted {
        /// Items kept
        kept: usize,
        /// Items deleted
        deleted: usize,
        /// When triage completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Continuous mode started a burst
    ContinuousStarted {
        /// Decision repeated for the burst
        decision: Decision,
        /// When the burst started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Continuous mode stopped
    ContinuousStopped {
        /// Actions performed during the burst
        actions: u32,
        /// True when the burst stopped because the collection ran out
        exhausted: bool,
        /// When the burst stopped
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Prefetched content became resident for an item
    ContentReady {
        /// Item whose content is now resident
        id: String,
        /// When the content became resident
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A content load failed; the item stays unresident and is retried on
    /// the next window recompute
    ContentLoadFailed {
        /// Item whose load failed
        id: String,
        /// Error message details
        error: String,
        /// When the load failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The persisted document was written durably
    StateSaved {
        /// Entries in the written document
        item_count: usize,
        /// Cursor in the written document
        cursor: usize,
        /// When the write completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A durable write failed; in-memory state remains authoritative
    ///
    /// Triggers:
    /// - Front-end: surface a non-fatal warning
    StateSaveFailed {
        /// Error message details
        error: String,
        /// Whether the primary was restored from the backup
        restored_backup: bool,
        /// When the write failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An imported document replaced the persisted state
    StateImported {
        /// Entries in the imported document
        item_count: usize,
        /// Cursor in the imported document
        cursor: usize,
        /// When the import was applied
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Persisted state and its files were cleared
    StateCleared {
        /// When the clear occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A manual backup file was written
    BackupCreated {
        /// Path of the backup file
        path: String,
        /// When the backup was written
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SiftEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            SiftEvent::SessionLoaded { .. } => "SessionLoaded",
            SiftEvent::ItemDecided { .. } => "ItemDecided",
            SiftEvent::WentBack { .. } => "WentBack",
            SiftEvent::ItemRestored { .. } => "ItemRestored",
            SiftEvent::SessionReset { .. } => "SessionReset",
            SiftEvent::DeletedPurged { .. } => "DeletedPurged",
            SiftEvent::TriageCompleted { .. } => "TriageCompleted",
            SiftEvent::ContinuousStarted { .. } => "ContinuousStarted",
            SiftEvent::ContinuousStopped { .. } => "ContinuousStopped",
            SiftEvent::ContentReady { .. } => "ContentReady",
            SiftEvent::ContentLoadFailed { .. } => "ContentLoadFailed",
            SiftEvent::StateSaved { .. } => "StateSaved",
            SiftEvent::StateSaveFailed { .. } => "StateSaveFailed",
            SiftEvent::StateImported { .. } => "StateImported",
            SiftEvent::StateCleared { .. } => "StateCleared",
            SiftEvent::BackupCreated { .. } => "BackupCreated",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use photosift_common::events::{EventBus, SiftEvent};
/// use photosift_common::ItemStatus;
/// use std::sync::Arc;
///
/// let event_bus = Arc::new(EventBus::new(256));
///
/// // Subscribe to events
/// let mut rx = event_bus.subscribe();
///
/// // Emit an event
/// event_bus.emit(SiftEvent::ItemDecided {
///     id: "2024/img_0001.jpg".to_string(),
///     status: ItemStatus::Kept,
///     cursor: 1,
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SiftEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    ///   Recommended values: 256 for interactive use, 10-100 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SiftEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SiftEvent,
    ) -> Result<usize, broadcast::error::SendError<SiftEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used on hot paths (cursor moves, content readiness) where it is
    /// acceptable for no component to be listening.
    pub fn emit_lossy(&self, event: SiftEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    ///
    /// Useful for debugging and monitoring
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
