//! Triage controller
//!
//! Single owner of the in-memory collection and cursor. Every transition
//! completes synchronously against in-memory state, then fans out to the
//! store (scheduled durable write) and the cache (window recompute plus
//! opportunistic eviction). The in-memory session is the source of truth for
//! the running process; the store is an eventually-consistent mirror.
//!
//! Status state machine, enforced here and nowhere else:
//! Unprocessed -> Kept | Deleted via `decide`, and back to Unprocessed only
//! via `go_back` (or a trash restore by id). There is no direct Kept<->Deleted
//! edge.

use crate::cache::PredictiveCache;
use crate::error::Result;
use crate::source::{DynMediaSource, LibraryOps, MediaContent};
use crate::store::{ReconcileReport, TriageStore};
use photosift_common::events::{EventBus, SiftEvent};
use photosift_common::model::{Decision, ItemStatus, StatusCounts, TriageItem};
use photosift_common::time::now;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// In-memory session state, owned exclusively by the controller
struct Session {
    items: Vec<TriageItem>,
    cursor: usize,
}

impl Session {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.cursor >= self.items.len()
    }

    /// Window center: the cursor, held at the last index once complete
    fn window_center(&self) -> usize {
        self.cursor.min(self.items.len().saturating_sub(1))
    }
}

/// What a session load produced
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Items in the collection
    pub item_count: usize,
    /// Restored cursor position
    pub cursor: usize,
    /// Per-status totals
    pub counts: StatusCounts,
    /// Load/reconciliation details from the store
    pub report: ReconcileReport,
}

/// Orchestrates the collection, cursor, store and cache
pub struct TriageController {
    session: RwLock<Session>,
    store: Arc<TriageStore>,
    cache: Arc<PredictiveCache>,
    source: DynMediaSource,
    library: Arc<dyn LibraryOps>,
    event_bus: Arc<EventBus>,
}

impl TriageController {
    pub fn new(
        store: Arc<TriageStore>,
        cache: Arc<PredictiveCache>,
        source: DynMediaSource,
        library: Arc<dyn LibraryOps>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session: RwLock::new(Session::empty()),
            store,
            cache,
            source,
            library,
            event_bus,
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// List the source, load persisted state, and merge into a session
    ///
    /// Source order wins: the session holds one item per listed source entry,
    /// taking status and processed time from the persisted entry when one
    /// matches the id. Persisted entries for vanished items were already
    /// dropped by the store's reconciliation; the cursor is clamped to the
    /// merged collection.
    pub async fn load_session(&self) -> Result<SessionSummary> {
        let listing = self.source.list_items().await?;
        let known_ids: HashSet<String> = listing.iter().map(|s| s.id.clone()).collect();

        let report = self.store.load(&known_ids).await;
        let persisted = self.store.snapshot().await;

        let by_id = persisted.by_id();
        let items: Vec<TriageItem> = listing
            .into_iter()
            .map(|source_item| match by_id.get(source_item.id.as_str()) {
                Some(entry) => TriageItem {
                    id: source_item.id,
                    created_at: source_item.created_at,
                    status: entry.status,
                    processed_at: entry.processed_date,
                },
                None => TriageItem::new(source_item.id, source_item.created_at),
            })
            .collect();

        let cursor = if items.is_empty() {
            0
        } else {
            persisted.clamped_cursor().min(items.len() - 1)
        };

        self.install_session(items, cursor, report.source.as_str(), report.stale_dropped)
            .await;

        let session = self.session.read().await;
        let summary = SessionSummary {
            item_count: session.items.len(),
            cursor: session.cursor,
            counts: StatusCounts::tally(&session.items),
            report: report.clone(),
        };
        info!(
            "Session loaded: {} items, cursor {}, {} kept / {} deleted / {} unprocessed",
            summary.item_count,
            summary.cursor,
            summary.counts.kept,
            summary.counts.deleted,
            summary.counts.unprocessed
        );
        Ok(summary)
    }

    /// Install a merged session, push the full mirror, and open the window
    async fn install_session(
        &self,
        items: Vec<TriageItem>,
        cursor: usize,
        source: &str,
        stale_dropped: usize,
    ) {
        let item_count = {
            let mut session = self.session.write().await;
            session.items = items;
            session.cursor = cursor;
            self.store.replace_all(&session.items, session.cursor).await;
            self.cache.clear_all();
            if !session.items.is_empty() {
                self.cache.set_window(session.window_center(), &session.items);
            }
            session.items.len()
        };

        self.event_bus.emit_lossy(SiftEvent::SessionLoaded {
            item_count,
            cursor,
            persisted_matched: item_count,
            stale_dropped,
            source: source.to_string(),
            timestamp: now(),
        });
    }

    /// Best-effort immediate save plus cache release, for backgrounding
    pub async fn suspend(&self) {
        let _ = self.store.save_now().await;
        self.cache.clear_all();
        debug!("Session suspended: state flushed, cache released");
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Apply a decision to the current item and advance the cursor
    ///
    /// Returns false (a no-op, not an error) when the session is already
    /// complete or empty.
    pub async fn decide(&self, decision: Decision) -> bool {
        let (item, cursor, completed_counts) = {
            let mut session = self.session.write().await;
            if session.is_complete() {
                return false;
            }

            let at = now();
            let cur = session.cursor;
            session.items[cur].apply(decision, at);
            let item = session.items[cur].clone();

            session.cursor += 1;
            let cursor = session.cursor;

            self.cache.set_window(session.window_center(), &session.items);
            self.cache.evict_behind(cursor, &session.items);

            let completed_counts = session
                .is_complete()
                .then(|| StatusCounts::tally(&session.items));
            (item, cursor, completed_counts)
        };

        self.store.record_status(&item).await;
        self.store.record_cursor(cursor).await;

        self.event_bus.emit_lossy(SiftEvent::ItemDecided {
            id: item.id,
            status: item.status,
            cursor,
            timestamp: now(),
        });
        if let Some(counts) = completed_counts {
            info!(
                "Triage complete: {} kept, {} deleted",
                counts.kept, counts.deleted
            );
            self.event_bus.emit_lossy(SiftEvent::TriageCompleted {
                kept: counts.kept,
                deleted: counts.deleted,
                timestamp: now(),
            });
        }
        true
    }

    /// Step the cursor back one item, resetting it to Unprocessed
    ///
    /// A destructive one-step undo: the prior decision on the retreated-onto
    /// item is discarded. Returns false when the cursor is already at 0.
    pub async fn go_back(&self) -> bool {
        let (item, cursor) = {
            let mut session = self.session.write().await;
            if session.cursor == 0 {
                return false;
            }

            session.cursor -= 1;
            let cursor = session.cursor;
            session.items[cursor].reset_unprocessed();
            let item = session.items[cursor].clone();

            self.cache.set_window(session.window_center(), &session.items);
            (item, cursor)
        };

        self.store.record_status(&item).await;
        self.store.record_cursor(cursor).await;

        self.event_bus.emit_lossy(SiftEvent::WentBack {
            id: item.id,
            cursor,
            timestamp: now(),
        });
        true
    }

    /// Return one decided item to Unprocessed by id, without moving the cursor
    ///
    /// The restore path for a "trash bin" review surface. Same edge as
    /// go_back but addressed by id; only items with a decision qualify.
    pub async fn restore(&self, id: &str) -> Result<()> {
        let item = {
            let mut session = self.session.write().await;
            let item = session
                .items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| crate::error::Error::NotFound(format!("no item '{}'", id)))?;
            if item.status == ItemStatus::Unprocessed {
                return Err(crate::error::Error::InvalidState(format!(
                    "item '{}' has no decision to undo",
                    id
                )));
            }
            item.reset_unprocessed();
            item.clone()
        };

        self.store.record_status(&item).await;
        self.event_bus.emit_lossy(SiftEvent::ItemRestored {
            id: item.id,
            timestamp: now(),
        });
        Ok(())
    }

    /// Reset every item to Unprocessed and rewind the cursor to 0
    ///
    /// Performs a full durable rewrite before returning; meant for the
    /// settings path, not the interactive one.
    pub async fn reset(&self) -> Result<()> {
        let item_count = {
            let mut session = self.session.write().await;
            for item in &mut session.items {
                item.reset_unprocessed();
            }
            session.cursor = 0;

            self.cache.clear_all();
            if !session.items.is_empty() {
                self.cache.set_window(0, &session.items);
            }
            self.store.replace_all(&session.items, 0).await;
            session.items.len()
        };

        self.store.save_now().await?;
        info!("Session reset: {} items back to unprocessed", item_count);
        self.event_bus.emit_lossy(SiftEvent::SessionReset {
            item_count,
            timestamp: now(),
        });
        Ok(())
    }

    /// Permanently remove every Deleted item from the collection
    ///
    /// The one irreversible, collection-shrinking operation; callers confirm
    /// before invoking. The library capability is asked to delete first, but
    /// its failure does not stop the session-side purge.
    pub async fn purge_deleted(&self) -> Result<usize> {
        let doomed: Vec<String> = {
            let session = self.session.read().await;
            session
                .items
                .iter()
                .filter(|item| item.status == ItemStatus::Deleted)
                .map(|item| item.id.clone())
                .collect()
        };
        if doomed.is_empty() {
            debug!("Purge requested with nothing deleted");
            return Ok(0);
        }

        match self.library.permanently_delete(&doomed).await {
            Ok(removed) => debug!("Library removed {} of {} items", removed, doomed.len()),
            Err(e) => warn!("Library-side delete failed ({}); purging session anyway", e),
        }

        let (removed, cursor) = {
            let mut session = self.session.write().await;
            let removed_before_cursor = session.items[..session.cursor]
                .iter()
                .filter(|item| item.status == ItemStatus::Deleted)
                .count();
            let before = session.items.len();
            session.items.retain(|item| item.status != ItemStatus::Deleted);
            let removed = before - session.items.len();

            session.cursor = (session.cursor - removed_before_cursor).min(session.items.len());

            self.cache.clear_all();
            if !session.items.is_empty() {
                self.cache.set_window(session.window_center(), &session.items);
            }
            self.store.replace_all(&session.items, session.cursor).await;
            (removed, session.cursor)
        };

        self.store.save_now().await?;
        info!("Purged {} deleted items, cursor now {}", removed, cursor);
        self.event_bus.emit_lossy(SiftEvent::DeletedPurged {
            removed,
            cursor,
            timestamp: now(),
        });
        Ok(removed)
    }

    /// Forward a favorite toggle to the library capability
    ///
    /// Session invariants never depend on this succeeding.
    pub async fn mark_favorite(&self, id: &str) -> Result<bool> {
        {
            let session = self.session.read().await;
            if !session.items.iter().any(|item| item.id == id) {
                return Err(crate::error::Error::NotFound(format!("no item '{}'", id)));
            }
        }
        self.library.mark_favorite(id).await
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    /// Portable snapshot of the persisted state
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        self.store.export_snapshot().await
    }

    /// Replace persisted state from a snapshot, then rebuild the session
    ///
    /// Validation happens in the store; a rejected document leaves both the
    /// persisted and in-memory state untouched. An accepted one is treated as
    /// "reload from source and reconcile", not a live merge.
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<SessionSummary> {
        self.store.import_snapshot(bytes).await?;

        let listing = self.source.list_items().await?;
        let persisted = self.store.snapshot().await;
        let by_id = persisted.by_id();

        let items: Vec<TriageItem> = listing
            .into_iter()
            .map(|source_item| match by_id.get(source_item.id.as_str()) {
                Some(entry) => TriageItem {
                    id: source_item.id,
                    created_at: source_item.created_at,
                    status: entry.status,
                    processed_at: entry.processed_date,
                },
                None => TriageItem::new(source_item.id, source_item.created_at),
            })
            .collect();
        let cursor = if items.is_empty() {
            0
        } else {
            persisted.clamped_cursor().min(items.len() - 1)
        };

        self.install_session(items, cursor, "import", 0).await;

        let session = self.session.read().await;
        Ok(SessionSummary {
            item_count: session.items.len(),
            cursor: session.cursor,
            counts: StatusCounts::tally(&session.items),
            report: ReconcileReport {
                source: crate::store::LoadSource::Primary,
                matched: session.items.len(),
                stale_dropped: 0,
                repaired: false,
            },
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The item under the cursor, or None once triage is complete
    pub async fn current_item(&self) -> Option<TriageItem> {
        let session = self.session.read().await;
        session.items.get(session.cursor).cloned()
    }

    pub async fn cursor(&self) -> usize {
        self.session.read().await.cursor
    }

    pub async fn len(&self) -> usize {
        self.session.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.session.read().await.items.is_empty()
    }

    /// True when every item has been decided (or the collection is empty)
    pub async fn is_complete(&self) -> bool {
        self.session.read().await.is_complete()
    }

    pub async fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.session.read().await.items)
    }

    /// Item at a collection index, if in range
    pub async fn item_at(&self, index: usize) -> Option<TriageItem> {
        self.session.read().await.items.get(index).cloned()
    }

    /// Items currently marked Deleted, in collection order (trash listing)
    pub async fn deleted_items(&self) -> Vec<TriageItem> {
        self.session
            .read()
            .await
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Deleted)
            .cloned()
            .collect()
    }

    /// Whether content for an id is ready to show instantly
    pub fn is_resident(&self, id: &str) -> bool {
        self.cache.is_resident(id)
    }

    /// Content for the current item, loading directly on a cache miss
    pub async fn current_content(&self) -> Result<Option<Arc<MediaContent>>> {
        let Some(item) = self.current_item().await else {
            return Ok(None);
        };
        Ok(Some(self.cache.fetch(&item.id).await?))
    }
}
