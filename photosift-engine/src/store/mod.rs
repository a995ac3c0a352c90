//! Triage state persistence store
//!
//! Durable JSON-document store for the full collection's statuses and the
//! cursor. One primary file (`photoData.json`) plus a rotating backup
//! (`photoData_backup.json`) live in the data directory; every durable write
//! serializes the entire current state (full snapshot, not a delta log), so a
//! load can never observe a cursor whose same-transition status update is
//! missing.
//!
//! Write discipline:
//! - Incremental updates (`record_status`, `record_cursor`, `replace_all`)
//!   mutate the in-memory mirror and nudge the writer task; rapid-fire
//!   updates coalesce into one write.
//! - Every durable write first copies the current primary into the backup
//!   slot, then rewrites the primary via write-to-temp + rename.
//! - At most one write is ever in flight: `save_now` and the writer task
//!   serialize through one internal lock.
//! - A failed write restores the primary from the backup and is reported as
//!   a non-fatal warning; in-memory state stays authoritative.

use crate::error::{Error, Result};
use photosift_common::events::{EventBus, SiftEvent};
use photosift_common::model::{ItemStatus, TriageItem};
use photosift_common::persist::{validate_import, PersistedItem, PersistedState};
use photosift_common::time::{file_stamp, now};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Primary state file name
pub const PRIMARY_FILE: &str = "photoData.json";

/// Rotating backup file name
pub const BACKUP_FILE: &str = "photoData_backup.json";

/// Prefix for timestamped manual backups
pub const MANUAL_BACKUP_PREFIX: &str = "photosift_backup_";

/// Scratch file the swap write goes through
const TEMP_FILE: &str = "photoData.json.tmp";

/// Which file produced the loaded state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Default,
}

impl LoadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSource::Primary => "primary",
            LoadSource::Backup => "backup",
            LoadSource::Default => "default",
        }
    }
}

/// Outcome of a load + reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Which file produced the state
    pub source: LoadSource,
    /// Persisted entries that matched a known source item
    pub matched: usize,
    /// Persisted entries dropped as stale
    pub stale_dropped: usize,
    /// Whether repair or migration changed the document
    pub repaired: bool,
}

/// Store statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatistics {
    pub total: usize,
    pub unprocessed: usize,
    pub kept: usize,
    pub deleted: usize,
    pub cursor: usize,
    pub last_saved: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub primary_file_bytes: Option<u64>,
    pub backup_count: usize,
}

/// In-memory mirror: the document plus an id index for O(1) upserts
struct StoreState {
    document: PersistedState,
    index: HashMap<String, usize>,
}

impl StoreState {
    fn new() -> Self {
        let mut state = Self {
            document: PersistedState::empty(now()),
            index: HashMap::new(),
        };
        state.reindex();
        state
    }

    fn install(&mut self, document: PersistedState) {
        self.document = document;
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .document
            .photo_data
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.id.clone(), pos))
            .collect();
    }

    fn upsert(&mut self, entry: PersistedItem) {
        match self.index.get(&entry.id) {
            Some(&pos) => self.document.photo_data[pos] = entry,
            None => {
                self.index.insert(entry.id.clone(), self.document.photo_data.len());
                self.document.photo_data.push(entry);
            }
        }
    }
}

/// Durable store for the persisted triage document
pub struct TriageStore {
    data_dir: PathBuf,
    state: RwLock<StoreState>,
    /// Nudges the writer task after incremental updates
    dirty: Notify,
    /// Serializes every write to the primary file
    write_lock: Mutex<()>,
    event_bus: Arc<EventBus>,
    autosave_interval: std::time::Duration,
    writer_running: AtomicBool,
    writer_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TriageStore {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        autosave_interval: std::time::Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            state: RwLock::new(StoreState::new()),
            dirty: Notify::new(),
            write_lock: Mutex::new(()),
            event_bus,
            autosave_interval,
            writer_running: AtomicBool::new(false),
            writer_task: std::sync::Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn primary_path(&self) -> PathBuf {
        self.data_dir.join(PRIMARY_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.data_dir.join(BACKUP_FILE)
    }

    // ========================================================================
    // Writer task
    // ========================================================================

    /// Start the background writer: wakes on incremental updates and on the
    /// periodic autosave tick, writing the full current state each time.
    pub fn start_writer(self: &Arc<Self>) {
        if self.writer_running.swap(true, Ordering::SeqCst) {
            warn!("Store writer already running");
            return;
        }

        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.autosave_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick resolves immediately; consume it
            ticker.tick().await;
            debug!(
                "Store writer started (autosave every {:?})",
                store.autosave_interval
            );

            loop {
                if !store.writer_running.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = store.dirty.notified() => {}
                    _ = ticker.tick() => {}
                }
                if !store.writer_running.load(Ordering::SeqCst) {
                    break;
                }
                // Failures are logged and reported inside save_now
                let _ = store.save_now().await;
            }
            debug!("Store writer exiting");
        });

        if let Ok(mut slot) = self.writer_task.lock() {
            *slot = Some(handle);
        }
    }

    /// Stop the writer task and perform a final flush
    pub async fn shutdown(&self) {
        self.writer_running.store(false, Ordering::SeqCst);
        // notify_one stores a permit, so the writer wakes even if it has not
        // reached its select yet
        self.dirty.notify_one();

        let handle = self.writer_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // Final flush; failure already reported inside save_now
        let _ = self.save_now().await;
        info!("Store shut down");
    }

    // ========================================================================
    // Load / reconcile
    // ========================================================================

    /// Load persisted state, reconciling against the current source ids
    ///
    /// Read order: primary file, then backup, then an empty default. Parse
    /// or integrity failures fall through to the next source; load itself
    /// never fails. Entries whose id is not in `known_ids` are dropped as
    /// stale, then the document is repaired and version-migrated. When any
    /// of that changed the document (or it came from the backup), a durable
    /// write of the normalized form is scheduled.
    pub async fn load(&self, known_ids: &HashSet<String>) -> ReconcileReport {
        if let Err(e) = tokio::fs::create_dir_all(&self.data_dir).await {
            warn!("Could not create data directory {:?}: {}", self.data_dir, e);
        }

        let (mut document, source) = self.read_with_fallback().await;
        let stale_dropped = document.reconcile(known_ids);
        let repaired = document.repair();
        let migrated = document.migrate();
        let matched = document.photo_data.len();
        let cursor = document.clamped_cursor();

        if stale_dropped > 0 {
            info!("Reconciliation dropped {} stale persisted entries", stale_dropped);
        }
        if repaired {
            info!("Repaired persisted state (duplicate ids or cursor out of range)");
        }

        {
            let mut state = self.state.write().await;
            state.install(document);
        }

        if stale_dropped > 0 || repaired || migrated || source != LoadSource::Primary {
            // Schedule a write so the normalized form reaches disk; for a
            // default (first-run) state this also creates the primary file
            self.dirty.notify_one();
        }

        info!(
            "Loaded triage state: {} entries, cursor {}, source {}",
            matched,
            cursor,
            source.as_str()
        );

        ReconcileReport {
            source,
            matched,
            stale_dropped,
            repaired: repaired || migrated,
        }
    }

    async fn read_with_fallback(&self) -> (PersistedState, LoadSource) {
        match self.read_document(&self.primary_path()).await {
            Ok(document) if document.integrity_ok() => return (document, LoadSource::Primary),
            Ok(_) => warn!("Primary state file failed integrity check, trying backup"),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No primary state file (first run)");
            }
            Err(e) => warn!("Primary state file unreadable ({}), trying backup", e),
        }

        match self.read_document(&self.backup_path()).await {
            Ok(document) if document.integrity_ok() => {
                info!("Recovered triage state from backup");
                return (document, LoadSource::Backup);
            }
            Ok(_) => warn!("Backup state file failed integrity check"),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No backup state file");
            }
            Err(e) => warn!("Backup state file unreadable ({})", e),
        }

        (PersistedState::empty(now()), LoadSource::Default)
    }

    async fn read_document(&self, path: &Path) -> Result<PersistedState> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // ========================================================================
    // Incremental updates
    // ========================================================================

    /// Upsert one item's status/timestamps and schedule a durable write
    pub async fn record_status(&self, item: &TriageItem) {
        {
            let mut state = self.state.write().await;
            state.upsert(PersistedItem::from_item(item));
        }
        self.dirty.notify_one();
    }

    /// Update the cursor and schedule a durable write
    pub async fn record_cursor(&self, cursor: usize) {
        {
            let mut state = self.state.write().await;
            state.document.current_photo_index = cursor as i64;
        }
        self.dirty.notify_one();
    }

    /// Rebuild the whole mirror from a session snapshot and schedule a write
    pub async fn replace_all(&self, items: &[TriageItem], cursor: usize) {
        {
            let mut state = self.state.write().await;
            state.install(PersistedState::from_items(items, cursor, now()));
        }
        self.dirty.notify_one();
    }

    /// Clone of the current in-memory document
    pub async fn snapshot(&self) -> PersistedState {
        self.state.read().await.document.clone()
    }

    // ========================================================================
    // Durable writes
    // ========================================================================

    /// Write the full current state immediately, awaited
    ///
    /// Used by the writer task, on import, and on suspend/shutdown. On
    /// failure the primary is restored from the backup and a non-fatal
    /// warning is reported; in-memory state is not rolled back.
    pub async fn save_now(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock().await;

        let document = {
            let mut state = self.state.write().await;
            state.document.last_saved_date = now();
            state.document.clone()
        };

        match self.write_swap(&document).await {
            Ok(()) => {
                debug!(
                    "Persisted {} entries (cursor {})",
                    document.photo_data.len(),
                    document.clamped_cursor()
                );
                self.event_bus.emit_lossy(SiftEvent::StateSaved {
                    item_count: document.photo_data.len(),
                    cursor: document.clamped_cursor(),
                    timestamp: now(),
                });
                Ok(())
            }
            Err(e) => {
                let restored = self.restore_primary_from_backup().await;
                error!(
                    "State write failed: {} (primary restored from backup: {})",
                    e, restored
                );
                self.event_bus.emit_lossy(SiftEvent::StateSaveFailed {
                    error: e.to_string(),
                    restored_backup: restored,
                    timestamp: now(),
                });
                Err(e)
            }
        }
    }

    /// Backup-then-swap rewrite of the primary file
    ///
    /// The current primary is copied into the backup slot first, then the
    /// new document is written to a temp file and renamed over the primary.
    /// The primary is never written in place.
    async fn write_swap(&self, document: &PersistedState) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let primary = self.primary_path();
        if matches!(tokio::fs::try_exists(&primary).await, Ok(true)) {
            tokio::fs::copy(&primary, self.backup_path()).await?;
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp = self.data_dir.join(TEMP_FILE);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &primary).await?;
        Ok(())
    }

    async fn restore_primary_from_backup(&self) -> bool {
        let backup = self.backup_path();
        if !matches!(tokio::fs::try_exists(&backup).await, Ok(true)) {
            return false;
        }
        match tokio::fs::copy(&backup, self.primary_path()).await {
            Ok(_) => {
                info!("Primary state file restored from backup");
                true
            }
            Err(e) => {
                warn!("Backup restore failed: {}", e);
                false
            }
        }
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    /// Portable pretty-printed document bytes
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let document = self.snapshot().await;
        Ok(document.to_portable_json()?)
    }

    /// Validate an imported document and replace the persisted state
    ///
    /// Rejects documents with a bad shape or an unsupported version, leaving
    /// current state untouched. On success the imported state replaces the
    /// mirror and is persisted immediately (awaited).
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<()> {
        let incoming = validate_import(bytes)?;
        let item_count = incoming.photo_data.len();
        let cursor = incoming.clamped_cursor();

        {
            let mut state = self.state.write().await;
            state.install(incoming);
        }
        self.save_now().await?;

        info!("Imported state document: {} entries, cursor {}", item_count, cursor);
        self.event_bus.emit_lossy(SiftEvent::StateImported {
            item_count,
            cursor,
            timestamp: now(),
        });
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Fix duplicates and an out-of-range cursor; persists when changed
    pub async fn repair(&self) -> bool {
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.document.repair();
            if changed {
                state.reindex();
            }
            changed
        };
        if changed {
            info!("Store repair changed the persisted document");
            self.dirty.notify_one();
        }
        changed
    }

    /// Totals, cursor, file sizes and backup count
    pub async fn statistics(&self) -> StoreStatistics {
        let document = self.snapshot().await;

        let mut stats = StoreStatistics {
            total: document.photo_data.len(),
            unprocessed: 0,
            kept: 0,
            deleted: 0,
            cursor: document.clamped_cursor(),
            last_saved: document.last_saved_date,
            version: document.version.clone(),
            primary_file_bytes: None,
            backup_count: 0,
        };
        for entry in &document.photo_data {
            match entry.status {
                ItemStatus::Unprocessed => stats.unprocessed += 1,
                ItemStatus::Kept => stats.kept += 1,
                ItemStatus::Deleted => stats.deleted += 1,
            }
        }

        stats.primary_file_bytes = tokio::fs::metadata(self.primary_path())
            .await
            .ok()
            .map(|m| m.len());
        stats.backup_count = self.list_backups().await.len();
        stats
    }

    /// Write a timestamped manual backup of the current state
    pub async fn create_manual_backup(&self) -> Result<PathBuf> {
        let bytes = self.export_snapshot().await?;
        let path = self
            .data_dir
            .join(format!("{}{}.json", MANUAL_BACKUP_PREFIX, file_stamp(now())));

        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        info!("Manual backup written to {:?}", path);
        self.event_bus.emit_lossy(SiftEvent::BackupCreated {
            path: path.to_string_lossy().into_owned(),
            timestamp: now(),
        });
        Ok(path)
    }

    /// Backup files in the data directory (rotating and manual), sorted
    pub async fn list_backups(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(_) => return found,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains("backup") && name.ends_with(".json") {
                found.push(entry.path());
            }
        }
        found.sort();
        found
    }

    /// Replace current state with the contents of a backup file
    ///
    /// Routes through import validation, so a corrupt backup is rejected
    /// without touching current state.
    pub async fn restore_from_backup(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        self.import_snapshot(&bytes).await
    }

    /// Reset to an empty state and remove the primary and rotating backup
    ///
    /// Manual backups are left in place. Caller confirmation is a front-end
    /// concern.
    pub async fn clear_all(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock().await;

        {
            let mut state = self.state.write().await;
            state.install(PersistedState::empty(now()));
        }

        for path in [self.primary_path(), self.backup_path()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        info!("Cleared persisted state and removed state files");
        self.event_bus.emit_lossy(SiftEvent::StateCleared { timestamp: now() });
        Ok(())
    }
}
