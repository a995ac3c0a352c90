//! Persisted document model
//!
//! The on-disk projection of a triage session and the pure operations the
//! store applies to it: integrity checking, repair, reconciliation against
//! the current source collection, and version migration.
//!
//! Document shape (stable import/export contract):
//!
//! ```json
//! {
//!   "photoData": [
//!     { "id": "...", "status": "kept", "processedDate": "...", "creationDate": "..." }
//!   ],
//!   "currentPhotoIndex": 0,
//!   "lastSavedDate": "...",
//!   "version": "1.0"
//! }
//! ```

use crate::error::{Error, Result};
use crate::model::{ItemStatus, TriageItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Version tag written by this build
pub const FORMAT_VERSION: &str = "1.0";

/// Version tags accepted by import
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// One persisted item entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedItem {
    /// Stable item identifier
    pub id: String,
    /// Triage status ("unprocessed" | "kept" | "deleted")
    pub status: ItemStatus,
    /// When the status left Unprocessed; explicit null while Unprocessed
    pub processed_date: Option<DateTime<Utc>>,
    /// Source creation timestamp
    pub creation_date: DateTime<Utc>,
}

impl PersistedItem {
    /// Project an in-memory item into its persisted form
    pub fn from_item(item: &TriageItem) -> Self {
        Self {
            id: item.id.clone(),
            status: item.status,
            processed_date: item.processed_at,
            creation_date: item.created_at,
        }
    }

    /// Rebuild the in-memory item this entry describes
    pub fn into_item(self) -> TriageItem {
        TriageItem {
            id: self.id,
            created_at: self.creation_date,
            status: self.status,
            processed_at: self.processed_date,
        }
    }
}

/// The full persisted session document
///
/// `current_photo_index` is kept signed so documents written by other
/// implementations (where the index may underflow) still parse; `repair`
/// clamps it back into range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Per-item entries, in collection order
    pub photo_data: Vec<PersistedItem>,
    /// Cursor position at last save
    pub current_photo_index: i64,
    /// When this document was last written
    pub last_saved_date: DateTime<Utc>,
    /// Document format version tag
    pub version: String,
}

impl PersistedState {
    /// Empty state for a first run (or after both files failed to load)
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            photo_data: Vec::new(),
            current_photo_index: 0,
            last_saved_date: at,
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// Build a document from a session snapshot
    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a TriageItem>,
        cursor: usize,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            photo_data: items.into_iter().map(PersistedItem::from_item).collect(),
            current_photo_index: cursor as i64,
            last_saved_date: at,
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// Structural integrity check applied after every load
    ///
    /// A document fails when its version tag is empty or any entry has an
    /// empty id. Failing documents are treated as corrupt and trigger the
    /// backup fallback.
    pub fn integrity_ok(&self) -> bool {
        if self.version.is_empty() {
            return false;
        }
        self.photo_data.iter().all(|entry| !entry.id.is_empty())
    }

    /// Cursor clamped into `[0, len-1]` (0 for an empty document)
    pub fn clamped_cursor(&self) -> usize {
        if self.photo_data.is_empty() {
            return 0;
        }
        let max = (self.photo_data.len() - 1) as i64;
        self.current_photo_index.clamp(0, max) as usize
    }

    /// Fix duplicate ids and an out-of-range cursor
    ///
    /// Duplicates resolve last-write-wins: the final occurrence's data
    /// survives, at the first occurrence's position. The cursor is clamped
    /// into `[0, len-1]`. Returns true when anything changed.
    pub fn repair(&mut self) -> bool {
        let mut changed = false;

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut deduped: Vec<PersistedItem> = Vec::with_capacity(self.photo_data.len());
        for entry in self.photo_data.drain(..) {
            match seen.get(&entry.id) {
                Some(&pos) => {
                    deduped[pos] = entry;
                    changed = true;
                }
                None => {
                    seen.insert(entry.id.clone(), deduped.len());
                    deduped.push(entry);
                }
            }
        }
        self.photo_data = deduped;

        let clamped = self.clamped_cursor() as i64;
        if clamped != self.current_photo_index {
            self.current_photo_index = clamped;
            changed = true;
        }

        changed
    }

    /// Drop entries whose id is no longer present in the source collection
    ///
    /// Returns the number of stale entries removed. The cursor is left for
    /// `repair` / the session merge to clamp.
    pub fn reconcile(&mut self, known_ids: &HashSet<String>) -> usize {
        let before = self.photo_data.len();
        self.photo_data.retain(|entry| known_ids.contains(&entry.id));
        before - self.photo_data.len()
    }

    /// Normalize the version tag after load
    ///
    /// A current tag is a no-op. Any other non-empty tag is adopted: the data
    /// is kept as-is and the tag rewritten to the current version. Returns
    /// true when the document changed.
    pub fn migrate(&mut self) -> bool {
        if self.version == FORMAT_VERSION {
            return false;
        }
        warn!(
            "Adopting persisted document with version '{}' (current '{}')",
            self.version, FORMAT_VERSION
        );
        self.version = FORMAT_VERSION.to_string();
        true
    }

    /// Entries indexed by id, for merging onto a source listing
    pub fn by_id(&self) -> HashMap<&str, &PersistedItem> {
        self.photo_data
            .iter()
            .map(|entry| (entry.id.as_str(), entry))
            .collect()
    }

    /// Portable pretty-printed document bytes (export surface)
    pub fn to_portable_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Validate and parse an imported document
///
/// Checks the top-level shape (photoData, currentPhotoIndex, version must be
/// present) and version membership in [`SUPPORTED_VERSIONS`] before the typed
/// parse. Every failure maps to [`Error::ImportRejected`] so callers can
/// surface one rejection path; the current state is never touched here.
pub fn validate_import(bytes: &[u8]) -> Result<PersistedState> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::ImportRejected(format!("not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::ImportRejected("top level is not an object".to_string()))?;

    for key in ["photoData", "currentPhotoIndex", "version"] {
        if !object.contains_key(key) {
            return Err(Error::ImportRejected(format!("missing required field '{}'", key)));
        }
    }

    let version = object
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ImportRejected("version is not a string".to_string()))?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(Error::ImportRejected(format!("unsupported version '{}'", version)));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::ImportRejected(format!("malformed document: {}", e)))
}
