//! Item and status model
//!
//! Pure value types shared by the engine and front-ends. Status transition
//! rules are enforced by the triage controller; this module only guarantees
//! the coupling between `status` and `processed_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Triage status of a single item
///
/// Serializes as a lowercase string ("unprocessed" | "kept" | "deleted"),
/// the stable on-disk and import/export representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Not yet decided
    Unprocessed,
    /// Decided: keep
    Kept,
    /// Decided: delete (still restorable until purged)
    Deleted,
}

impl ItemStatus {
    /// True for any status other than Unprocessed
    pub fn is_processed(&self) -> bool {
        !matches!(self, ItemStatus::Unprocessed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Unprocessed => "unprocessed",
            ItemStatus::Kept => "kept",
            ItemStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// A user decision applied to the current item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Keep,
    Delete,
}

impl Decision {
    /// Status an item takes when this decision is applied
    pub fn status(&self) -> ItemStatus {
        match self {
            Decision::Keep => ItemStatus::Kept,
            Decision::Delete => ItemStatus::Deleted,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Keep => write!(f, "keep"),
            Decision::Delete => write!(f, "delete"),
        }
    }
}

/// One triaged unit
///
/// Invariant: `processed_at` is `Some` iff `status != Unprocessed`. The
/// mutation helpers below maintain it; constructing by hand must too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageItem {
    /// Opaque stable identifier, unique within a collection
    pub id: String,
    /// Source-provided creation timestamp (ordering, matching)
    pub created_at: DateTime<Utc>,
    /// Current triage status
    pub status: ItemStatus,
    /// When the status last left Unprocessed, None while Unprocessed
    pub processed_at: Option<DateTime<Utc>>,
}

impl TriageItem {
    /// New item in the Unprocessed state
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            status: ItemStatus::Unprocessed,
            processed_at: None,
        }
    }

    /// Apply a decision, stamping the processed time
    pub fn apply(&mut self, decision: Decision, at: DateTime<Utc>) {
        self.status = decision.status();
        self.processed_at = Some(at);
    }

    /// Return to Unprocessed, clearing the processed time
    pub fn reset_unprocessed(&mut self) {
        self.status = ItemStatus::Unprocessed;
        self.processed_at = None;
    }

    /// Check the status/processed_at coupling invariant
    pub fn timestamps_consistent(&self) -> bool {
        self.status.is_processed() == self.processed_at.is_some()
    }
}

/// Per-status totals over a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub unprocessed: usize,
    pub kept: usize,
    pub deleted: usize,
}

impl StatusCounts {
    /// Tally a collection of items
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a TriageItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.status {
                ItemStatus::Unprocessed => counts.unprocessed += 1,
                ItemStatus::Kept => counts.kept += 1,
                ItemStatus::Deleted => counts.deleted += 1,
            }
        }
        counts
    }

    /// Items with any decided status
    pub fn processed(&self) -> usize {
        self.kept + self.deleted
    }

    /// All items
    pub fn total(&self) -> usize {
        self.unprocessed + self.kept + self.deleted
    }
}
