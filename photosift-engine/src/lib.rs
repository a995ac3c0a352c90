//! # Photosift Engine Library
//!
//! Triage state and persistence engine for large media collections.
//!
//! **Purpose:** Drive a keep/delete/skip-back triage session over an ordered
//! collection, persist every decision durably across restarts, and keep the
//! next several items' content preloaded before the user reaches them.
//!
//! **Architecture:** Injected services around a central controller: a durable
//! JSON-document store with backup rotation, a windowed predictive cache fed
//! by a 2-worker priority loader pool, and a timer-driven pacer that turns a
//! sustained gesture into discrete decisions.

pub mod cache;
pub mod config;
pub mod error;
pub mod source;
pub mod store;
pub mod triage;

pub use cache::{CacheConfig, LoadPriority, PredictiveCache};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use source::{FsMediaSource, LibraryOps, MediaContent, MediaSource, SourceItem};
pub use store::TriageStore;
pub use triage::{ContinuousPacer, SessionSummary, TriageController};
