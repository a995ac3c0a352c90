//! # Photosift Common Library
//!
//! Shared code for the photosift engine and front-ends including:
//! - Item and status model (TriageItem, ItemStatus, Decision)
//! - Persisted document model and its pure operations
//! - Event types (SiftEvent enum) and EventBus
//! - Utility functions

pub mod error;
pub mod events;
pub mod model;
pub mod persist;
pub mod time;

pub use error::{Error, Result};
pub use model::{Decision, ItemStatus, StatusCounts, TriageItem};
pub use persist::{PersistedItem, PersistedState};
