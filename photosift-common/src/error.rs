//! Common error types for photosift

use thiserror::Error;

/// Common result type for photosift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across photosift crates
#[derive(Error, Debug)]
pub enum Error {
    /// JSON encode/decode error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Imported document rejected (bad shape or unsupported version)
    #[error("Import rejected: {0}")]
    ImportRejected(String),
}
