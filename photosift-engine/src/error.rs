//! Error types for photosift-engine
//!
//! Defines engine-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the photosift engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared document/model errors (import validation, serialization)
    #[error(transparent)]
    Common(#[from] photosift_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Media source listing or loading errors
    #[error("Source error: {0}")]
    Source(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using photosift-engine Error
pub type Result<T> = std::result::Result<T, Error>;
