//! Error types for trust circle management.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Error type for trust circle operations.
#[derive(Error, Debug)]
pub enum TrustError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Circle not found.
    #[error("Circle not found: {0}")]
    NotFound(String),

    /// Contact not found.
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Invalid data provided.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Circle already exists.
    #[error("Circle already exists: {0}")]
    AlreadyExists(String),

    /// Identifier generation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Snapshot (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for trust operations.
pub type Result<T> = std::result::Result<T, TrustError>;
