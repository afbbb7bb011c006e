//! Error types for commitment operations.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::location::LocationError;

/// Error type for commitment creation, signing and storage.
///
/// Verification mismatches are never errors; they are reported as `false`.
#[derive(Error, Debug)]
pub enum CommitmentError {
    /// An argument was outside its valid domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for commitment operations.
pub type Result<T> = std::result::Result<T, CommitmentError>;

impl From<LocationError> for CommitmentError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::InvalidArgument(msg) => Self::InvalidArgument(msg),
        }
    }
}
