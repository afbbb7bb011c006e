//! Error types for proof generation.

use thiserror::Error;

use crate::commitment::CommitmentError;
use crate::crypto::CryptoError;
use crate::location::LocationError;

/// Errors raised while generating proofs.
///
/// Verification never returns these: a proof that fails any check is
/// reported as `false`.
#[derive(Error, Debug)]
pub enum ProofError {
    /// An argument was outside its valid domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Commitment operation failed.
    #[error("Commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    /// History storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for proof operations.
pub type Result<T> = std::result::Result<T, ProofError>;

impl From<LocationError> for ProofError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::InvalidArgument(msg) => Self::InvalidArgument(msg),
        }
    }
}
