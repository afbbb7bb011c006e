//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur while hashing, signing or generating randomness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A secure provider is unavailable, or a non-secure provider was
    /// offered where a secure one is required.
    #[error("Insecure environment: {0}")]
    InsecureEnvironment(String),

    /// An argument was outside its valid domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key material could not be parsed or derived.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Hex encoding/decoding error.
    #[error("Hex encoding error: {0}")]
    Hex(String),
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        Self::Hex(e.to_string())
    }
}
