//! Error types for location and geohash operations.

use thiserror::Error;

/// Error type for coordinate validation and geohash codec operations.
///
/// Every variant is a caller bug (bad precision, malformed hash, coordinate
/// out of range). Verification code never produces these for a mismatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// An argument was outside its valid domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for location operations.
pub type Result<T> = std::result::Result<T, LocationError>;

impl LocationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<geohash::GeohashError> for LocationError {
    fn from(err: geohash::GeohashError) -> Self {
        Self::InvalidArgument(format!("geohash: {err}"))
    }
}
