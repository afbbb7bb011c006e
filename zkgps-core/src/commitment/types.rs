//! Commitment data types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::location::{Coordinate, GeohashPrecision};

/// Default lifetime of a commitment (5 minutes).
pub const DEFAULT_COMMITMENT_TTL_MS: i64 = 300_000;

/// A hash commitment to a full-precision location.
///
/// `commitment = H(geohash(coord, 12) | salt)`. Only `revealed_prefix`
/// (the first `precision` characters of the full geohash) discloses
/// anything about the location.
///
/// # Wire Format
///
/// ```json
/// {
///   "commitment": "5f1c…",
///   "precision": 6,
///   "timestamp": 1700000000000,
///   "expiresAt": 1700000300000,
///   "revealedPrefix": "9q8yyk"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCommitment {
    /// Hex digest binding the full geohash and salt.
    pub commitment: String,

    /// Precision of the revealed prefix.
    pub precision: GeohashPrecision,

    /// Creation time (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Expiry time; the commitment fails verification afterwards.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// Coarse geohash disclosed alongside the commitment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revealed_prefix: Option<String>,
}

impl LocationCommitment {
    /// Whether the commitment has expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the commitment has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The message covered by a commitment signature:
    /// `commitment|timestamp|expiresAt` with millisecond timestamps.
    #[must_use]
    pub fn signing_message(&self) -> String {
        format!(
            "{}|{}|{}",
            self.commitment,
            self.timestamp.timestamp_millis(),
            self.expires_at.timestamp_millis()
        )
    }

    /// Converts this commitment to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a commitment from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or the precision is out of
    /// range.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A commitment together with a signature over its signing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedCommitment {
    /// The signed commitment.
    #[serde(flatten)]
    pub commitment: LocationCommitment,

    /// Hex signature over [`LocationCommitment::signing_message`].
    pub signature: String,

    /// Hex x-only public key of the signer.
    pub signer_public_key: String,
}

impl SignedCommitment {
    /// Converts this signed commitment to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a signed commitment from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parameters for creating a commitment.
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use zkgps_core::commitment::CommitmentRequest;
/// use zkgps_core::location::{Coordinate, GeohashPrecision};
///
/// let request = CommitmentRequest::new(
///     Coordinate::new(37.7749, -122.4194).unwrap(),
///     GeohashPrecision::new(6).unwrap(),
///     "00112233445566778899aabbccddeeff",
/// )
/// .with_expiration(Duration::seconds(30));
/// assert_eq!(request.expiration, Duration::seconds(30));
/// ```
#[derive(Debug, Clone)]
pub struct CommitmentRequest {
    /// Location being committed to.
    pub coordinate: Coordinate,
    /// Precision of the revealed prefix.
    pub precision: GeohashPrecision,
    /// Secret salt (hex).
    pub salt: String,
    /// Lifetime of the commitment.
    pub expiration: Duration,
}

impl CommitmentRequest {
    /// Creates a request with the default 5-minute lifetime.
    #[must_use]
    pub fn new(coordinate: Coordinate, precision: GeohashPrecision, salt: impl Into<String>) -> Self {
        Self {
            coordinate,
            precision,
            salt: salt.into(),
            expiration: Duration::milliseconds(DEFAULT_COMMITMENT_TTL_MS),
        }
    }

    /// Sets the lifetime.
    #[must_use]
    pub const fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }
}
