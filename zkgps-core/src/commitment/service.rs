//! Creation and verification of location commitments.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use super::error::{CommitmentError, Result};
use super::types::{CommitmentRequest, LocationCommitment, SignedCommitment};
use crate::clock::now_ms;
use crate::crypto::hash::constant_time_eq;
use crate::crypto::{self, CryptoSuite, SigningKeypair};
use crate::location::{codec, Coordinate, GeohashPrecision};

/// Builds, signs and verifies [`LocationCommitment`]s.
///
/// The service holds no mutable state; it is cheap to clone and safe to
/// share across threads.
///
/// # Example
///
/// ```
/// use zkgps_core::commitment::{CommitmentRequest, CommitmentService};
/// use zkgps_core::crypto::CryptoSuite;
/// use zkgps_core::location::{Coordinate, GeohashPrecision};
///
/// let service = CommitmentService::new(CryptoSuite::secure());
/// let here = Coordinate::new(37.7749, -122.4194).unwrap();
/// let salt = service.generate_salt(32).unwrap();
///
/// let commitment = service
///     .create_commitment(&CommitmentRequest::new(here, GeohashPrecision::new(5).unwrap(), &salt))
///     .unwrap();
/// assert_eq!(commitment.revealed_prefix.as_deref(), Some("9q8yy"));
/// assert!(service.verify_commitment(&commitment, &here, &salt).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommitmentService {
    crypto: CryptoSuite,
}

impl CommitmentService {
    /// Creates a service over the given crypto suite.
    #[must_use]
    pub const fn new(crypto: CryptoSuite) -> Self {
        Self { crypto }
    }

    /// The crypto suite this service hashes and signs with.
    #[must_use]
    pub const fn crypto(&self) -> &CryptoSuite {
        &self.crypto
    }

    /// Generates a random hex salt of `len_bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::Crypto`] if the OS RNG is unavailable or
    /// the length is too short.
    pub fn generate_salt(&self, len_bytes: usize) -> Result<String> {
        Ok(crypto::generate_salt(len_bytes)?)
    }

    /// Hex digest of `message`.
    #[must_use]
    pub fn hash(&self, message: &str) -> String {
        self.crypto.hash_hex(message)
    }

    fn commitment_hash(&self, full_geohash: &str, salt: &str) -> String {
        self.hash(&format!("{full_geohash}|{salt}"))
    }

    /// Creates a commitment timestamped now.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::InvalidArgument`] for an empty salt or a
    /// non-positive expiration.
    pub fn create_commitment(&self, request: &CommitmentRequest) -> Result<LocationCommitment> {
        self.create_commitment_at(request, now_ms())
    }

    /// Creates a commitment timestamped `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::InvalidArgument`] for an empty salt or a
    /// non-positive expiration.
    pub fn create_commitment_at(
        &self,
        request: &CommitmentRequest,
        now: DateTime<Utc>,
    ) -> Result<LocationCommitment> {
        if request.salt.is_empty() {
            return Err(CommitmentError::InvalidArgument(
                "salt must not be empty".to_string(),
            ));
        }
        if request.expiration <= Duration::zero() {
            return Err(CommitmentError::InvalidArgument(format!(
                "expiration must be positive, got {} ms",
                request.expiration.num_milliseconds()
            )));
        }

        let expires_at = now.checked_add_signed(request.expiration).ok_or_else(|| {
            CommitmentError::InvalidArgument("expiration overflows the calendar".to_string())
        })?;
        let full_geohash = codec::encode_coordinate(&request.coordinate, GeohashPrecision::MAX)?;
        let commitment = LocationCommitment {
            commitment: self.commitment_hash(&full_geohash, &request.salt),
            precision: request.precision,
            timestamp: now,
            expires_at,
            revealed_prefix: Some(codec::truncate(&full_geohash, request.precision).to_string()),
        };

        debug!(
            "created commitment at precision {} expiring {}",
            commitment.precision, commitment.expires_at
        );
        Ok(commitment)
    }

    /// Verifies that `(coordinate, salt)` opens an unexpired commitment.
    ///
    /// Returns `Ok(false)` for an expired commitment or any mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error only if the coordinate cannot be geohash-encoded.
    pub fn verify_commitment(
        &self,
        commitment: &LocationCommitment,
        coordinate: &Coordinate,
        salt: &str,
    ) -> Result<bool> {
        self.verify_commitment_at(commitment, coordinate, salt, Utc::now())
    }

    /// [`Self::verify_commitment`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the coordinate cannot be geohash-encoded.
    pub fn verify_commitment_at(
        &self,
        commitment: &LocationCommitment,
        coordinate: &Coordinate,
        salt: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if commitment.is_expired_at(now) {
            debug!("commitment rejected: expired at {}", commitment.expires_at);
            return Ok(false);
        }
        self.opens(commitment, coordinate, salt)
    }

    /// Checks the commitment hash and revealed prefix, ignoring expiry.
    ///
    /// Used for locally held history where age is judged separately.
    ///
    /// # Errors
    ///
    /// Returns an error only if the coordinate cannot be geohash-encoded.
    pub fn opens(
        &self,
        commitment: &LocationCommitment,
        coordinate: &Coordinate,
        salt: &str,
    ) -> Result<bool> {
        let full_geohash = codec::encode_coordinate(coordinate, GeohashPrecision::MAX)?;
        let expected = self.commitment_hash(&full_geohash, salt);
        if !constant_time_eq(&expected, &commitment.commitment) {
            debug!("commitment rejected: hash mismatch");
            return Ok(false);
        }

        if let Some(prefix) = &commitment.revealed_prefix {
            if prefix != codec::truncate(&full_geohash, commitment.precision) {
                debug!("commitment rejected: revealed prefix mismatch");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Signs `commitment|timestamp|expiresAt` with `keypair`.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::Crypto`] if signing fails.
    pub fn sign_commitment(
        &self,
        commitment: &LocationCommitment,
        keypair: &SigningKeypair,
    ) -> Result<SignedCommitment> {
        let signature = self.crypto.sign(&commitment.signing_message(), keypair)?;
        Ok(SignedCommitment {
            commitment: commitment.clone(),
            signature,
            signer_public_key: keypair.pubkey_hex(),
        })
    }

    /// Checks expiry, then the signature against the embedded public key.
    #[must_use]
    pub fn verify_signed_commitment(&self, signed: &SignedCommitment) -> bool {
        self.verify_signed_commitment_at(signed, Utc::now())
    }

    /// [`Self::verify_signed_commitment`] evaluated at `now`.
    #[must_use]
    pub fn verify_signed_commitment_at(&self, signed: &SignedCommitment, now: DateTime<Utc>) -> bool {
        if signed.commitment.is_expired_at(now) {
            debug!("signed commitment rejected: expired");
            return false;
        }
        let valid = self.crypto.verify(
            &signed.commitment.signing_message(),
            &signed.signature,
            &signed.signer_public_key,
        );
        if !valid {
            debug!("signed commitment rejected: bad signature");
        }
        valid
    }
}
