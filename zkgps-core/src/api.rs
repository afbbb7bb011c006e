//! High-level entry point wiring the protocol components together.
//!
//! ```text
//! ZkGpsCore
//!     ├── TrustCircleManager   picks the precision per contact
//!     ├── CommitmentStore      creates and holds commitments + salts
//!     ├── LocationHistory      feeds temporal proofs (optional)
//!     └── ProofService         generates and verifies proofs
//! ```

// The limiter window needs to hold the lock for the duration of the check.
#![allow(clippy::significant_drop_tightening)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use thiserror::Error;

use crate::commitment::{CommitmentError, CommitmentService, CommitmentStore, SignedCommitment};
use crate::config::{ConfigError, ProtocolConfig};
use crate::crypto::{CryptoSuite, SigningKeypair};
use crate::location::{Coordinate, GeohashPrecision};
use crate::proof::{
    GroupMember, GroupProximityProof, HistoryEntry, LocationHistory, Proof, ProofError,
    ProofService, ProximityProof, Region, RegionProof, TemporalProof, TimeRange,
    VerificationContext,
};
use crate::trust::{TrustCircle, TrustCircleManager, TrustError, TrustStorage};

/// Error type for facade operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Commitment operation failed.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    /// Proof operation failed.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// Trust operation failed.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// Proof generation is disabled by configuration.
    #[error("Proof generation is disabled")]
    ProofsDisabled,

    /// The requested proof would use a precision below the configured minimum.
    #[error("Proof precision {requested} is coarser than the minimum {minimum}")]
    PrecisionTooCoarse {
        /// Precision the proof would use.
        requested: GeohashPrecision,
        /// Configured minimum.
        minimum: GeohashPrecision,
    },

    /// Location history is disabled by configuration.
    #[error("Location history is disabled")]
    HistoryDisabled,

    /// Too many proofs were requested in the current minute.
    #[error("Proof rate limit of {0} per minute exceeded")]
    RateLimited(u32),
}

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Fixed one-minute window limiter for proof generation.
#[derive(Debug)]
struct RateLimiter {
    per_minute: u32,
    window: Mutex<(u32, DateTime<Utc>)>,
}

impl RateLimiter {
    fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            window: Mutex::new((0, DateTime::<Utc>::MIN_UTC)),
        }
    }

    fn check_at(&self, now: DateTime<Utc>) -> Result<()> {
        let mut window = self.window.lock().map_err(|e| {
            CoreError::Proof(ProofError::Storage(format!(
                "Failed to acquire rate limiter lock: {e}"
            )))
        })?;
        if now - window.1 >= Duration::minutes(1) {
            *window = (0, now);
        }
        if window.0 >= self.per_minute {
            debug!("proof request rate limited");
            return Err(CoreError::RateLimited(self.per_minute));
        }
        window.0 += 1;
        Ok(())
    }
}

/// The protocol core for one user.
///
/// # Example
///
/// ```
/// use zkgps_core::config::ProtocolConfig;
/// use zkgps_core::crypto::SigningKeypair;
/// use zkgps_core::location::Coordinate;
/// use zkgps_core::ZkGpsCore;
///
/// let core = ZkGpsCore::new("alice", SigningKeypair::generate(), ProtocolConfig::default()).unwrap();
/// core.trust().add_to_circle("close", "bob").unwrap();
///
/// let here = Coordinate::new(37.7749, -122.4194).unwrap();
/// let signed = core.commit_location_for_contact("bob", &here, None).unwrap();
/// // "close" requires mutual membership and bob's circles are unknown.
/// assert!(signed.is_none());
///
/// core.trust().add_to_circle("friends", "carol").unwrap();
/// let signed = core.commit_location_for_contact("carol", &here, None).unwrap().unwrap();
/// assert_eq!(signed.commitment.revealed_prefix.as_deref(), Some("9q8yyk"));
/// ```
#[derive(Debug)]
pub struct ZkGpsCore {
    config: ProtocolConfig,
    keypair: SigningKeypair,
    commitments: CommitmentService,
    store: Arc<CommitmentStore>,
    proofs: ProofService,
    trust: TrustCircleManager,
    history: Option<LocationHistory>,
    limiter: RateLimiter,
}

impl ZkGpsCore {
    /// Creates a core with the secure crypto suite and one default circle
    /// per trust level.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for an invalid configuration.
    pub fn new(owner_id: impl Into<String>, keypair: SigningKeypair, config: ProtocolConfig) -> Result<Self> {
        Self::with_crypto(owner_id, keypair, config, CryptoSuite::secure())
    }

    /// Creates a core over an explicit crypto suite.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for an invalid configuration.
    pub fn with_crypto(
        owner_id: impl Into<String>,
        keypair: SigningKeypair,
        config: ProtocolConfig,
        crypto: CryptoSuite,
    ) -> Result<Self> {
        config.validate()?;
        let commitments = CommitmentService::new(crypto);
        let history = if config.location.enable_history {
            Some(LocationHistory::new(config.history_retention())?)
        } else {
            None
        };
        let core = Self {
            keypair,
            store: Arc::new(CommitmentStore::new(commitments.clone())),
            proofs: ProofService::new(commitments.clone()),
            commitments,
            trust: TrustCircleManager::with_default_circles(owner_id, &config)?,
            history,
            limiter: RateLimiter::new(config.location.query_rate_limit),
            config,
        };
        info!(
            "zkgps core ready for {} (history {})",
            core.trust.owner_id(),
            if core.history.is_some() { "on" } else { "off" }
        );
        Ok(core)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The trust circle manager.
    #[must_use]
    pub const fn trust(&self) -> &TrustCircleManager {
        &self.trust
    }

    /// The commitment store.
    #[must_use]
    pub const fn store(&self) -> &Arc<CommitmentStore> {
        &self.store
    }

    /// The proof service.
    #[must_use]
    pub const fn proofs(&self) -> &ProofService {
        &self.proofs
    }

    /// The location history, when enabled.
    #[must_use]
    pub const fn history(&self) -> Option<&LocationHistory> {
        self.history.as_ref()
    }

    /// Hex public key of this user.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        self.keypair.pubkey_hex()
    }

    // ==================== Commitments ====================

    /// Commits to `coordinate` at `precision`, stores the opening, records
    /// it in history and signs the result.
    ///
    /// # Errors
    ///
    /// Returns an error if commitment creation, history or signing fails.
    pub fn commit_location(
        &self,
        coordinate: &Coordinate,
        precision: GeohashPrecision,
    ) -> Result<SignedCommitment> {
        let commitment =
            self.store
                .create_and_store(*coordinate, precision, self.config.commitment_ttl())?;

        if let Some(history) = &self.history {
            let salt = self.store.get_salt(&commitment.commitment)?.ok_or_else(|| {
                CommitmentError::Storage("commitment vanished from store".to_string())
            })?;
            history.record(HistoryEntry::new(commitment.clone(), *coordinate, salt))?;
        }

        Ok(self.commitments.sign_commitment(&commitment, &self.keypair)?)
    }

    /// Commits to `coordinate` at the precision `contact_id` may see.
    ///
    /// Returns `None` when the contact may see nothing: unknown, paused, in
    /// no enabled circle, or failing the mutual membership check against
    /// `their_circles`.
    ///
    /// # Errors
    ///
    /// Returns an error if trust resolution or commitment creation fails.
    pub fn commit_location_for_contact(
        &self,
        contact_id: &str,
        coordinate: &Coordinate,
        their_circles: Option<&[TrustCircle]>,
    ) -> Result<Option<SignedCommitment>> {
        let Some(precision) = self.trust.get_precision_for_contact(contact_id)? else {
            debug!("no precision for {contact_id}; not sharing");
            return Ok(None);
        };
        if !self.trust.check_mutual_membership(contact_id, their_circles)? {
            return Ok(None);
        }
        self.commit_location(coordinate, precision).map(Some)
    }

    /// When the next update to `contact_id` is due, given the last one.
    ///
    /// Uses the contact's circle update interval, never less than the
    /// configured minimum. `None` when the contact receives no updates.
    ///
    /// # Errors
    ///
    /// Returns an error if trust resolution fails.
    pub fn next_update_due(
        &self,
        contact_id: &str,
        last_update: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        if self.trust.get_precision_for_contact(contact_id)?.is_none() {
            return Ok(None);
        }
        let interval = self
            .trust
            .get_update_interval_for_contact(contact_id)?
            .unwrap_or(self.config.location.min_update_interval)
            .max(self.config.location.min_update_interval);
        let interval = Duration::milliseconds(i64::try_from(interval).unwrap_or(i64::MAX));
        Ok(Some(
            last_update
                .checked_add_signed(interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        ))
    }

    // ==================== Proofs ====================

    fn admit_proof(&self, precision: GeohashPrecision, now: DateTime<Utc>) -> Result<()> {
        let location = &self.config.location;
        if !location.use_zk_proofs {
            return Err(CoreError::ProofsDisabled);
        }
        if precision < location.min_proof_precision {
            return Err(CoreError::PrecisionTooCoarse {
                requested: precision,
                minimum: location.min_proof_precision,
            });
        }
        self.limiter.check_at(now)
    }

    /// Proves proximity of `me` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProofsDisabled`], [`CoreError::PrecisionTooCoarse`]
    /// or [`CoreError::RateLimited`] when configuration forbids the proof,
    /// and [`CoreError::Proof`] if generation fails.
    pub fn prove_proximity(
        &self,
        me: &Coordinate,
        target: &Coordinate,
        max_distance: f64,
    ) -> Result<ProximityProof> {
        let precision = ProofService::radius_precision(target, max_distance)?;
        self.admit_proof(precision, Utc::now())?;
        Ok(self
            .proofs
            .generate_proximity_proof(me, target, max_distance, &self.keypair)?)
    }

    /// Proves that `me` lies inside `region`.
    ///
    /// # Errors
    ///
    /// See [`Self::prove_proximity`].
    pub fn prove_region(&self, me: &Coordinate, region: &Region) -> Result<RegionProof> {
        self.admit_proof(region.proof_precision(), Utc::now())?;
        Ok(self.proofs.generate_region_proof(me, region, &self.keypair)?)
    }

    /// Proves a past visit near `location` from the local history.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HistoryDisabled`] without history; otherwise see
    /// [`Self::prove_proximity`].
    pub fn prove_temporal(
        &self,
        location: &Coordinate,
        time_range: TimeRange,
        max_distance: f64,
    ) -> Result<TemporalProof> {
        let history = self.history.as_ref().ok_or(CoreError::HistoryDisabled)?;
        let precision = ProofService::radius_precision(location, max_distance)?;
        self.admit_proof(precision, Utc::now())?;
        Ok(self.proofs.generate_temporal_proof(
            history,
            location,
            time_range,
            max_distance,
            &self.keypair,
        )?)
    }

    /// Proves that `members` are mutually close.
    ///
    /// The precision floor applies to the precision the members' prefixes
    /// are actually compared at, which a short revealed prefix can lower.
    ///
    /// # Errors
    ///
    /// See [`Self::prove_proximity`].
    pub fn prove_group(&self, members: &[GroupMember], max_distance: f64) -> Result<GroupProximityProof> {
        let precision = ProofService::group_precision(members, max_distance)?;
        self.admit_proof(precision, Utc::now())?;
        Ok(self
            .proofs
            .generate_group_proof(members, max_distance, &self.keypair)?)
    }

    /// Verifies any proof received from another user.
    #[must_use]
    pub fn verify(&self, proof: &Proof, context: &VerificationContext<'_>) -> bool {
        self.proofs.verify_proof(proof, context)
    }

    // ==================== Persistence ====================

    /// Saves the trust configuration to `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if export or the database write fails.
    pub fn save_trust(&self, storage: &TrustStorage) -> Result<()> {
        storage.save_snapshot(&self.trust.export()?)?;
        Ok(())
    }

    /// Replaces the trust configuration with the one in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read or import fails.
    pub fn load_trust(&self, storage: &TrustStorage) -> Result<()> {
        self.trust.import(storage.load_snapshot()?)?;
        Ok(())
    }

    /// Drops expired commitments and history entries.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock is poisoned.
    pub fn prune(&self) -> Result<usize> {
        let mut removed = self.store.prune_expired()?;
        if let Some(history) = &self.history {
            removed += history.prune()?;
        }
        Ok(removed)
    }
}
