//! In-memory keyed store of commitments and their salts.

// Map operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use zeroize::Zeroizing;

use super::error::{CommitmentError, Result};
use super::service::CommitmentService;
use super::types::{CommitmentRequest, LocationCommitment};
use crate::crypto::DEFAULT_SALT_BYTES;
use crate::location::{Coordinate, GeohashPrecision};

struct StoredCommitment {
    commitment: LocationCommitment,
    salt: Zeroizing<String>,
}

/// Commitments created by this device, keyed by commitment hash.
///
/// The store is an explicit object: construct one per protocol instance
/// and pass it where needed. Salts never leave the store except through
/// [`CommitmentStore::get_salt`], and the store itself is not serializable.
///
/// # Thread Safety
///
/// All operations lock an internal mutex, so a store can be shared through
/// an `Arc` between tasks.
pub struct CommitmentStore {
    service: CommitmentService,
    entries: Mutex<HashMap<String, StoredCommitment>>,
}

impl CommitmentStore {
    /// Creates an empty store that creates commitments with `service`.
    #[must_use]
    pub fn new(service: CommitmentService) -> Self {
        Self {
            service,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredCommitment>>> {
        self.entries.lock().map_err(|e| {
            CommitmentError::Storage(format!("Failed to acquire commitment store lock: {e}"))
        })
    }

    /// Creates a commitment with a fresh salt and stores both.
    ///
    /// # Errors
    ///
    /// Returns an error if salt generation or commitment creation fails.
    pub fn create_and_store(
        &self,
        coordinate: Coordinate,
        precision: GeohashPrecision,
        expiration: Duration,
    ) -> Result<LocationCommitment> {
        let salt = Zeroizing::new(self.service.generate_salt(DEFAULT_SALT_BYTES)?);
        let request = CommitmentRequest::new(coordinate, precision, salt.as_str())
            .with_expiration(expiration);
        let commitment = self.service.create_commitment(&request)?;

        self.lock()?.insert(
            commitment.commitment.clone(),
            StoredCommitment {
                commitment: commitment.clone(),
                salt,
            },
        );
        Ok(commitment)
    }

    /// Looks up a commitment by its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn get(&self, commitment_hash: &str) -> Result<Option<LocationCommitment>> {
        Ok(self
            .lock()?
            .get(commitment_hash)
            .map(|entry| entry.commitment.clone()))
    }

    /// Returns the salt for a commitment this store created.
    ///
    /// The salt is what lets a holder open the commitment; hand it only to
    /// parties entitled to verify the full location.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn get_salt(&self, commitment_hash: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(commitment_hash)
            .map(|entry| entry.salt.as_str().to_string()))
    }

    /// Removes every commitment expired as of now.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(Utc::now())
    }

    /// Removes every commitment expired as of `now`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.commitment.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("pruned {removed} expired commitments");
        }
        Ok(removed)
    }

    /// All unexpired commitments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn get_active(&self) -> Result<Vec<LocationCommitment>> {
        let now = Utc::now();
        let mut active: Vec<LocationCommitment> = self
            .lock()?
            .values()
            .filter(|entry| !entry.commitment.is_expired_at(now))
            .map(|entry| entry.commitment.clone())
            .collect();
        active.sort_by_key(|c| c.timestamp);
        Ok(active)
    }

    /// Number of stored commitments, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no commitments.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Spawns a background task that prunes expired commitments every
    /// `every`. The task stops once the last `Arc` to the store is dropped,
    /// or when the returned handle is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::Storage`] when called outside a tokio
    /// runtime.
    pub fn spawn_pruner(
        self: &Arc<Self>,
        every: std::time::Duration,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CommitmentError::Storage(format!("No tokio runtime for pruner: {e}")))?;
        let store = Arc::downgrade(self);

        Ok(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(e) = store.prune_expired() {
                    warn!("commitment pruner failed: {e}");
                }
            }
        }))
    }
}

impl std::fmt::Debug for CommitmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print salts
        let count = self.entries.lock().map(|e| e.len()).ok();
        f.debug_struct("CommitmentStore")
            .field("entries", &count)
            .finish_non_exhaustive()
    }
}
