//! Locally held location history for temporal proofs.

// Queue operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{ProofError, Result};
use super::types::TimeRange;
use crate::commitment::LocationCommitment;
use crate::location::Coordinate;

/// A commitment together with the opening that produced it.
///
/// The salt is wiped from memory on drop and hidden from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HistoryEntry {
    /// The published commitment.
    #[zeroize(skip)]
    pub commitment: LocationCommitment,
    /// The committed location.
    #[zeroize(skip)]
    pub coordinate: Coordinate,
    salt: String,
}

impl HistoryEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(commitment: LocationCommitment, coordinate: Coordinate, salt: impl Into<String>) -> Self {
        Self {
            commitment,
            coordinate,
            salt: salt.into(),
        }
    }

    /// The salt that opens the commitment.
    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }
}

impl std::fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("commitment", &self.commitment.commitment)
            .field("timestamp", &self.commitment.timestamp)
            .field("salt", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Time-ordered history of this device's commitments.
///
/// Entries older than the retention window are dropped by
/// [`LocationHistory::prune_at`] and on every insert.
#[derive(Debug)]
pub struct LocationHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    retention: Duration,
}

impl LocationHistory {
    /// Creates an empty history keeping entries for `retention`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for a non-positive retention.
    pub fn new(retention: Duration) -> Result<Self> {
        if retention <= Duration::zero() {
            return Err(ProofError::InvalidArgument(format!(
                "history retention must be positive, got {} ms",
                retention.num_milliseconds()
            )));
        }
        Ok(Self {
            entries: Mutex::new(VecDeque::new()),
            retention,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<HistoryEntry>>> {
        self.entries
            .lock()
            .map_err(|e| ProofError::Storage(format!("Failed to acquire history lock: {e}")))
    }

    /// The retention window.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        self.retention
    }

    /// Records an entry, keeping the history ordered by commitment time.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn record(&self, entry: HistoryEntry) -> Result<()> {
        let now = entry.commitment.timestamp.max(Utc::now());
        let mut entries = self.lock()?;
        let at = entries.partition_point(|e| e.commitment.timestamp <= entry.commitment.timestamp);
        entries.insert(at, entry);
        Self::drop_older_than(&mut entries, self.cutoff(now));
        Ok(())
    }

    /// Drops entries older than the retention window as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn prune_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.lock()?;
        Ok(Self::drop_older_than(&mut entries, self.cutoff(now)))
    }

    /// Drops entries older than the retention window.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn prune(&self) -> Result<usize> {
        self.prune_at(Utc::now())
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn drop_older_than(entries: &mut VecDeque<HistoryEntry>, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while entries
            .front()
            .is_some_and(|e| e.commitment.timestamp < cutoff)
        {
            entries.pop_front();
            removed += 1;
        }
        if removed > 0 {
            debug!("dropped {removed} history entries older than {cutoff}");
        }
        removed
    }

    /// Entries whose commitment timestamp lies inside `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn entries_between(&self, range: &TimeRange) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|e| range.contains(e.commitment.timestamp))
            .cloned()
            .collect())
    }

    /// Number of entries held.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the history is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the history lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
