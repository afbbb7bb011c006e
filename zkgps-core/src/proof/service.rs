//! Generation and verification of location proofs.
//!
//! Every verification runs the same three checks, in order:
//!
//! | Check       | Fails when                                              |
//! |-------------|---------------------------------------------------------|
//! | Freshness   | the proof is older than the maximum age                 |
//! | Consistency | a recomputable payload field differs from the proof's   |
//! | Signature   | the signature does not verify under `proverPublicKey`   |
//!
//! The prover's `result` is accepted as asserted; see
//! [`TrustedAssertionProof`].

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::error::{ProofError, Result};
use super::history::LocationHistory;
use super::merkle::merkle_root;
use super::types::{
    decode_payload, encode_payload, CellSetPayload, GroupMember, GroupPayload,
    GroupProximityProof, Proof, ProximityProof, Region, RegionProof, TemporalPayload,
    TemporalProof, TimeRange, TrustedAssertionProof,
};
use crate::clock::now_ms;
use crate::commitment::CommitmentService;
use crate::crypto::hash::random_id;
use crate::crypto::{CryptoSuite, SigningKeypair, DEFAULT_SALT_BYTES};
use crate::location::{codec, Coordinate, GeohashPrecision};

/// Default maximum proof age (5 minutes).
pub const DEFAULT_MAX_PROOF_AGE_MS: i64 = 300_000;

/// How far in the future a proof timestamp may lie before it is rejected.
pub const MAX_CLOCK_SKEW_MS: i64 = 30_000;

/// Public inputs a verifier supplies for proofs that do not carry them.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationContext<'a> {
    /// Region definition for region proofs.
    pub region: Option<&'a Region>,
    /// Participant commitments for group proofs.
    pub members: Option<&'a [GroupMember]>,
}

impl<'a> VerificationContext<'a> {
    /// An empty context, sufficient for proximity and temporal proofs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            region: None,
            members: None,
        }
    }

    /// Sets the region definition.
    #[must_use]
    pub const fn with_region(mut self, region: &'a Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets the group members.
    #[must_use]
    pub const fn with_members(mut self, members: &'a [GroupMember]) -> Self {
        self.members = Some(members);
        self
    }
}

/// Cell set derived from public parameters.
struct DerivedCells {
    precision: GeohashPrecision,
    cells: BTreeSet<String>,
    root: String,
}

/// Builds and verifies the four proof kinds.
///
/// # Example
///
/// ```
/// use zkgps_core::commitment::CommitmentService;
/// use zkgps_core::crypto::{CryptoSuite, SigningKeypair};
/// use zkgps_core::location::Coordinate;
/// use zkgps_core::proof::ProofService;
///
/// let service = ProofService::new(CommitmentService::new(CryptoSuite::secure()));
/// let keypair = SigningKeypair::generate();
/// let me = Coordinate::new(37.7749, -122.4194).unwrap();
/// let cafe = Coordinate::new(37.7751, -122.4190).unwrap();
///
/// let proof = service.generate_proximity_proof(&me, &cafe, 500.0, &keypair).unwrap();
/// assert!(proof.result);
/// assert!(service.verify_proximity_proof(&proof));
/// ```
#[derive(Debug, Clone)]
pub struct ProofService {
    commitments: CommitmentService,
    max_age: Duration,
}

impl Default for ProofService {
    fn default() -> Self {
        Self::new(CommitmentService::default())
    }
}

impl ProofService {
    /// Creates a service with the default 5-minute maximum proof age.
    #[must_use]
    pub fn new(commitments: CommitmentService) -> Self {
        Self {
            commitments,
            max_age: Duration::milliseconds(DEFAULT_MAX_PROOF_AGE_MS),
        }
    }

    /// Sets the maximum proof age.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// The maximum proof age.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    fn crypto(&self) -> &CryptoSuite {
        self.commitments.crypto()
    }

    fn validate_distance(max_distance: f64) -> Result<()> {
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(ProofError::InvalidArgument(format!(
                "max distance {max_distance} must be a positive finite number of meters"
            )));
        }
        Ok(())
    }

    /// Precision at which a circle of `max_distance` meters around `center`
    /// is covered by proximity and temporal proofs.
    ///
    /// Usually [`codec::precision_for_radius`], but coarser near the poles
    /// where the finer covering would be too large.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for a non-positive distance
    /// or a circle that cannot be covered at any precision.
    pub fn radius_precision(center: &Coordinate, max_distance: f64) -> Result<GeohashPrecision> {
        Self::validate_distance(max_distance)?;
        Ok(codec::cover_radius(center, max_distance)?.0)
    }

    fn radius_cells(&self, center: &Coordinate, max_distance: f64) -> Result<DerivedCells> {
        let (precision, cells) = codec::cover_radius(center, max_distance)?;
        let root = merkle_root(&cells, self.crypto().hasher());
        Ok(DerivedCells {
            precision,
            cells,
            root,
        })
    }

    fn region_cells(&self, region: &Region) -> Result<DerivedCells> {
        let precision = region.proof_precision();
        let cells = codec::cells_in_polygon(&region.polygon, precision)?;
        let root = merkle_root(&cells, self.crypto().hasher());
        Ok(DerivedCells {
            precision,
            cells,
            root,
        })
    }

    fn cell_set_payload(&self, me: &Coordinate, derived: &DerivedCells) -> Result<(bool, String)> {
        let my_cell = codec::encode_coordinate(me, derived.precision)?;
        let salt = self.commitments.generate_salt(DEFAULT_SALT_BYTES)?;
        let payload = CellSetPayload {
            precision: derived.precision,
            valid_cell_count: derived.cells.len(),
            cell_commitment: self.commitments.hash(&format!("{my_cell}{salt}")),
            valid_cells_root: derived.root.clone(),
        };
        Ok((derived.cells.contains(&my_cell), encode_payload(&payload)?))
    }

    // ------------------------------------------------------------------
    // Proximity
    // ------------------------------------------------------------------

    /// Proves (by assertion) that `me` is within `max_distance` meters of
    /// `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for a non-positive distance or
    /// a covering that is too large, and [`ProofError::Crypto`] if signing
    /// or randomness fails.
    pub fn generate_proximity_proof(
        &self,
        me: &Coordinate,
        target: &Coordinate,
        max_distance: f64,
        keypair: &SigningKeypair,
    ) -> Result<ProximityProof> {
        self.generate_proximity_proof_at(me, target, max_distance, keypair, now_ms())
    }

    /// [`Self::generate_proximity_proof`] timestamped `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_proximity_proof`].
    pub fn generate_proximity_proof_at(
        &self,
        me: &Coordinate,
        target: &Coordinate,
        max_distance: f64,
        keypair: &SigningKeypair,
        now: DateTime<Utc>,
    ) -> Result<ProximityProof> {
        Self::validate_distance(max_distance)?;
        let derived = self.radius_cells(target, max_distance)?;
        let (result, payload) = self.cell_set_payload(me, &derived)?;

        let mut proof = ProximityProof {
            proof_id: random_id()?,
            timestamp: now,
            prover_public_key: keypair.pubkey_hex(),
            target_point: *target,
            max_distance,
            result,
            proof: payload,
            signature: String::new(),
        };
        proof.signature = self.crypto().sign(&proof.signing_message(), keypair)?;
        debug!(
            "generated proximity proof {} at precision {} over {} cells",
            proof.proof_id,
            derived.precision,
            derived.cells.len()
        );
        Ok(proof)
    }

    /// Verifies a proximity proof now.
    #[must_use]
    pub fn verify_proximity_proof(&self, proof: &ProximityProof) -> bool {
        self.verify_proximity_proof_at(proof, Utc::now())
    }

    /// Verifies a proximity proof as of `now`.
    #[must_use]
    pub fn verify_proximity_proof_at(&self, proof: &ProximityProof, now: DateTime<Utc>) -> bool {
        if !self.is_fresh(proof, now) {
            return false;
        }
        let Ok(derived) = self.radius_cells(&proof.target_point, proof.max_distance) else {
            debug!("proximity proof {} rejected: invalid parameters", proof.proof_id);
            return false;
        };
        Self::cell_set_matches(&proof.proof, &derived, &proof.proof_id)
            && self.verify_proof_signature(proof)
    }

    // ------------------------------------------------------------------
    // Region
    // ------------------------------------------------------------------

    /// Proves (by assertion) that `me` lies inside `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for a region that cannot be
    /// sampled, and [`ProofError::Crypto`] if signing or randomness fails.
    pub fn generate_region_proof(
        &self,
        me: &Coordinate,
        region: &Region,
        keypair: &SigningKeypair,
    ) -> Result<RegionProof> {
        self.generate_region_proof_at(me, region, keypair, now_ms())
    }

    /// [`Self::generate_region_proof`] timestamped `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_region_proof`].
    pub fn generate_region_proof_at(
        &self,
        me: &Coordinate,
        region: &Region,
        keypair: &SigningKeypair,
        now: DateTime<Utc>,
    ) -> Result<RegionProof> {
        let derived = self.region_cells(region)?;
        let (result, payload) = self.cell_set_payload(me, &derived)?;

        let mut proof = RegionProof {
            proof_id: random_id()?,
            timestamp: now,
            prover_public_key: keypair.pubkey_hex(),
            region_id: region.id.clone(),
            result,
            proof: payload,
            signature: String::new(),
        };
        proof.signature = self.crypto().sign(&proof.signing_message(), keypair)?;
        debug!(
            "generated region proof {} for {} over {} cells",
            proof.proof_id,
            region.id,
            derived.cells.len()
        );
        Ok(proof)
    }

    /// Verifies a region proof against the verifier's own region definition.
    #[must_use]
    pub fn verify_region_proof(&self, proof: &RegionProof, region: &Region) -> bool {
        self.verify_region_proof_at(proof, region, Utc::now())
    }

    /// Verifies a region proof as of `now`.
    #[must_use]
    pub fn verify_region_proof_at(
        &self,
        proof: &RegionProof,
        region: &Region,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_fresh(proof, now) {
            return false;
        }
        if proof.region_id != region.id {
            debug!(
                "region proof {} rejected: region {} != {}",
                proof.proof_id, proof.region_id, region.id
            );
            return false;
        }
        let Ok(derived) = self.region_cells(region) else {
            debug!("region proof {} rejected: invalid region", proof.proof_id);
            return false;
        };
        Self::cell_set_matches(&proof.proof, &derived, &proof.proof_id)
            && self.verify_proof_signature(proof)
    }

    // ------------------------------------------------------------------
    // Group
    // ------------------------------------------------------------------

    /// Precision at which group members' prefixes are compared.
    ///
    /// This is the finer of the distance-derived precision and the shortest
    /// revealed prefix, whichever is coarser. When a member revealed less
    /// than the distance calls for, the comparison happens at the coarser
    /// precision and the proof asserts less than `max_distance` suggests.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] naming the first member that
    /// revealed no prefix, or an empty one.
    pub fn group_precision(members: &[GroupMember], max_distance: f64) -> Result<GeohashPrecision> {
        let mut shortest = usize::MAX;
        for member in members {
            match member.commitment.revealed_prefix.as_deref() {
                None => {
                    return Err(ProofError::InvalidArgument(format!(
                        "participant {} has no revealed prefix to compare",
                        member.participant_id
                    )))
                }
                Some("") => {
                    return Err(ProofError::InvalidArgument(format!(
                        "participant {} revealed an empty prefix, leaving no common prefix to compare",
                        member.participant_id
                    )))
                }
                Some(prefix) => shortest = shortest.min(prefix.len()),
            }
        }
        let wanted = codec::precision_for_radius(max_distance);
        let len = u8::try_from(shortest.min(wanted.len())).unwrap_or(wanted.get());
        Ok(GeohashPrecision::new(len)?)
    }

    fn group_payload(&self, members: &[GroupMember], precision: GeohashPrecision) -> GroupPayload {
        GroupPayload {
            precision,
            participant_count: members.len(),
            commitments_root: merkle_root(
                members.iter().map(|m| m.commitment.commitment.as_str()),
                self.crypto().hasher(),
            ),
        }
    }

    /// Proves (by assertion) that all members are mutually within
    /// `max_distance` meters, judged on their revealed prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for fewer than two members, a
    /// member without a revealed prefix, or a non-positive distance, and
    /// [`ProofError::Crypto`] if signing fails.
    pub fn generate_group_proof(
        &self,
        members: &[GroupMember],
        max_distance: f64,
        keypair: &SigningKeypair,
    ) -> Result<GroupProximityProof> {
        self.generate_group_proof_at(members, max_distance, keypair, now_ms())
    }

    /// [`Self::generate_group_proof`] timestamped `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_group_proof`].
    pub fn generate_group_proof_at(
        &self,
        members: &[GroupMember],
        max_distance: f64,
        keypair: &SigningKeypair,
        now: DateTime<Utc>,
    ) -> Result<GroupProximityProof> {
        Self::validate_distance(max_distance)?;
        if members.len() < 2 {
            return Err(ProofError::InvalidArgument(format!(
                "group proof needs at least 2 participants, got {}",
                members.len()
            )));
        }
        let precision = Self::group_precision(members, max_distance)?;

        let wanted = codec::precision_for_radius(max_distance);
        if precision < wanted {
            warn!(
                "group proof degraded from precision {wanted} to {precision}: a participant revealed a shorter prefix"
            );
        }

        let prefixes: Vec<&str> = members
            .iter()
            .filter_map(|m| m.commitment.revealed_prefix.as_deref())
            .collect();
        let result = prefixes
            .iter()
            .enumerate()
            .all(|(i, a)| prefixes[i + 1..].iter().all(|b| codec::shares_prefix(a, b, precision.len())));

        let mut proof = GroupProximityProof {
            proof_id: random_id()?,
            timestamp: now,
            prover_public_key: keypair.pubkey_hex(),
            participants: members.iter().map(|m| m.participant_id.clone()).collect(),
            max_distance,
            result,
            proof: encode_payload(&self.group_payload(members, precision))?,
            signature: String::new(),
        };
        proof.signature = self.crypto().sign(&proof.signing_message(), keypair)?;
        debug!(
            "generated group proof {} for {} participants at precision {precision}",
            proof.proof_id,
            members.len()
        );
        Ok(proof)
    }

    /// Verifies a group proof against the verifier's copy of the members'
    /// commitments.
    #[must_use]
    pub fn verify_group_proof(&self, proof: &GroupProximityProof, members: &[GroupMember]) -> bool {
        self.verify_group_proof_at(proof, members, Utc::now())
    }

    /// Verifies a group proof as of `now`.
    #[must_use]
    pub fn verify_group_proof_at(
        &self,
        proof: &GroupProximityProof,
        members: &[GroupMember],
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_fresh(proof, now) {
            return false;
        }
        let ids_match = proof.participants.len() == members.len()
            && proof
                .participants
                .iter()
                .zip(members)
                .all(|(id, m)| *id == m.participant_id);
        if !ids_match {
            debug!("group proof {} rejected: participant mismatch", proof.proof_id);
            return false;
        }
        let precision = match Self::group_precision(members, proof.max_distance) {
            Ok(precision) => precision,
            Err(e) => {
                debug!("group proof {} rejected: {e}", proof.proof_id);
                return false;
            }
        };
        let expected = self.group_payload(members, precision);
        let Some(claimed) = decode_payload::<GroupPayload>(&proof.proof) else {
            debug!("group proof {} rejected: malformed payload", proof.proof_id);
            return false;
        };
        if claimed != expected {
            debug!("group proof {} rejected: payload mismatch", proof.proof_id);
            return false;
        }
        self.verify_proof_signature(proof)
    }

    // ------------------------------------------------------------------
    // Temporal
    // ------------------------------------------------------------------

    /// Proves (by assertion) that some entry of `history` inside
    /// `time_range` lies within `max_distance` meters of `location`.
    ///
    /// Only entries whose stored opening reproduces their commitment count.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for an inverted time range or
    /// non-positive distance, [`ProofError::Storage`] if the history is
    /// unavailable, and [`ProofError::Crypto`] if signing fails.
    pub fn generate_temporal_proof(
        &self,
        history: &LocationHistory,
        location: &Coordinate,
        time_range: TimeRange,
        max_distance: f64,
        keypair: &SigningKeypair,
    ) -> Result<TemporalProof> {
        self.generate_temporal_proof_at(history, location, time_range, max_distance, keypair, now_ms())
    }

    /// [`Self::generate_temporal_proof`] timestamped `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_temporal_proof`].
    pub fn generate_temporal_proof_at(
        &self,
        history: &LocationHistory,
        location: &Coordinate,
        time_range: TimeRange,
        max_distance: f64,
        keypair: &SigningKeypair,
        now: DateTime<Utc>,
    ) -> Result<TemporalProof> {
        Self::validate_distance(max_distance)?;
        let time_range = TimeRange::new(time_range.start, time_range.end)?;
        let derived = self.radius_cells(location, max_distance)?;

        let entries: Vec<_> = history
            .entries_between(&time_range)?
            .into_iter()
            .filter(|e| matches!(self.commitments.opens(&e.commitment, &e.coordinate, e.salt()), Ok(true)))
            .collect();

        let mut result = false;
        for entry in &entries {
            let cell = codec::encode_coordinate(&entry.coordinate, derived.precision)?;
            if derived.cells.contains(&cell) {
                result = true;
                break;
            }
        }

        let payload = TemporalPayload {
            precision: derived.precision,
            valid_cell_count: derived.cells.len(),
            valid_cells_root: derived.root.clone(),
            entry_count: entries.len(),
            history_root: merkle_root(
                entries.iter().map(|e| e.commitment.commitment.as_str()),
                self.crypto().hasher(),
            ),
        };

        let mut proof = TemporalProof {
            proof_id: random_id()?,
            timestamp: now,
            prover_public_key: keypair.pubkey_hex(),
            location: *location,
            time_range,
            max_distance,
            result,
            proof: encode_payload(&payload)?,
            signature: String::new(),
        };
        proof.signature = self.crypto().sign(&proof.signing_message(), keypair)?;
        debug!(
            "generated temporal proof {} over {} history entries",
            proof.proof_id,
            entries.len()
        );
        Ok(proof)
    }

    /// Verifies a temporal proof now.
    #[must_use]
    pub fn verify_temporal_proof(&self, proof: &TemporalProof) -> bool {
        self.verify_temporal_proof_at(proof, Utc::now())
    }

    /// Verifies a temporal proof as of `now`.
    ///
    /// The history root cannot be recomputed without the prover's history;
    /// only the cell-set fields are checked. `historyRoot` and `entryCount`
    /// in the payload are the prover's word and pass unverified.
    #[must_use]
    pub fn verify_temporal_proof_at(&self, proof: &TemporalProof, now: DateTime<Utc>) -> bool {
        if !self.is_fresh(proof, now) {
            return false;
        }
        if proof.time_range.start > proof.time_range.end {
            debug!("temporal proof {} rejected: inverted time range", proof.proof_id);
            return false;
        }
        let Ok(derived) = self.radius_cells(&proof.location, proof.max_distance) else {
            debug!("temporal proof {} rejected: invalid parameters", proof.proof_id);
            return false;
        };
        let Some(payload) = decode_payload::<TemporalPayload>(&proof.proof) else {
            debug!("temporal proof {} rejected: malformed payload", proof.proof_id);
            return false;
        };
        if payload.precision != derived.precision
            || payload.valid_cell_count != derived.cells.len()
            || payload.valid_cells_root != derived.root
        {
            debug!("temporal proof {} rejected: cell set mismatch", proof.proof_id);
            return false;
        }
        self.verify_proof_signature(proof)
    }

    // ------------------------------------------------------------------
    // Shared checks
    // ------------------------------------------------------------------

    /// Checks only the signature of a proof against its prover key.
    #[must_use]
    pub fn verify_proof_signature(&self, proof: &dyn TrustedAssertionProof) -> bool {
        let valid = self.crypto().verify(
            &proof.signing_message(),
            proof.signature(),
            proof.prover_public_key(),
        );
        if !valid {
            debug!("proof {} rejected: bad signature", proof.proof_id());
        }
        valid
    }

    /// Verifies any proof, taking region and group inputs from `context`.
    ///
    /// Returns `false` when the context lacks the input a variant needs.
    ///
    /// Every variant is a signed assertion: a `true` result means the
    /// prover's key signed it and the recomputable payload fields match.
    /// For temporal proofs that excludes `historyRoot` and `entryCount`,
    /// which a verifier without the prover's history cannot check.
    #[must_use]
    pub fn verify_proof(&self, proof: &Proof, context: &VerificationContext<'_>) -> bool {
        self.verify_proof_at(proof, context, Utc::now())
    }

    /// [`Self::verify_proof`] evaluated at `now`.
    #[must_use]
    pub fn verify_proof_at(
        &self,
        proof: &Proof,
        context: &VerificationContext<'_>,
        now: DateTime<Utc>,
    ) -> bool {
        match proof {
            Proof::Proximity(p) => self.verify_proximity_proof_at(p, now),
            Proof::Temporal(p) => self.verify_temporal_proof_at(p, now),
            Proof::Region(p) => context
                .region
                .is_some_and(|region| self.verify_region_proof_at(p, region, now)),
            Proof::Group(p) => context
                .members
                .is_some_and(|members| self.verify_group_proof_at(p, members, now)),
        }
    }

    fn is_fresh(&self, proof: &dyn TrustedAssertionProof, now: DateTime<Utc>) -> bool {
        let age = now - proof.timestamp();
        if age > self.max_age {
            debug!(
                "proof {} rejected: {} ms old",
                proof.proof_id(),
                age.num_milliseconds()
            );
            return false;
        }
        if -age > Duration::milliseconds(MAX_CLOCK_SKEW_MS) {
            debug!("proof {} rejected: timestamp in the future", proof.proof_id());
            return false;
        }
        true
    }

    fn cell_set_matches(payload: &str, derived: &DerivedCells, proof_id: &str) -> bool {
        let Some(payload) = decode_payload::<CellSetPayload>(payload) else {
            debug!("proof {proof_id} rejected: malformed payload");
            return false;
        };
        let matches = payload.precision == derived.precision
            && payload.valid_cell_count == derived.cells.len()
            && payload.valid_cells_root == derived.root
            && !payload.cell_commitment.is_empty();
        if !matches {
            debug!("proof {proof_id} rejected: cell set mismatch");
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::history::HistoryEntry;

    fn service() -> ProofService {
        ProofService::new(CommitmentService::new(CryptoSuite::secure()))
    }

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn sf() -> Coordinate {
        coord(37.7749, -122.4194)
    }

    fn square(id: &str, lat: f64, lng: f64, size: f64) -> Region {
        Region::new(
            id,
            vec![
                coord(lat, lng),
                coord(lat, lng + size),
                coord(lat + size, lng + size),
                coord(lat + size, lng),
            ],
        )
        .unwrap()
    }

    #[test]
    fn proximity_near_is_true_and_verifies() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let proof = svc
            .generate_proximity_proof(&sf(), &coord(37.7752, -122.4190), 1_000.0, &kp)
            .unwrap();
        assert!(proof.result);
        assert_eq!(proof.prover_public_key, kp.pubkey_hex());
        assert!(svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn proximity_far_is_false_but_still_verifies() {
        let svc = service();
        let kp = SigningKeypair::generate();
        // Roughly 10 km away with a 1 km limit.
        let proof = svc
            .generate_proximity_proof(&sf(), &coord(37.8649, -122.4194), 1_000.0, &kp)
            .unwrap();
        assert!(!proof.result);
        assert!(svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn proximity_payload_shape() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let proof = svc
            .generate_proximity_proof(&sf(), &sf(), 1_000.0, &kp)
            .unwrap();
        let payload: CellSetPayload = decode_payload(&proof.proof).unwrap();
        assert_eq!(payload.precision.get(), 6);
        assert!(payload.valid_cell_count >= 1);
        assert_eq!(payload.cell_commitment.len(), 64);
    }

    #[test]
    fn stale_proof_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let proof = svc
            .generate_proximity_proof_at(&sf(), &sf(), 500.0, &kp, now)
            .unwrap();
        assert!(svc.verify_proximity_proof_at(&proof, now + Duration::minutes(4)));
        assert!(!svc.verify_proximity_proof_at(&proof, now + Duration::minutes(6)));
    }

    #[test]
    fn future_proof_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let proof = svc
            .generate_proximity_proof_at(&sf(), &sf(), 500.0, &kp, now + Duration::minutes(2))
            .unwrap();
        assert!(!svc.verify_proximity_proof_at(&proof, now));
    }

    #[test]
    fn custom_max_age() {
        let svc = service().with_max_age(Duration::seconds(10));
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let proof = svc
            .generate_proximity_proof_at(&sf(), &sf(), 500.0, &kp, now)
            .unwrap();
        assert!(!svc.verify_proximity_proof_at(&proof, now + Duration::seconds(11)));
    }

    #[test]
    fn tampered_max_distance_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let mut proof = svc
            .generate_proximity_proof(&sf(), &sf(), 1_000.0, &kp)
            .unwrap();
        proof.max_distance = 5_000.0;
        assert!(!svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn tampered_result_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let mut proof = svc
            .generate_proximity_proof(&sf(), &coord(37.8649, -122.4194), 1_000.0, &kp)
            .unwrap();
        proof.result = true;
        assert!(!svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn tampered_payload_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let mut proof = svc
            .generate_proximity_proof(&sf(), &sf(), 1_000.0, &kp)
            .unwrap();
        let mut payload: CellSetPayload = decode_payload(&proof.proof).unwrap();
        payload.valid_cell_count += 1;
        proof.proof = encode_payload(&payload).unwrap();
        assert!(!svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn malformed_payload_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let mut proof = svc
            .generate_proximity_proof(&sf(), &sf(), 1_000.0, &kp)
            .unwrap();
        proof.proof = "not json".to_string();
        assert!(!svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn wrong_key_rejected() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let mut proof = svc
            .generate_proximity_proof(&sf(), &sf(), 1_000.0, &kp)
            .unwrap();
        proof.prover_public_key = SigningKeypair::generate().pubkey_hex();
        assert!(!svc.verify_proof_signature(&proof));
    }

    #[test]
    fn proximity_rejects_bad_distance() {
        let svc = service();
        let kp = SigningKeypair::generate();
        for d in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                svc.generate_proximity_proof(&sf(), &sf(), d, &kp),
                Err(ProofError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn region_inside_and_outside() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let region = square("park", 37.77, -122.43, 0.02);

        let inside = svc.generate_region_proof(&coord(37.78, -122.42), &region, &kp).unwrap();
        assert!(inside.result);
        assert!(svc.verify_region_proof(&inside, &region));

        let outside = svc.generate_region_proof(&coord(37.90, -122.20), &region, &kp).unwrap();
        assert!(!outside.result);
        assert!(svc.verify_region_proof(&outside, &region));
    }

    #[test]
    fn region_id_must_match() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let region = square("park", 37.77, -122.43, 0.02);
        let other = square("lake", 37.77, -122.43, 0.02);
        let proof = svc.generate_region_proof(&coord(37.78, -122.42), &region, &kp).unwrap();
        assert!(!svc.verify_region_proof(&proof, &other));
    }

    #[test]
    fn region_definition_must_match() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let region = square("park", 37.77, -122.43, 0.02);
        let moved = square("park", 37.70, -122.43, 0.02);
        let proof = svc.generate_region_proof(&coord(37.78, -122.42), &region, &kp).unwrap();
        assert!(!svc.verify_region_proof(&proof, &moved));
    }

    fn member(id: &str, prefix: &str) -> GroupMember {
        let now = now_ms();
        GroupMember {
            participant_id: id.to_string(),
            commitment: crate::commitment::LocationCommitment {
                commitment: format!("{id}-hash"),
                precision: GeohashPrecision::new(u8::try_from(prefix.len()).unwrap()).unwrap(),
                timestamp: now,
                expires_at: now + Duration::minutes(5),
                revealed_prefix: Some(prefix.to_string()),
            },
        }
    }

    #[test]
    fn group_all_close() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let members = vec![member("a", "9q8yyk"), member("b", "9q8yyk"), member("c", "9q8yyk")];
        let proof = svc.generate_group_proof(&members, 1_000.0, &kp).unwrap();
        assert!(proof.result);
        assert_eq!(proof.participants, vec!["a", "b", "c"]);
        assert!(svc.verify_group_proof(&proof, &members));
    }

    #[test]
    fn group_one_apart() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let members = vec![member("a", "9q8yyk"), member("b", "dr5reg")];
        let proof = svc.generate_group_proof(&members, 1_000.0, &kp).unwrap();
        assert!(!proof.result);
        assert!(svc.verify_group_proof(&proof, &members));
    }

    #[test]
    fn group_degrades_to_shortest_prefix() {
        let svc = service();
        let kp = SigningKeypair::generate();
        // Differ at the 5th character, but one member revealed only 4.
        let members = vec![member("a", "9q8yyk"), member("b", "9q8y")];
        let proof = svc.generate_group_proof(&members, 1_000.0, &kp).unwrap();
        let payload: GroupPayload = decode_payload(&proof.proof).unwrap();
        assert_eq!(payload.precision.get(), 4);
        assert!(proof.result);
    }

    #[test]
    fn group_requires_two_members_with_prefixes() {
        let svc = service();
        let kp = SigningKeypair::generate();
        assert!(matches!(
            svc.generate_group_proof(&[member("a", "9q8yyk")], 1_000.0, &kp),
            Err(ProofError::InvalidArgument(_))
        ));
        let mut hidden = member("b", "9q8yyk");
        hidden.commitment.revealed_prefix = None;
        assert!(matches!(
            svc.generate_group_proof(&[member("a", "9q8yyk"), hidden], 1_000.0, &kp),
            Err(ProofError::InvalidArgument(_))
        ));
    }

    #[test]
    fn group_errors_name_the_prefix_problem() {
        let svc = service();
        let kp = SigningKeypair::generate();

        let mut hidden = member("b", "9q8yyk");
        hidden.commitment.revealed_prefix = None;
        let err = svc
            .generate_group_proof(&[member("a", "9q8yyk"), hidden], 1_000.0, &kp)
            .unwrap_err()
            .to_string();
        assert!(err.contains("participant b has no revealed prefix"), "{err}");

        let mut blank = member("c", "9q8yyk");
        blank.commitment.revealed_prefix = Some(String::new());
        let members = [member("a", "9q8yyk"), blank];
        let err = svc
            .generate_group_proof(&members, 1_000.0, &kp)
            .unwrap_err()
            .to_string();
        assert!(err.contains("participant c revealed an empty prefix"), "{err}");
        assert!(!err.contains("radius"), "{err}");
        assert!(ProofService::group_precision(&members, 1_000.0).is_err());
    }

    #[test]
    fn group_precision_is_public_and_degrades() {
        let members = [member("a", "9q8yyk"), member("b", "9q8")];
        assert_eq!(ProofService::group_precision(&members, 1_000.0).unwrap().get(), 3);
        let members = [member("a", "9q8yyk"), member("b", "9q8yyk")];
        assert_eq!(ProofService::group_precision(&members, 1_000.0).unwrap().get(), 6);
    }

    #[test]
    fn proximity_near_pole_uses_coarser_cover() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let target = coord(89.999, 10.0);
        let me = coord(89.9995, 40.0);

        let precision = ProofService::radius_precision(&target, 1_000.0).unwrap();
        assert!(precision < codec::precision_for_radius(1_000.0));

        let proof = svc.generate_proximity_proof(&me, &target, 1_000.0, &kp).unwrap();
        assert!(proof.result);
        let payload: CellSetPayload = decode_payload(&proof.proof).unwrap();
        assert_eq!(payload.precision, precision);
        assert!(svc.verify_proximity_proof(&proof));
    }

    #[test]
    fn group_verification_needs_same_members() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let members = vec![member("a", "9q8yyk"), member("b", "9q8yyk")];
        let proof = svc.generate_group_proof(&members, 1_000.0, &kp).unwrap();
        let swapped = vec![member("a", "9q8yyk"), member("x", "9q8yyk")];
        assert!(!svc.verify_group_proof(&proof, &swapped));
        assert!(!svc.verify_group_proof(&proof, &members[..1]));
    }

    fn history_with(svc: &ProofService, points: &[(Coordinate, DateTime<Utc>)]) -> LocationHistory {
        let history = LocationHistory::new(Duration::days(1)).unwrap();
        let commitments = &svc.commitments;
        for (point, at) in points {
            let salt = commitments.generate_salt(DEFAULT_SALT_BYTES).unwrap();
            let request = crate::commitment::CommitmentRequest::new(
                *point,
                GeohashPrecision::new(6).unwrap(),
                salt.as_str(),
            );
            let c = commitments.create_commitment_at(&request, *at).unwrap();
            history.record(HistoryEntry::new(c, *point, salt)).unwrap();
        }
        history
    }

    #[test]
    fn temporal_finds_visit_in_range() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let history = history_with(
            &svc,
            &[
                (coord(40.7128, -74.0060), now - Duration::hours(3)),
                (sf(), now - Duration::hours(2)),
                (coord(40.7128, -74.0060), now - Duration::hours(1)),
            ],
        );
        let range = TimeRange::new(now - Duration::minutes(150), now - Duration::minutes(90)).unwrap();
        let proof = svc
            .generate_temporal_proof(&history, &sf(), range, 1_000.0, &kp)
            .unwrap();
        assert!(proof.result);
        let payload: TemporalPayload = decode_payload(&proof.proof).unwrap();
        assert_eq!(payload.entry_count, 1);
        assert!(svc.verify_temporal_proof(&proof));
    }

    #[test]
    fn temporal_history_fields_are_prover_asserted() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let history = history_with(&svc, &[(sf(), now - Duration::hours(2))]);
        let range = TimeRange::new(now - Duration::hours(3), now).unwrap();
        let mut proof = svc
            .generate_temporal_proof(&history, &sf(), range, 1_000.0, &kp)
            .unwrap();

        let mut payload: TemporalPayload = decode_payload(&proof.proof).unwrap();
        payload.history_root = "00".repeat(32);
        payload.entry_count += 10;
        proof.proof = encode_payload(&payload).unwrap();
        assert!(svc.verify_temporal_proof(&proof));

        payload.valid_cell_count += 1;
        proof.proof = encode_payload(&payload).unwrap();
        assert!(!svc.verify_temporal_proof(&proof));
    }

    #[test]
    fn temporal_visit_outside_range_is_false() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let history = history_with(&svc, &[(sf(), now - Duration::hours(5))]);
        let range = TimeRange::new(now - Duration::hours(1), now).unwrap();
        let proof = svc
            .generate_temporal_proof(&history, &sf(), range, 1_000.0, &kp)
            .unwrap();
        assert!(!proof.result);
        assert!(svc.verify_temporal_proof(&proof));
    }

    #[test]
    fn temporal_ignores_entries_that_do_not_open() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let history = LocationHistory::new(Duration::days(1)).unwrap();
        let salt = svc.commitments.generate_salt(DEFAULT_SALT_BYTES).unwrap();
        let request = crate::commitment::CommitmentRequest::new(
            coord(40.7128, -74.0060),
            GeohashPrecision::new(6).unwrap(),
            salt.as_str(),
        );
        let c = svc.commitments.create_commitment_at(&request, now).unwrap();
        // Claims to have been in SF, but the commitment is for New York.
        history.record(HistoryEntry::new(c, sf(), salt)).unwrap();

        let range = TimeRange::new(now - Duration::hours(1), now).unwrap();
        let proof = svc
            .generate_temporal_proof(&history, &sf(), range, 1_000.0, &kp)
            .unwrap();
        assert!(!proof.result);
        let payload: TemporalPayload = decode_payload(&proof.proof).unwrap();
        assert_eq!(payload.entry_count, 0);
    }

    #[test]
    fn temporal_rejects_inverted_range() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let now = now_ms();
        let history = LocationHistory::new(Duration::days(1)).unwrap();
        let inverted = TimeRange {
            start: now,
            end: now - Duration::hours(1),
        };
        assert!(matches!(
            svc.generate_temporal_proof(&history, &sf(), inverted, 1_000.0, &kp),
            Err(ProofError::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_proof_dispatches() {
        let svc = service();
        let kp = SigningKeypair::generate();
        let region = square("park", 37.77, -122.43, 0.02);
        let region_proof = Proof::Region(
            svc.generate_region_proof(&coord(37.78, -122.42), &region, &kp).unwrap(),
        );
        assert!(!svc.verify_proof(&region_proof, &VerificationContext::new()));
        assert!(svc.verify_proof(&region_proof, &VerificationContext::new().with_region(&region)));

        let members = vec![member("a", "9q8yyk"), member("b", "9q8yyk")];
        let group_proof = Proof::Group(svc.generate_group_proof(&members, 1_000.0, &kp).unwrap());
        assert!(svc.verify_proof(&group_proof, &VerificationContext::new().with_members(&members)));

        let proximity = Proof::Proximity(
            svc.generate_proximity_proof(&sf(), &sf(), 500.0, &kp).unwrap(),
        );
        let parsed = Proof::from_json(&proximity.to_json().unwrap()).unwrap();
        assert!(svc.verify_proof(&parsed, &VerificationContext::default()));
    }
}
