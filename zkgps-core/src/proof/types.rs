//! Proof data types.
//!
//! # Trust Model
//!
//! These are *trusted assertion proofs*, not zero-knowledge proofs. A
//! verifier can recompute every public, derivable part of a proof (the
//! precision, the cell set and its Merkle root) and check the signature,
//! but the boolean `result` is the prover's own claim about data the
//! verifier never sees. A dishonest prover can sign `result: true` from
//! anywhere. Treat a valid proof as "this key asserted X, with consistent
//! public parameters", nothing stronger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ProofError, Result};
use crate::commitment::LocationCommitment;
use crate::location::{codec, Coordinate, GeohashPrecision};

/// Common surface of every proof variant.
pub trait TrustedAssertionProof {
    /// Random proof identifier.
    fn proof_id(&self) -> &str;
    /// Creation time.
    fn timestamp(&self) -> DateTime<Utc>;
    /// Hex public key of the prover.
    fn prover_public_key(&self) -> &str;
    /// The prover's asserted (not re-derivable) result.
    fn result(&self) -> bool;
    /// JSON-encoded payload.
    fn payload(&self) -> &str;
    /// Hex signature over [`Self::signing_message`].
    fn signature(&self) -> &str;
    /// The message the prover signed.
    fn signing_message(&self) -> String;
}

/// Payload of proximity and region proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSetPayload {
    /// Precision of the cell set.
    pub precision: GeohashPrecision,
    /// Number of cells in the set.
    pub valid_cell_count: usize,
    /// `H(prover geohash + salt)`; binds the prover to one cell without
    /// revealing it.
    pub cell_commitment: String,
    /// Merkle root of the cell set.
    pub valid_cells_root: String,
}

/// Payload of temporal proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalPayload {
    /// Precision of the cell set.
    pub precision: GeohashPrecision,
    /// Number of cells in the set.
    pub valid_cell_count: usize,
    /// Merkle root of the cell set.
    pub valid_cells_root: String,
    /// Number of history entries inside the time range.
    pub entry_count: usize,
    /// Merkle root over those entries' commitment hashes.
    pub history_root: String,
}

/// Payload of group proximity proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    /// Precision at which revealed prefixes were compared.
    pub precision: GeohashPrecision,
    /// Number of participants.
    pub participant_count: usize,
    /// Merkle root over participant commitment hashes.
    pub commitments_root: String,
}

/// Encodes a payload as the JSON string carried in a proof's `proof` field.
pub(crate) fn encode_payload<T: Serialize>(payload: &T) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Decodes a payload, returning `None` for malformed JSON.
pub(crate) fn decode_payload<T: for<'de> Deserialize<'de>>(payload: &str) -> Option<T> {
    serde_json::from_str(payload).ok()
}

/// Proof that the prover is within `max_distance` meters of a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityProof {
    /// Random proof identifier.
    pub proof_id: String,
    /// Creation time (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Hex public key of the prover.
    pub prover_public_key: String,
    /// Point the distance is measured from.
    pub target_point: Coordinate,
    /// Maximum distance in meters.
    pub max_distance: f64,
    /// Asserted result.
    pub result: bool,
    /// JSON-encoded [`CellSetPayload`].
    pub proof: String,
    /// Hex signature.
    pub signature: String,
}

/// Proof that the prover is inside a named region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionProof {
    /// Random proof identifier.
    pub proof_id: String,
    /// Creation time (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Hex public key of the prover.
    pub prover_public_key: String,
    /// Identifier of the region; the verifier supplies its polygon.
    pub region_id: String,
    /// Asserted result.
    pub result: bool,
    /// JSON-encoded [`CellSetPayload`].
    pub proof: String,
    /// Hex signature.
    pub signature: String,
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    /// Window end (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a window.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] if `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(ProofError::InvalidArgument(format!(
                "time range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether `t` lies inside the window.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Proof that the prover was near a location at some point in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalProof {
    /// Random proof identifier.
    pub proof_id: String,
    /// Creation time (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Hex public key of the prover.
    pub prover_public_key: String,
    /// Location the distance is measured from.
    pub location: Coordinate,
    /// Window the history was filtered to.
    pub time_range: TimeRange,
    /// Maximum distance in meters.
    pub max_distance: f64,
    /// Asserted result.
    pub result: bool,
    /// JSON-encoded [`TemporalPayload`].
    pub proof: String,
    /// Hex signature.
    pub signature: String,
}

/// Proof that a group of participants are mutually close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProximityProof {
    /// Random proof identifier.
    pub proof_id: String,
    /// Creation time (milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Hex public key of the prover.
    pub prover_public_key: String,
    /// Participant identifiers, in input order.
    pub participants: Vec<String>,
    /// Maximum distance in meters.
    pub max_distance: f64,
    /// Asserted result.
    pub result: bool,
    /// JSON-encoded [`GroupPayload`].
    pub proof: String,
    /// Hex signature.
    pub signature: String,
}

macro_rules! impl_trusted_assertion {
    ($ty:ty, |$p:ident| $message:expr) => {
        impl TrustedAssertionProof for $ty {
            fn proof_id(&self) -> &str {
                &self.proof_id
            }
            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
            fn prover_public_key(&self) -> &str {
                &self.prover_public_key
            }
            fn result(&self) -> bool {
                self.result
            }
            fn payload(&self) -> &str {
                &self.proof
            }
            fn signature(&self) -> &str {
                &self.signature
            }
            fn signing_message(&self) -> String {
                let $p = self;
                $message
            }
        }
    };
}

impl_trusted_assertion!(ProximityProof, |p| format!(
    "{}|{}|{}|{}|{}",
    p.proof_id,
    p.timestamp.timestamp_millis(),
    p.result,
    p.target_point.to_message_string(),
    p.max_distance
));

impl_trusted_assertion!(RegionProof, |p| format!(
    "{}|{}|{}|{}",
    p.proof_id,
    p.timestamp.timestamp_millis(),
    p.result,
    p.region_id
));

impl_trusted_assertion!(TemporalProof, |p| format!(
    "{}|{}|{}|{}|{}|{}|{}",
    p.proof_id,
    p.timestamp.timestamp_millis(),
    p.result,
    p.location.to_message_string(),
    p.time_range.start.timestamp_millis(),
    p.time_range.end.timestamp_millis(),
    p.max_distance
));

impl_trusted_assertion!(GroupProximityProof, |p| format!(
    "{}|{}|{}|{}|{}",
    p.proof_id,
    p.timestamp.timestamp_millis(),
    p.result,
    p.participants.join(","),
    p.max_distance
));

/// Any proof, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Proof {
    /// See [`ProximityProof`].
    Proximity(ProximityProof),
    /// See [`RegionProof`].
    Region(RegionProof),
    /// See [`TemporalProof`].
    Temporal(TemporalProof),
    /// See [`GroupProximityProof`].
    Group(GroupProximityProof),
}

impl Proof {
    /// The variant as a dynamic [`TrustedAssertionProof`].
    #[must_use]
    pub fn as_assertion(&self) -> &dyn TrustedAssertionProof {
        match self {
            Self::Proximity(p) => p,
            Self::Region(p) => p,
            Self::Temporal(p) => p,
            Self::Group(p) => p,
        }
    }

    /// Converts this proof to a JSON string for the transport layer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a proof from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A named polygonal region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier, carried in [`RegionProof::region_id`].
    pub id: String,
    /// Vertices, treated as a closed ring.
    pub polygon: Vec<Coordinate>,
}

impl Region {
    /// Creates a region.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidArgument`] for an empty id or fewer than
    /// three vertices.
    pub fn new(id: impl Into<String>, polygon: Vec<Coordinate>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProofError::InvalidArgument(
                "region id must not be empty".to_string(),
            ));
        }
        if polygon.len() < 3 {
            return Err(ProofError::InvalidArgument(format!(
                "region {id} needs at least 3 vertices"
            )));
        }
        Ok(Self { id, polygon })
    }

    /// Precision used for region proofs: the radius is a quarter of the
    /// bounding-box diagonal.
    #[must_use]
    pub fn proof_precision(&self) -> GeohashPrecision {
        let bbox = codec::polygon_bounds(&self.polygon);
        match (
            Coordinate::new(bbox.min_lat, bbox.min_lng),
            Coordinate::new(bbox.max_lat, bbox.max_lng),
        ) {
            (Ok(sw), Ok(ne)) => codec::precision_for_radius(codec::haversine_distance(&sw, &ne) / 4.0),
            _ => GeohashPrecision::MIN,
        }
    }
}

/// One participant of a group proximity proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// Participant identifier.
    pub participant_id: String,
    /// The participant's commitment, which must carry a revealed prefix.
    pub commitment: LocationCommitment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proximity() -> ProximityProof {
        ProximityProof {
            proof_id: "id1".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            prover_public_key: "pk".to_string(),
            target_point: Coordinate::new(1.5, 2.5).unwrap(),
            max_distance: 1000.0,
            result: true,
            proof: r#"{"precision":6}"#.to_string(),
            signature: "sig".to_string(),
        }
    }

    #[test]
    fn proximity_signing_message() {
        assert_eq!(
            sample_proximity().signing_message(),
            "id1|1700000000000|true|1.5,2.5|1000"
        );
    }

    #[test]
    fn proof_union_is_tagged_by_type() {
        let proof = Proof::Proximity(sample_proximity());
        let json = proof.to_json().unwrap();
        assert!(json.contains("\"type\":\"proximity\""));
        assert!(json.contains("\"targetPoint\":{\"lat\":1.5,\"lng\":2.5}"));
        assert!(json.contains("\"maxDistance\":1000.0"));
        assert_eq!(Proof::from_json(&json).unwrap(), proof);
    }

    #[test]
    fn payload_is_double_encoded() {
        let json = Proof::Proximity(sample_proximity()).to_json().unwrap();
        assert!(json.contains(r#""proof":"{\"precision\":6}""#));
    }

    #[test]
    fn region_roundtrip_and_message() {
        let proof = RegionProof {
            proof_id: "r".to_string(),
            timestamp: DateTime::from_timestamp_millis(5).unwrap(),
            prover_public_key: "pk".to_string(),
            region_id: "downtown".to_string(),
            result: false,
            proof: "{}".to_string(),
            signature: "s".to_string(),
        };
        assert_eq!(proof.signing_message(), "r|5|false|downtown");
        let wrapped = Proof::Region(proof);
        assert_eq!(Proof::from_json(&wrapped.to_json().unwrap()).unwrap(), wrapped);
    }

    #[test]
    fn time_range_validation() {
        let a = DateTime::from_timestamp_millis(1_000).unwrap();
        let b = DateTime::from_timestamp_millis(2_000).unwrap();
        assert!(TimeRange::new(a, b).is_ok());
        assert!(TimeRange::new(b, a).is_err());
        let range = TimeRange::new(a, b).unwrap();
        assert!(range.contains(a) && range.contains(b));
        assert!(!range.contains(DateTime::from_timestamp_millis(2_001).unwrap()));
    }

    #[test]
    fn region_requires_polygon() {
        let c = Coordinate::new(0.0, 0.0).unwrap();
        assert!(Region::new("r", vec![c, c]).is_err());
        assert!(Region::new("", vec![c, c, c]).is_err());
    }

    #[test]
    fn region_precision_from_diagonal() {
        // ~15.7 km diagonal, radius ~3.9 km, so cells of at most ~7.8 km.
        let region = Region::new(
            "box",
            vec![
                Coordinate::new(0.0, 0.0).unwrap(),
                Coordinate::new(0.0, 0.1).unwrap(),
                Coordinate::new(0.1, 0.1).unwrap(),
                Coordinate::new(0.1, 0.0).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(region.proof_precision().get(), 5);
    }

    #[test]
    fn as_assertion_exposes_common_fields() {
        let proof = Proof::Proximity(sample_proximity());
        let assertion = proof.as_assertion();
        assert_eq!(assertion.proof_id(), "id1");
        assert!(assertion.result());
        assert_eq!(assertion.prover_public_key(), "pk");
    }
}
