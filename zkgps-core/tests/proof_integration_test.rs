//! Integration tests for proof generation and verification.
//!
//! These tests verify:
//! - Proximity, region, group and temporal proofs verify end to end
//! - The prover's `result` is carried, not re-derived
//! - Stale, future-dated, tampered and foreign-signed proofs are rejected
//! - Proofs survive the JSON wire format

use chrono::{Duration, Utc};
use zkgps_core::commitment::{CommitmentRequest, CommitmentService, LocationCommitment};
use zkgps_core::crypto::{CryptoSuite, SigningKeypair};
use zkgps_core::location::{Coordinate, GeohashPrecision};
use zkgps_core::proof::{
    GroupMember, HistoryEntry, LocationHistory, Proof, ProofService, Region, TimeRange,
    TrustedAssertionProof, VerificationContext,
};

const SALT: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90";

fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

fn sf() -> Coordinate {
    coord(37.7749, -122.4194)
}

fn service() -> ProofService {
    ProofService::new(CommitmentService::new(CryptoSuite::secure()))
}

fn downtown() -> Region {
    Region::new(
        "downtown-sf",
        vec![
            coord(37.770, -122.425),
            coord(37.780, -122.425),
            coord(37.780, -122.415),
            coord(37.770, -122.415),
        ],
    )
    .unwrap()
}

fn commitment_at(c: Coordinate, precision: u8) -> LocationCommitment {
    CommitmentService::new(CryptoSuite::secure())
        .create_commitment(&CommitmentRequest::new(
            c,
            GeohashPrecision::new(precision).unwrap(),
            SALT,
        ))
        .unwrap()
}

// ==================== Proximity ====================

#[test]
fn proximity_near_target_is_true_and_verifies() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let target = coord(37.7755, -122.4180);

    let proof = service
        .generate_proximity_proof(&sf(), &target, 1_000.0, &keypair)
        .unwrap();
    assert!(proof.result);
    assert_eq!(proof.prover_public_key(), keypair.pubkey_hex());
    assert!(service.verify_proximity_proof(&proof));
}

#[test]
fn proximity_far_target_is_false_but_valid() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let new_york = coord(40.7128, -74.0060);

    let proof = service
        .generate_proximity_proof(&sf(), &new_york, 1_000.0, &keypair)
        .unwrap();
    assert!(!proof.result);
    // A signed negative answer is still a well-formed proof.
    assert!(service.verify_proximity_proof(&proof));
}

#[test]
fn proximity_rejects_bad_distance() {
    let service = service();
    let keypair = SigningKeypair::generate();
    for distance in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        assert!(service
            .generate_proximity_proof(&sf(), &sf(), distance, &keypair)
            .is_err());
    }
}

#[test]
fn stale_proof_is_rejected() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let six_minutes_ago = Utc::now() - Duration::minutes(6);

    let proof = service
        .generate_proximity_proof_at(&sf(), &sf(), 500.0, &keypair, six_minutes_ago)
        .unwrap();
    assert!(!service.verify_proximity_proof(&proof));
    assert!(service.verify_proximity_proof_at(&proof, six_minutes_ago + Duration::minutes(4)));
}

#[test]
fn future_dated_proof_is_rejected() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let proof = service
        .generate_proximity_proof_at(&sf(), &sf(), 500.0, &keypair, Utc::now() + Duration::minutes(2))
        .unwrap();
    assert!(!service.verify_proximity_proof(&proof));
}

#[test]
fn custom_max_age() {
    let service = service().with_max_age(Duration::seconds(30));
    let keypair = SigningKeypair::generate();
    let now = Utc::now();
    let proof = service
        .generate_proximity_proof_at(&sf(), &sf(), 500.0, &keypair, now)
        .unwrap();
    assert!(service.verify_proximity_proof_at(&proof, now + Duration::seconds(29)));
    assert!(!service.verify_proximity_proof_at(&proof, now + Duration::seconds(31)));
}

#[test]
fn tampered_proximity_fields_are_rejected() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let proof = service
        .generate_proximity_proof(&sf(), &sf(), 500.0, &keypair)
        .unwrap();

    let mut flipped = proof.clone();
    flipped.result = !flipped.result;
    assert!(!service.verify_proximity_proof(&flipped));

    let mut widened = proof.clone();
    widened.max_distance = 5_000.0;
    assert!(!service.verify_proximity_proof(&widened));

    let mut moved = proof.clone();
    moved.target_point = coord(37.80, -122.40);
    assert!(!service.verify_proximity_proof(&moved));

    let mut garbage = proof.clone();
    garbage.proof = "not a payload".to_string();
    assert!(!service.verify_proximity_proof(&garbage));

    let mut foreign = proof;
    foreign.prover_public_key = SigningKeypair::generate().pubkey_hex();
    assert!(!service.verify_proximity_proof(&foreign));
}

// ==================== Region ====================

#[test]
fn region_proof_inside_and_outside() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let region = downtown();

    let inside = service.generate_region_proof(&sf(), &region, &keypair).unwrap();
    assert!(inside.result);
    assert!(service.verify_region_proof(&inside, &region));

    let outside = service
        .generate_region_proof(&coord(37.80, -122.27), &region, &keypair)
        .unwrap();
    assert!(!outside.result);
    assert!(service.verify_region_proof(&outside, &region));
}

#[test]
fn region_proof_against_other_region_fails() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let proof = service.generate_region_proof(&sf(), &downtown(), &keypair).unwrap();

    let renamed = Region::new("mission", downtown().polygon).unwrap();
    assert!(!service.verify_region_proof(&proof, &renamed));

    let reshaped = Region::new(
        "downtown-sf",
        vec![
            coord(37.770, -122.425),
            coord(37.790, -122.425),
            coord(37.790, -122.405),
            coord(37.770, -122.405),
        ],
    )
    .unwrap();
    assert!(!service.verify_region_proof(&proof, &reshaped));
}

#[test]
fn region_needs_three_vertices() {
    assert!(Region::new("line", vec![coord(0.0, 0.0), coord(1.0, 1.0)]).is_err());
}

// ==================== Group ====================

fn members(a: Coordinate, b: Coordinate, precision: u8) -> Vec<GroupMember> {
    vec![
        GroupMember {
            participant_id: "alice".to_string(),
            commitment: commitment_at(a, precision),
        },
        GroupMember {
            participant_id: "bob".to_string(),
            commitment: commitment_at(b, precision),
        },
    ]
}

#[test]
fn group_proof_close_members() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let group = members(sf(), coord(37.7750, -122.4195), 7);

    let proof = service.generate_group_proof(&group, 1_000.0, &keypair).unwrap();
    assert!(proof.result);
    assert_eq!(proof.participants, vec!["alice", "bob"]);
    assert!(service.verify_group_proof(&proof, &group));
}

#[test]
fn group_proof_distant_members() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let group = members(sf(), coord(40.7128, -74.0060), 7);

    let proof = service.generate_group_proof(&group, 1_000.0, &keypair).unwrap();
    assert!(!proof.result);
    assert!(service.verify_group_proof(&proof, &group));
}

#[test]
fn group_proof_degrades_to_shortest_prefix() {
    let service = service();
    let keypair = SigningKeypair::generate();
    // Members revealed only 3 characters while 1 km asks for more.
    let group = members(sf(), coord(37.50, -122.40), 3);

    let proof = service.generate_group_proof(&group, 1_000.0, &keypair).unwrap();
    assert!(proof.result);
    assert!(service.verify_group_proof(&proof, &group));
}

#[test]
fn group_proof_needs_two_members() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let mut group = members(sf(), sf(), 6);
    group.truncate(1);
    assert!(service.generate_group_proof(&group, 500.0, &keypair).is_err());
}

#[test]
fn group_proof_rejects_swapped_commitments() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let group = members(sf(), coord(37.7750, -122.4195), 7);
    let proof = service.generate_group_proof(&group, 1_000.0, &keypair).unwrap();

    let mut other = group.clone();
    other[1].commitment = commitment_at(coord(37.7760, -122.4190), 7);
    assert!(!service.verify_group_proof(&proof, &other));

    let mut reordered = group;
    reordered.reverse();
    assert!(!service.verify_group_proof(&proof, &reordered));
}

// ==================== Temporal ====================

fn history_with(entries: &[(Coordinate, &str)]) -> LocationHistory {
    let commitments = CommitmentService::new(CryptoSuite::secure());
    let history = LocationHistory::new(Duration::hours(24)).unwrap();
    for (c, salt) in entries {
        let commitment = commitments
            .create_commitment(&CommitmentRequest::new(*c, GeohashPrecision::MAX, *salt))
            .unwrap();
        history.record(HistoryEntry::new(commitment, *c, *salt)).unwrap();
    }
    history
}

#[test]
fn temporal_proof_for_visited_place() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let history = history_with(&[(sf(), SALT), (coord(40.7128, -74.0060), SALT)]);
    let now = Utc::now();
    let range = TimeRange::new(now - Duration::hours(1), now + Duration::seconds(1)).unwrap();

    let visited = service
        .generate_temporal_proof(&history, &sf(), range, 500.0, &keypair)
        .unwrap();
    assert!(visited.result);
    assert!(service.verify_temporal_proof(&visited));

    let never = service
        .generate_temporal_proof(&history, &coord(51.5074, -0.1278), range, 500.0, &keypair)
        .unwrap();
    assert!(!never.result);
    assert!(service.verify_temporal_proof(&never));
}

#[test]
fn temporal_proof_outside_range_is_false() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let history = history_with(&[(sf(), SALT)]);
    let now = Utc::now();
    let range = TimeRange::new(now - Duration::hours(3), now - Duration::hours(2)).unwrap();

    let proof = service
        .generate_temporal_proof(&history, &sf(), range, 500.0, &keypair)
        .unwrap();
    assert!(!proof.result);
}

#[test]
fn inverted_time_range_is_rejected() {
    let now = Utc::now();
    assert!(TimeRange::new(now, now - Duration::seconds(1)).is_err());
}

// ==================== Dispatch and wire format ====================

#[test]
fn proof_json_roundtrip_verifies() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let region = downtown();
    let proof = Proof::Region(service.generate_region_proof(&sf(), &region, &keypair).unwrap());

    let json = proof.to_json().unwrap();
    assert!(json.contains("\"type\":\"region\""));
    assert!(json.contains("\"regionId\""));
    assert!(!json.contains("37.7749"));

    let parsed = Proof::from_json(&json).unwrap();
    assert_eq!(parsed, proof);
    assert!(service.verify_proof(&parsed, &VerificationContext::new().with_region(&region)));
}

#[test]
fn dispatch_without_context_fails_closed() {
    let service = service();
    let keypair = SigningKeypair::generate();
    let region = downtown();
    let region_proof = Proof::Region(service.generate_region_proof(&sf(), &region, &keypair).unwrap());
    assert!(!service.verify_proof(&region_proof, &VerificationContext::new()));

    let group = members(sf(), sf(), 6);
    let group_proof = Proof::Group(service.generate_group_proof(&group, 1_000.0, &keypair).unwrap());
    assert!(!service.verify_proof(&group_proof, &VerificationContext::new()));
    assert!(service.verify_proof(&group_proof, &VerificationContext::new().with_members(&group)));
}

#[test]
fn insecure_suite_proofs_do_not_verify_under_secure_suite() {
    let insecure = ProofService::new(CommitmentService::new(CryptoSuite::insecure_for_tests()));
    let keypair = SigningKeypair::generate();
    let proof = insecure
        .generate_proximity_proof(&sf(), &sf(), 500.0, &keypair)
        .unwrap();
    assert!(insecure.verify_proximity_proof(&proof));
    assert!(!service().verify_proximity_proof(&proof));
}
