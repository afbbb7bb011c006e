//! Integration tests for trust circles.
//!
//! These tests verify:
//! - Precision resolution across overlapping circles, overrides and pauses
//! - Update interval resolution
//! - Snapshots survive a file-backed SQLite database across reopen
//! - The facade shares at the resolved precision

use tempfile::TempDir;
use zkgps_core::config::ProtocolConfig;
use zkgps_core::crypto::SigningKeypair;
use zkgps_core::location::{Coordinate, GeohashPrecision};
use zkgps_core::trust::{
    TrustCircleConfig, TrustCircleManager, TrustCircleUpdate, TrustError, TrustLevel, TrustSnapshot,
    TrustStorage,
};
use zkgps_core::ZkGpsCore;

fn p(value: u8) -> GeohashPrecision {
    GeohashPrecision::new(value).unwrap()
}

fn manager() -> TrustCircleManager {
    TrustCircleManager::with_default_circles("alice", &ProtocolConfig::default()).unwrap()
}

#[test]
fn finest_circle_wins() {
    let trust = manager();
    trust.add_to_circle("close", "bob").unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(8)));

    trust.add_to_circle("intimate", "bob").unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(10)));

    trust.remove_from_circle("intimate", "bob").unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(8)));

    trust.remove_from_circle("close", "bob").unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), None);
}

#[test]
fn disabled_circle_is_ignored() {
    let trust = manager();
    trust.add_to_circle("intimate", "bob").unwrap();
    trust.add_to_circle("network", "bob").unwrap();
    trust
        .update_circle("intimate", TrustCircleUpdate::new().enabled(false))
        .unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(4)));
    assert_eq!(trust.get_update_interval_for_contact("bob").unwrap(), Some(900_000));
}

#[test]
fn override_and_pause() {
    let trust = manager();
    trust.add_to_circle("friends", "bob").unwrap();
    trust.set_precision_override("bob", Some(p(3))).unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(3)));

    trust.set_paused("bob", true).unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), None);

    trust.set_paused("bob", false).unwrap();
    trust.set_precision_override("bob", None).unwrap();
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), Some(p(6)));

    assert!(matches!(
        trust.set_paused("nobody", true),
        Err(TrustError::ContactNotFound(_))
    ));
}

#[test]
fn custom_circle_precision() {
    let trust = manager();
    let circle = trust
        .create_circle(
            TrustCircleConfig::new("Neighbors", TrustLevel::Network)
                .with_id("neighbors")
                .with_custom_precision(p(7)),
        )
        .unwrap();
    assert_eq!(circle.effective_precision(), p(7));

    trust.add_to_circle("neighbors", "dana").unwrap();
    assert_eq!(trust.get_precision_for_contact("dana").unwrap(), Some(p(7)));

    assert!(matches!(
        trust.create_circle(TrustCircleConfig::new("Again", TrustLevel::Network).with_id("neighbors")),
        Err(TrustError::AlreadyExists(_))
    ));
}

#[test]
fn deleting_circle_cascades_to_contacts() {
    let trust = manager();
    trust.add_to_circle("friends", "bob").unwrap();
    trust.delete_circle("friends").unwrap();
    assert!(trust.get_circle("friends").unwrap().is_none());
    assert!(trust.get_contact("bob").unwrap().unwrap().circles.is_empty());
    assert_eq!(trust.get_precision_for_contact("bob").unwrap(), None);
}

#[test]
fn snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trust.db");

    let trust = manager();
    trust.add_to_circle("close", "bob").unwrap();
    trust.add_to_circle("friends", "carol").unwrap();
    trust.set_precision_override("carol", Some(p(5))).unwrap();
    trust.set_paused("bob", true).unwrap();
    let exported = trust.export().unwrap();

    {
        let storage = TrustStorage::new(&path).unwrap();
        storage.save_snapshot(&exported).unwrap();
    }

    let storage = TrustStorage::new(&path).unwrap();
    let loaded = storage.load_snapshot().unwrap();
    assert_eq!(loaded, exported);

    let restored = TrustCircleManager::new("alice");
    restored.import(loaded).unwrap();
    assert_eq!(restored.get_precision_for_contact("bob").unwrap(), None);
    assert_eq!(restored.get_precision_for_contact("carol").unwrap(), Some(p(5)));
}

#[test]
fn saving_replaces_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let storage = TrustStorage::new(&dir.path().join("trust.db")).unwrap();

    let trust = manager();
    trust.add_to_circle("friends", "bob").unwrap();
    storage.save_snapshot(&trust.export().unwrap()).unwrap();

    trust.remove_contact("bob").unwrap();
    trust.delete_circle("public").unwrap();
    storage.save_snapshot(&trust.export().unwrap()).unwrap();

    let loaded = storage.load_snapshot().unwrap();
    assert_eq!(loaded.circles.len(), 4);
    assert!(loaded.contacts.is_empty());
}

#[test]
fn snapshot_json_roundtrip() {
    let trust = manager();
    trust.add_to_circle("intimate", "bob").unwrap();
    let snapshot = trust.export().unwrap();
    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"requireMutual\""));
    assert_eq!(TrustSnapshot::from_json(&json).unwrap(), snapshot);
}

#[test]
fn facade_shares_at_resolved_precision() {
    let core = ZkGpsCore::new("alice", SigningKeypair::generate(), ProtocolConfig::default()).unwrap();
    let here = Coordinate::new(37.7749, -122.4194).unwrap();

    core.trust().add_to_circle("network", "erin").unwrap();
    let signed = core
        .commit_location_for_contact("erin", &here, None)
        .unwrap()
        .unwrap();
    assert_eq!(signed.commitment.revealed_prefix.as_deref(), Some("9q8y"));
    assert_eq!(signed.signer_public_key, core.public_key_hex());

    let dir = TempDir::new().unwrap();
    let storage = TrustStorage::new(&dir.path().join("trust.db")).unwrap();
    core.save_trust(&storage).unwrap();

    let other = ZkGpsCore::new("alice", SigningKeypair::generate(), ProtocolConfig::default()).unwrap();
    other.load_trust(&storage).unwrap();
    assert_eq!(
        other.trust().get_precision_for_contact("erin").unwrap(),
        Some(p(4))
    );
}
