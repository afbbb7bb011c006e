//! zkGPS Core Library
//!
//! Privacy-preserving location sharing: commit to a location, reveal only
//! a geohash prefix chosen by trust circle, and prove proximity, region
//! membership, past visits and group closeness without disclosing
//! coordinates.
//!
//! Proofs produced here are signed assertions, not zero-knowledge proofs:
//! verifiers trust the prover's signature. See
//! [`proof::TrustedAssertionProof`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

mod api;
mod clock;
pub mod commitment;
pub mod config;
pub mod crypto;
pub mod location;
pub mod proof;
pub mod trust;

pub use api::{CoreError, Result, ZkGpsCore};
