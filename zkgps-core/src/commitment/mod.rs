//! Location commitments for zkGPS.
//!
//! A commitment binds a full-precision location and a secret salt into a
//! single hash, while disclosing only a coarse geohash prefix:
//!
//! ```text
//! coordinate ──encode(12)──> full geohash ──H(geohash | salt)──> commitment
//!                                 └──[..precision]──> revealed prefix
//! ```
//!
//! Commitments expire (5 minutes by default). An expired commitment fails
//! verification; it is never an error.
//!
//! # Types
//!
//! - [`LocationCommitment`]: the public commitment
//! - [`SignedCommitment`]: a commitment plus signature and signer key
//! - [`CommitmentService`]: create/verify/sign operations
//! - [`CommitmentStore`]: locally held commitments and salts

mod error;
mod service;
mod store;
pub mod types;

pub use error::{CommitmentError, Result};
pub use service::CommitmentService;
pub use store::CommitmentStore;
pub use types::{CommitmentRequest, LocationCommitment, SignedCommitment, DEFAULT_COMMITMENT_TTL_MS};
