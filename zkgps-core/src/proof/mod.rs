//! Location proofs.
//!
//! Four proof kinds share one shape: public parameters, an asserted
//! boolean `result`, a JSON payload holding the Merkle root of the cell set
//! derivable from those parameters, and a signature.
//!
//! | Kind      | Public parameters                          | Verifier supplies |
//! |-----------|--------------------------------------------|-------------------|
//! | Proximity | target point, max distance                 | nothing           |
//! | Region    | region id                                  | region polygon    |
//! | Temporal  | location, time range, max distance         | nothing           |
//! | Group     | participant ids, max distance              | member commitments|
//!
//! None of these are zero-knowledge proofs. See [`TrustedAssertionProof`]
//! for what verification does and does not establish.

mod error;
mod history;
mod merkle;
mod service;
pub mod types;

pub use error::{ProofError, Result};
pub use history::{HistoryEntry, LocationHistory};
pub use merkle::merkle_root;
pub use service::{ProofService, VerificationContext, DEFAULT_MAX_PROOF_AGE_MS, MAX_CLOCK_SKEW_MS};
pub use types::{
    CellSetPayload, GroupMember, GroupPayload, GroupProximityProof, Proof, ProximityProof, Region,
    RegionProof, TemporalPayload, TemporalProof, TimeRange, TrustedAssertionProof,
};
