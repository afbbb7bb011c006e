//! Cryptographic capabilities for commitments and proofs.
//!
//! Hashing and signing are abstracted behind [`HashProvider`] and
//! [`SignatureProvider`]. Each has exactly one production implementation
//! ([`Sha256Hasher`], [`SchnorrSigner`]), bundled by [`CryptoSuite`].
//!
//! # Security
//!
//! - Salts and identifiers come from the OS CSPRNG; if it is unavailable
//!   the operation fails with [`CryptoError::InsecureEnvironment`]
//! - Non-secure providers are refused unless explicitly selected through
//!   the `test-utils` feature
//! - Digest comparisons are constant time

mod error;
pub mod hash;
#[cfg(any(test, feature = "test-utils"))]
pub mod insecure;
mod keys;
mod signature;
mod suite;

pub use error::{CryptoError, Result};
pub use hash::{generate_salt, HashProvider, Sha256Hasher, DEFAULT_SALT_BYTES};
pub use keys::SigningKeypair;
pub use signature::{SchnorrSigner, SignatureProvider};
pub use suite::CryptoSuite;
