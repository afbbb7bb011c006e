//! Hash capability and randomness helpers.
//!
//! All commitment and proof digests flow through the [`HashProvider`] trait
//! so that a caller can never end up with a non-cryptographic hash by
//! accident: the only production implementation is [`Sha256Hasher`], and
//! any provider reporting `is_secure() == false` is rejected by
//! [`CryptoSuite::new`](super::CryptoSuite::new).

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::{CryptoError, Result};

/// Default salt length in bytes (hex-encoded to twice as many characters).
pub const DEFAULT_SALT_BYTES: usize = 32;

/// Minimum accepted salt length in bytes.
pub const MIN_SALT_BYTES: usize = 16;

/// A 256-bit digest capability.
pub trait HashProvider: Send + Sync + std::fmt::Debug {
    /// Computes the digest of `message`.
    fn digest(&self, message: &[u8]) -> [u8; 32];

    /// Whether this provider is cryptographically secure.
    fn is_secure(&self) -> bool;

    /// Computes the digest of a UTF-8 message as lowercase hex.
    fn hash_hex(&self, message: &str) -> String {
        hex::encode(self.digest(message.as_bytes()))
    }
}

/// SHA-256 hash provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl HashProvider for Sha256Hasher {
    fn digest(&self, message: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(message);
        hasher.finalize().into()
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// Generates a random hex salt of `len_bytes` bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidArgument`] if `len_bytes` is below
/// [`MIN_SALT_BYTES`], and [`CryptoError::InsecureEnvironment`] if the
/// operating system RNG is unavailable. There is no fallback to a weaker
/// generator.
pub fn generate_salt(len_bytes: usize) -> Result<String> {
    if len_bytes < MIN_SALT_BYTES {
        return Err(CryptoError::InvalidArgument(format!(
            "salt of {len_bytes} bytes is shorter than {MIN_SALT_BYTES}"
        )));
    }
    let mut bytes = vec![0u8; len_bytes];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::InsecureEnvironment(format!("OS RNG unavailable: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Generates a random 128-bit identifier as hex.
///
/// # Errors
///
/// Returns [`CryptoError::InsecureEnvironment`] if the OS RNG is unavailable.
pub fn random_id() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::InsecureEnvironment(format!("OS RNG unavailable: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Compares two strings in constant time (for digests and signatures).
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let hasher = Sha256Hasher;
        assert_eq!(
            hasher.hash_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_is_secure() {
        assert!(Sha256Hasher.is_secure());
    }

    #[test]
    fn salt_has_expected_length() {
        let salt = generate_salt(DEFAULT_SALT_BYTES).unwrap();
        assert_eq!(salt.len(), 64);
        assert!(hex::decode(&salt).is_ok());
    }

    #[test]
    fn salts_are_unique() {
        let a = generate_salt(DEFAULT_SALT_BYTES).unwrap();
        let b = generate_salt(DEFAULT_SALT_BYTES).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_salt_is_rejected() {
        assert!(matches!(
            generate_salt(4),
            Err(CryptoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn random_id_is_32_hex_chars() {
        assert_eq!(random_id().unwrap().len(), 32);
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
