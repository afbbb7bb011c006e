//! Signing keypairs for commitments and proofs.
//!
//! Keys are BIP-340 Schnorr keys on secp256k1. The secret key bytes are
//! automatically zeroized when the keypair is dropped.

use std::sync::LazyLock;

use nostr::secp256k1::{rand::rngs::OsRng, Keypair, Message, Secp256k1, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, Result};

/// Global secp256k1 context for cryptographic operations.
///
/// Creating a `Secp256k1` context is expensive as it precomputes tables
/// for signing and verification. This shared context is initialized once
/// and reused across all operations.
pub static SECP: LazyLock<Secp256k1<nostr::secp256k1::All>> = LazyLock::new(Secp256k1::new);

/// A keypair used to sign commitments and proofs.
///
/// # Security
///
/// - Secret key bytes are zeroized on drop via `ZeroizeOnDrop`
/// - The keypair is reconstructed from bytes only for the duration of a
///   signing operation
/// - `Debug` output never includes the secret key
///
/// # Example
///
/// ```
/// use zkgps_core::crypto::SigningKeypair;
///
/// let keypair = SigningKeypair::generate();
/// assert_eq!(keypair.pubkey_hex().len(), 64); // 32-byte x-only key
/// ```
#[derive(ZeroizeOnDrop)]
pub struct SigningKeypair {
    /// The secret key bytes (zeroized on drop)
    secret_bytes: [u8; 32],

    /// Cached x-only public key bytes (not sensitive, skip zeroization)
    #[zeroize(skip)]
    pubkey_bytes: [u8; 32],
}

impl SigningKeypair {
    /// Generates a new random keypair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let keypair = Keypair::new(&SECP, &mut OsRng);
        let secret_bytes = keypair.secret_key().secret_bytes();
        let (public_key, _parity) = keypair.x_only_public_key();

        Self {
            secret_bytes,
            pubkey_bytes: public_key.serialize(),
        }
    }

    /// Creates a keypair from raw secret key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the bytes are not a valid
    /// secp256k1 secret key (zero, or not below the curve order).
    pub fn from_bytes(secret_bytes: [u8; 32]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(&secret_bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let keypair = Keypair::from_secret_key(&SECP, &secret_key);
        let (public_key, _parity) = keypair.x_only_public_key();

        Ok(Self {
            secret_bytes,
            pubkey_bytes: public_key.serialize(),
        })
    }

    /// Creates a keypair from a 64-character hex secret key.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex is malformed or the key is invalid.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let mut decoded = hex::decode(secret_hex)?;
        let bytes: std::result::Result<[u8; 32], _> = decoded.as_slice().try_into();
        decoded.zeroize();
        let mut bytes =
            bytes.map_err(|_| CryptoError::InvalidKey("secret key must be 32 bytes".to_string()))?;
        let result = Self::from_bytes(bytes);
        bytes.zeroize();
        result
    }

    /// Returns the x-only public key as a 64-character hex string.
    #[must_use]
    pub fn pubkey_hex(&self) -> String {
        hex::encode(self.pubkey_bytes)
    }

    /// Returns the public key as raw bytes.
    #[must_use]
    pub const fn pubkey_bytes(&self) -> [u8; 32] {
        self.pubkey_bytes
    }

    /// Signs a 32-byte digest with a BIP-340 Schnorr signature.
    ///
    /// Returns the 64-byte signature as a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored secret cannot be reconstructed.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<String> {
        let mut secret_bytes_copy = self.secret_bytes;

        let result = (|| {
            let secret_key = SecretKey::from_slice(&secret_bytes_copy)
                .map_err(|e| CryptoError::Signing(e.to_string()))?;
            let keypair = Keypair::from_secret_key(&SECP, &secret_key);
            let message = Message::from_digest(*digest);
            let signature = SECP.sign_schnorr(&message, &keypair);
            Ok(hex::encode(signature.serialize()))
        })();

        // Zeroize the temporary copy regardless of success/failure
        secret_bytes_copy.zeroize();

        result
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret key
        f.debug_struct("SigningKeypair")
            .field("pubkey", &self.pubkey_hex())
            .finish()
    }
}
