//! Signature capability.

use nostr::secp256k1::{schnorr::Signature, Message, XOnlyPublicKey};
use sha2::{Digest, Sha256};

use super::error::Result;
use super::keys::{SigningKeypair, SECP};

/// A public-key signature capability over arbitrary messages.
///
/// Verification never errors: malformed keys or signatures simply fail to
/// verify.
pub trait SignatureProvider: Send + Sync + std::fmt::Debug {
    /// Signs `message`, returning a hex signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypair cannot produce a signature.
    fn sign(&self, message: &[u8], keypair: &SigningKeypair) -> Result<String>;

    /// Checks a hex signature over `message` against a hex public key.
    fn verify(&self, message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool;

    /// Whether this provider is cryptographically secure.
    fn is_secure(&self) -> bool;
}

/// BIP-340 Schnorr signatures over SHA-256 message digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchnorrSigner;

fn message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize().into()
}

impl SignatureProvider for SchnorrSigner {
    fn sign(&self, message: &[u8], keypair: &SigningKeypair) -> Result<String> {
        keypair.sign_digest(&message_digest(message))
    }

    fn verify(&self, message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
        let Ok(pubkey_bytes) = hex::decode(public_key_hex) else {
            return false;
        };
        let Ok(pubkey) = XOnlyPublicKey::from_slice(&pubkey_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&sig_bytes) else {
            return false;
        };

        let message = Message::from_digest(message_digest(message));
        SECP.verify_schnorr(&signature, &message, &pubkey).is_ok()
    }

    fn is_secure(&self) -> bool {
        true
    }
}
