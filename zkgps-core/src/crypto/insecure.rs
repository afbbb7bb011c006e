//! Insecure hash and signature providers for tests.
//!
//! These exist so tests can exercise the protocol without real key
//! material. They are only compiled with `cfg(test)` or the `test-utils`
//! feature and are rejected by [`CryptoSuite::new`](super::CryptoSuite::new).
//! Opting in requires [`CryptoSuite::insecure_for_tests`](super::CryptoSuite::insecure_for_tests).

use super::error::Result;
use super::hash::HashProvider;
use super::keys::SigningKeypair;
use super::signature::SignatureProvider;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a folded into 32 bytes. Not collision resistant.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsecureTestHasher;

impl HashProvider for InsecureTestHasher {
    fn digest(&self, message: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (lane, chunk) in out.chunks_mut(8).enumerate() {
            let mut h = FNV_OFFSET ^ lane as u64;
            for byte in message {
                h ^= u64::from(*byte);
                h = h.wrapping_mul(FNV_PRIME);
            }
            chunk.copy_from_slice(&h.to_be_bytes());
        }
        out
    }

    fn is_secure(&self) -> bool {
        false
    }
}

/// "Signs" by hashing the public key with the message. Anyone can forge it.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsecureTestSigner;

impl InsecureTestSigner {
    fn tag(message: &[u8], public_key_hex: &str) -> String {
        let mut input = public_key_hex.as_bytes().to_vec();
        input.push(b'|');
        input.extend_from_slice(message);
        hex::encode(InsecureTestHasher.digest(&input))
    }
}

impl SignatureProvider for InsecureTestSigner {
    fn sign(&self, message: &[u8], keypair: &SigningKeypair) -> Result<String> {
        Ok(Self::tag(message, &keypair.pubkey_hex()))
    }

    fn verify(&self, message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
        super::hash::constant_time_eq(&Self::tag(message, public_key_hex), signature_hex)
    }

    fn is_secure(&self) -> bool {
        false
    }
}
