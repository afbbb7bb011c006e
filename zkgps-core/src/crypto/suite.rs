//! The set of crypto capabilities a protocol instance runs with.

use std::sync::Arc;

use super::error::{CryptoError, Result};
use super::hash::{HashProvider, Sha256Hasher};
use super::keys::SigningKeypair;
use super::signature::{SchnorrSigner, SignatureProvider};

/// Hash and signature providers bundled for injection into services.
///
/// A suite built through [`CryptoSuite::new`] is guaranteed to contain only
/// providers that report themselves secure. There is no automatic fallback:
/// an insecure suite exists only through [`CryptoSuite::insecure_for_tests`],
/// which is compiled out of production builds.
#[derive(Debug, Clone)]
pub struct CryptoSuite {
    hasher: Arc<dyn HashProvider>,
    signer: Arc<dyn SignatureProvider>,
}

impl CryptoSuite {
    /// SHA-256 digests with BIP-340 Schnorr signatures.
    #[must_use]
    pub fn secure() -> Self {
        Self {
            hasher: Arc::new(Sha256Hasher),
            signer: Arc::new(SchnorrSigner),
        }
    }

    /// Builds a suite from custom providers.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InsecureEnvironment`] if either provider
    /// reports itself as not secure.
    pub fn new(
        hasher: Arc<dyn HashProvider>,
        signer: Arc<dyn SignatureProvider>,
    ) -> Result<Self> {
        if !hasher.is_secure() {
            return Err(CryptoError::InsecureEnvironment(format!(
                "hash provider {hasher:?} is not cryptographically secure"
            )));
        }
        if !signer.is_secure() {
            return Err(CryptoError::InsecureEnvironment(format!(
                "signature provider {signer:?} is not cryptographically secure"
            )));
        }
        Ok(Self { hasher, signer })
    }

    /// Builds a deliberately insecure suite for tests.
    ///
    /// # Warning
    ///
    /// Digests are not collision resistant and signatures are forgeable.
    /// Only use this for testing.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn insecure_for_tests() -> Self {
        log::warn!("using insecure crypto suite; never enable test-utils in production");
        Self {
            hasher: Arc::new(super::insecure::InsecureTestHasher),
            signer: Arc::new(super::insecure::InsecureTestSigner),
        }
    }

    /// Whether both providers are secure.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.hasher.is_secure() && self.signer.is_secure()
    }

    /// The hash provider.
    #[must_use]
    pub fn hasher(&self) -> &dyn HashProvider {
        self.hasher.as_ref()
    }

    /// Hex digest of a UTF-8 message.
    #[must_use]
    pub fn hash_hex(&self, message: &str) -> String {
        self.hasher.hash_hex(message)
    }

    /// Signs a UTF-8 message.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, message: &str, keypair: &SigningKeypair) -> Result<String> {
        self.signer.sign(message.as_bytes(), keypair)
    }

    /// Verifies a signature over a UTF-8 message.
    #[must_use]
    pub fn verify(&self, message: &str, signature_hex: &str, public_key_hex: &str) -> bool {
        self.signer
            .verify(message.as_bytes(), signature_hex, public_key_hex)
    }
}

impl Default for CryptoSuite {
    fn default() -> Self {
        Self::secure()
    }
}
