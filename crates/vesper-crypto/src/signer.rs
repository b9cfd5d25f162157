//! HMAC-SHA256 result signing.
//!
//! Results destined for user display carry a signature over
//! `(version_counter || content_bytes)`. The key comes from the
//! keystore port; when the keystore is unreachable, results go out
//! unsigned and verify as [`SignatureVerdict::IdentityUnavailable`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::warn;

use crate::error::CryptoResult;
use crate::keystore::SigningKeystore;

type HmacSha256 = Hmac<Sha256>;

/// Verdict from verifying a result signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerdict {
    /// Signature is present and valid.
    Verified,
    /// Signature is absent or does not match the content.
    Unverified,
    /// The signing identity could not be loaded; nothing can be said.
    IdentityUnavailable,
}

/// Signs and verifies display-bound results.
pub struct ResultSigner {
    keystore: Arc<dyn SigningKeystore>,
}

impl ResultSigner {
    /// Create a signer over the given keystore.
    #[must_use]
    pub fn new(keystore: Arc<dyn SigningKeystore>) -> Self {
        Self { keystore }
    }

    fn mac(&self, version_counter: u64, content: &[u8]) -> CryptoResult<HmacSha256> {
        let key = self.keystore.load_or_create()?;
        let mut mac = HmacSha256::new_from_slice(key.as_ref())
            .map_err(|e| crate::CryptoError::InvalidKeyMaterial(e.to_string()))?;
        mac.update(&version_counter.to_le_bytes());
        mac.update(content);
        Ok(mac)
    }

    /// Sign `(version_counter || content)`, returning the hex-encoded
    /// tag. Returns `None` when the signing identity is unavailable;
    /// the caller ships the result unsigned.
    #[must_use]
    pub fn sign(&self, version_counter: u64, content: &[u8]) -> Option<String> {
        match self.mac(version_counter, content) {
            Ok(mac) => Some(hex::encode(mac.finalize().into_bytes())),
            Err(err) => {
                warn!(error = %err, "signing identity unavailable, result goes out unsigned");
                None
            },
        }
    }

    /// Verify a hex-encoded signature against `(version_counter || content)`.
    #[must_use]
    pub fn verify(
        &self,
        version_counter: u64,
        content: &[u8],
        signature: Option<&str>,
    ) -> SignatureVerdict {
        let Some(signature) = signature else {
            // Distinguish "we could not have signed" from "we chose not to".
            return match self.keystore.load_or_create() {
                Ok(_) => SignatureVerdict::Unverified,
                Err(_) => SignatureVerdict::IdentityUnavailable,
            };
        };

        let Ok(expected) = hex::decode(signature) else {
            return SignatureVerdict::Unverified;
        };

        match self.mac(version_counter, content) {
            Ok(mac) => {
                if mac.verify_slice(&expected).is_ok() {
                    SignatureVerdict::Verified
                } else {
                    SignatureVerdict::Unverified
                }
            },
            Err(_) => SignatureVerdict::IdentityUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{MemoryKeystore, SIGNING_KEY_LEN};

    fn signer() -> ResultSigner {
        ResultSigner::new(Arc::new(MemoryKeystore::with_seed([1u8; SIGNING_KEY_LEN])))
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = signer();
        let sig = signer.sign(1, b"model output").unwrap();
        assert_eq!(
            signer.verify(1, b"model output", Some(&sig)),
            SignatureVerdict::Verified
        );
    }

    #[test]
    fn test_tampered_content_is_unverified() {
        let signer = signer();
        let sig = signer.sign(1, b"model output").unwrap();
        assert_eq!(
            signer.verify(1, b"tampered output", Some(&sig)),
            SignatureVerdict::Unverified
        );
    }

    #[test]
    fn test_version_counter_is_bound() {
        let signer = signer();
        let sig = signer.sign(1, b"model output").unwrap();
        assert_eq!(
            signer.verify(2, b"model output", Some(&sig)),
            SignatureVerdict::Unverified
        );
    }

    #[test]
    fn test_missing_signature_is_unverified() {
        let signer = signer();
        assert_eq!(
            signer.verify(1, b"model output", None),
            SignatureVerdict::Unverified
        );
    }

    #[test]
    fn test_unavailable_identity() {
        let signer = ResultSigner::new(Arc::new(MemoryKeystore::unavailable()));
        assert_eq!(signer.sign(1, b"output"), None);
        assert_eq!(
            signer.verify(1, b"output", None),
            SignatureVerdict::IdentityUnavailable
        );
    }

    #[test]
    fn test_garbage_signature_is_unverified() {
        let signer = signer();
        assert_eq!(
            signer.verify(1, b"output", Some("not-hex")),
            SignatureVerdict::Unverified
        );
    }
}
