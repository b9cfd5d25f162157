//! Crypto error types.

use thiserror::Error;

/// Errors from hashing, signing, and keystore operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The keystore could not produce or load the signing key.
    #[error("keystore unavailable: {0}")]
    KeystoreUnavailable(String),

    /// A stored key had the wrong length or encoding.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Signature bytes could not be decoded.
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
