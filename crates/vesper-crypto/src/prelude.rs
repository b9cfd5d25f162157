//! Prelude module - commonly used types for convenient import.

pub use crate::{
    ContentHash, CryptoError, CryptoResult, MemoryKeystore, ResultSigner, SignatureVerdict,
    SigningKeystore,
};
