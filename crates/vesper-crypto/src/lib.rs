//! Vesper Crypto - Content hashing and result signing.
//!
//! This crate provides:
//! - SHA-256 content hashing for the audit chain and payload digests
//! - HMAC-SHA256 signing of results destined for user display
//! - A keystore port for the symmetric signing key
//!
//! # Security Model
//!
//! The audit chain links entries by content hash; any modification to a
//! historical entry breaks the chain and is detectable. Result
//! signatures bind `(version_counter || content)` under a symmetric key
//! held by the OS keystore; a result without a valid signature is
//! reported as unverified, never rejected outright.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;
mod keystore;
mod signer;

pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keystore::{MemoryKeystore, SigningKeystore};
pub use signer::{ResultSigner, SignatureVerdict};
