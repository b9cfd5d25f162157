//! Keystore port for the result-signing key.
//!
//! The real backend is the OS keystore with "unlocked, this device
//! only" accessibility; that integration lives outside the core. The
//! core talks to this trait and ships an in-memory implementation for
//! tests and headless runs.

use std::sync::{Mutex, OnceLock};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Length of the symmetric signing key in bytes.
pub const SIGNING_KEY_LEN: usize = 32;

/// Port to the platform keystore holding the result-signing key.
///
/// `load_or_create` lazily creates the key on first use; subsequent
/// calls return the same material. Implementations must be safe to call
/// from multiple tasks.
pub trait SigningKeystore: Send + Sync {
    /// Load the signing key, creating it if it does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeystoreUnavailable`] when the backing
    /// store cannot be reached (locked device, missing entitlement).
    /// Callers treat this as "identity unavailable", not as a fatal
    /// condition.
    fn load_or_create(&self) -> CryptoResult<Zeroizing<[u8; SIGNING_KEY_LEN]>>;
}

/// In-memory keystore for tests and headless runs.
///
/// Generates key material on first access from a caller-supplied seed
/// so tests are deterministic.
pub struct MemoryKeystore {
    key: OnceLock<[u8; SIGNING_KEY_LEN]>,
    seed: Mutex<Option<[u8; SIGNING_KEY_LEN]>>,
    unavailable: bool,
}

impl MemoryKeystore {
    /// Create a keystore that derives its key from the given seed.
    #[must_use]
    pub fn with_seed(seed: [u8; SIGNING_KEY_LEN]) -> Self {
        Self {
            key: OnceLock::new(),
            seed: Mutex::new(Some(seed)),
            unavailable: false,
        }
    }

    /// Create a keystore that always reports the identity unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            key: OnceLock::new(),
            seed: Mutex::new(None),
            unavailable: true,
        }
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::with_seed([0x5a; SIGNING_KEY_LEN])
    }
}

impl SigningKeystore for MemoryKeystore {
    fn load_or_create(&self) -> CryptoResult<Zeroizing<[u8; SIGNING_KEY_LEN]>> {
        if self.unavailable {
            return Err(CryptoError::KeystoreUnavailable(
                "memory keystore configured unavailable".to_string(),
            ));
        }
        let key = self.key.get_or_init(|| {
            self.seed
                .lock()
                .ok()
                .and_then(|mut guard| guard.take())
                .unwrap_or([0x5a; SIGNING_KEY_LEN])
        });
        Ok(Zeroizing::new(*key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation_is_stable() {
        let store = MemoryKeystore::with_seed([7u8; SIGNING_KEY_LEN]);
        let first = store.load_or_create().unwrap();
        let second = store.load_or_create().unwrap();
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_unavailable_keystore() {
        let store = MemoryKeystore::unavailable();
        assert!(matches!(
            store.load_or_create(),
            Err(CryptoError::KeystoreUnavailable(_))
        ));
    }
}
