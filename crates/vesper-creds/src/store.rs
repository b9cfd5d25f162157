//! The credential store port and in-memory backend.

use std::collections::HashMap;
use std::sync::RwLock;
use vesper_core::CloudProviderKind;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CredResult;

/// A bearer secret. Zeroed on drop; debug output never shows the value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for constructing an authorization header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Port to the platform credential store, keyed by provider.
///
/// Implementations must be safe to call from multiple tasks. Every
/// operation is a suspension-free synchronous call from the caller's
/// point of view; backends that need async I/O bridge internally.
pub trait CredentialStore: Send + Sync {
    /// Store a secret for the provider, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the secret.
    fn put(&self, provider: CloudProviderKind, secret: Secret) -> CredResult<()>;

    /// Fetch the secret for a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read. A missing
    /// credential is `Ok(None)`, not an error; the execution manager
    /// maps it to `CredentialMissing`.
    fn get(&self, provider: CloudProviderKind) -> CredResult<Option<Secret>>;

    /// Delete the secret for a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the removal.
    fn delete(&self, provider: CloudProviderKind) -> CredResult<()>;

    /// Whether a secret exists for the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn has(&self, provider: CloudProviderKind) -> CredResult<bool> {
        Ok(self.get(provider)?.is_some())
    }
}

/// Service name used when talking to the platform keystore.
///
/// Each provider gets a distinct service so revoking one credential
/// never touches another.
#[must_use]
pub fn service_name(provider: CloudProviderKind) -> String {
    format!("vesper.credential.{}", provider.id())
}

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<HashMap<CloudProviderKind, Secret>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one secret.
    #[must_use]
    pub fn with(provider: CloudProviderKind, secret: impl Into<String>) -> Self {
        let store = Self::new();
        let _ = store.put(provider, Secret::new(secret));
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn put(&self, provider: CloudProviderKind, secret: Secret) -> CredResult<()> {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(provider, secret);
        }
        Ok(())
    }

    fn get(&self, provider: CloudProviderKind) -> CredResult<Option<Secret>> {
        Ok(self
            .inner
            .read()
            .ok()
            .and_then(|guard| guard.get(&provider).cloned()))
    }

    fn delete(&self, provider: CloudProviderKind) -> CredResult<()> {
        if let Ok(mut guard) = self.inner.write() {
            guard.remove(&provider);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete_roundtrip() {
        let store = MemoryCredentialStore::new();
        let provider = CloudProviderKind::Anthropic;

        assert!(!store.has(provider).unwrap());

        store.put(provider, Secret::new("sk-test-123")).unwrap();
        assert!(store.has(provider).unwrap());
        assert_eq!(
            store.get(provider).unwrap().unwrap().expose(),
            "sk-test-123"
        );

        store.delete(provider).unwrap();
        assert!(!store.has(provider).unwrap());
    }

    #[test]
    fn test_providers_are_isolated() {
        let store = MemoryCredentialStore::with(CloudProviderKind::Anthropic, "sk-a");
        assert!(!store.has(CloudProviderKind::OpenAi).unwrap());
        store.delete(CloudProviderKind::OpenAi).unwrap();
        assert!(store.has(CloudProviderKind::Anthropic).unwrap());
    }

    #[test]
    fn test_secret_debug_never_leaks() {
        let secret = Secret::new("sk-very-secret");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }

    #[test]
    fn test_distinct_service_names() {
        let names: std::collections::HashSet<_> = CloudProviderKind::ALL
            .iter()
            .map(|p| service_name(*p))
            .collect();
        assert_eq!(names.len(), CloudProviderKind::ALL.len());
    }
}
