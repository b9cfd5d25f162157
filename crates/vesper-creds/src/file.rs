//! File-backed credential store for headless machines.
//!
//! Secrets live in a TOML file keyed by provider id. The file must not
//! be readable by group or other; load refuses otherwise. Writes go
//! through a temp file and atomic rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;
use vesper_core::CloudProviderKind;

use crate::error::{CredError, CredResult};
use crate::store::{CredentialStore, Secret};

/// Credential store persisted to a single TOML file.
pub struct FileCredentialStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileCredentialStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredError::InsecurePermissions`] if an existing file is
    /// readable by group or other, or a parse/storage error if the file
    /// exists but cannot be read.
    pub fn open(path: impl AsRef<Path>) -> CredResult<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            Self::check_permissions(&path)?;
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents).map_err(|e| CredError::Parse(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> CredResult<()> {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(CredError::InsecurePermissions {
                path: path.display().to_string(),
                mode: mode & 0o777,
            });
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> CredResult<()> {
        Ok(())
    }

    /// Serialize the cache and replace the file atomically.
    fn persist(&self) -> CredResult<()> {
        let snapshot = self
            .cache
            .read()
            .map_err(|_| CredError::Storage("credential cache poisoned".to_string()))?
            .clone();
        let contents =
            toml::to_string_pretty(&snapshot).map_err(|e| CredError::Storage(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn put(&self, provider: CloudProviderKind, secret: Secret) -> CredResult<()> {
        {
            let mut guard = self
                .cache
                .write()
                .map_err(|_| CredError::Storage("credential cache poisoned".to_string()))?;
            guard.insert(provider.id().to_string(), secret.expose().to_string());
        }
        self.persist()
    }

    fn get(&self, provider: CloudProviderKind) -> CredResult<Option<Secret>> {
        let guard = self
            .cache
            .read()
            .map_err(|_| CredError::Storage("credential cache poisoned".to_string()))?;
        Ok(guard.get(provider.id()).map(Secret::new))
    }

    fn delete(&self, provider: CloudProviderKind) -> CredResult<()> {
        {
            let mut guard = self
                .cache
                .write()
                .map_err(|_| CredError::Storage("credential cache poisoned".to_string()))?;
            guard.remove(provider.id());
        }
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");

        let store = FileCredentialStore::open(&path).unwrap();
        store
            .put(CloudProviderKind::OpenAi, Secret::new("sk-oai"))
            .unwrap();

        // Reopen and read back.
        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(CloudProviderKind::OpenAi).unwrap().unwrap().expose(),
            "sk-oai"
        );
        assert!(!reopened.has(CloudProviderKind::Google).unwrap());
    }

    #[test]
    fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");

        let store = FileCredentialStore::open(&path).unwrap();
        store
            .put(CloudProviderKind::Anthropic, Secret::new("sk-ant"))
            .unwrap();
        store.delete(CloudProviderKind::Anthropic).unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert!(!reopened.has(CloudProviderKind::Anthropic).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_refused() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "anthropic = \"sk-ant\"\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(matches!(
            FileCredentialStore::open(&path),
            Err(CredError::InsecurePermissions { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_written_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        let store = FileCredentialStore::open(&path).unwrap();
        store
            .put(CloudProviderKind::Google, Secret::new("g-key"))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
