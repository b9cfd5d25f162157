//! Audit storage trait and backends.
//!
//! The file backend writes sequential length-prefixed UTF-8 JSON
//! records. The chain tail lives in a companion file replaced by
//! atomic rename, so a crash between record and tail leaves a
//! detectable (not silently corrupted) state. Large payloads go to a
//! `blobs/` directory named by content hash.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use vesper_crypto::ContentHash;

use crate::entry::{AuditRecord, ChainTail};
use crate::error::{AuditError, AuditResult};

/// Storage backend for the audit log.
///
/// Implementations must be thread-safe; the log serializes appends but
/// verification may read concurrently.
pub trait AuditStorage: Send + Sync {
    /// Append one record to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    fn append(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Load every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or parsed.
    fn load_all(&self) -> AuditResult<Vec<AuditRecord>>;

    /// Load the persisted chain tail, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the tail cannot be read or parsed.
    fn load_tail(&self) -> AuditResult<Option<ChainTail>>;

    /// Persist the chain tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the tail cannot be written.
    fn store_tail(&self, tail: &ChainTail) -> AuditResult<()>;

    /// Store an out-of-band payload blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn put_blob(&self, digest: &ContentHash, bytes: &[u8]) -> AuditResult<()>;

    /// Fetch an out-of-band payload blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails; a missing blob is
    /// `Ok(None)`.
    fn get_blob(&self, digest: &ContentHash) -> AuditResult<Option<Vec<u8>>>;
}

/// In-memory storage for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryAuditStorage {
    records: Mutex<Vec<AuditRecord>>,
    tail: Mutex<Option<ChainTail>>,
    blobs: Mutex<std::collections::HashMap<ContentHash, Vec<u8>>>,
}

impl MemoryAuditStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStorage for MemoryAuditStorage {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records
            .lock()
            .map_err(|_| AuditError::Storage("record lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn load_all(&self) -> AuditResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| AuditError::Storage("record lock poisoned".to_string()))?
            .clone())
    }

    fn load_tail(&self) -> AuditResult<Option<ChainTail>> {
        Ok(*self
            .tail
            .lock()
            .map_err(|_| AuditError::Storage("tail lock poisoned".to_string()))?)
    }

    fn store_tail(&self, tail: &ChainTail) -> AuditResult<()> {
        *self
            .tail
            .lock()
            .map_err(|_| AuditError::Storage("tail lock poisoned".to_string()))? = Some(*tail);
        Ok(())
    }

    fn put_blob(&self, digest: &ContentHash, bytes: &[u8]) -> AuditResult<()> {
        self.blobs
            .lock()
            .map_err(|_| AuditError::Storage("blob lock poisoned".to_string()))?
            .insert(*digest, bytes.to_vec());
        Ok(())
    }

    fn get_blob(&self, digest: &ContentHash) -> AuditResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .map_err(|_| AuditError::Storage("blob lock poisoned".to_string()))?
            .get(digest)
            .cloned())
    }
}

/// File-backed storage.
pub struct FileAuditStorage {
    log_path: PathBuf,
    tail_path: PathBuf,
    blob_dir: PathBuf,
    // Serializes writers to the log file.
    write_lock: Mutex<()>,
}

impl FileAuditStorage {
    /// Open (or create) storage rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> AuditResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let blob_dir = dir.join("blobs");
        std::fs::create_dir_all(&blob_dir)?;
        Ok(Self {
            log_path: dir.join("audit.log"),
            tail_path: dir.join("audit.tail"),
            blob_dir,
            write_lock: Mutex::new(()),
        })
    }
}

impl AuditStorage for FileAuditStorage {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| AuditError::Storage("record exceeds 4 GiB".to_string()))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuditError::Storage("write lock poisoned".to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(&len.to_le_bytes())?;
        file.write_all(&bytes)?;
        file.sync_data()?;
        debug!(seq = record.entry.seq, "audit record appended");
        Ok(())
    }

    fn load_all(&self) -> AuditResult<Vec<AuditRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let mut file = std::fs::File::open(&self.log_path)?;
        let mut records = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match file.read_exact(&mut len_bytes) {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut bytes = vec![0u8; len];
            file.read_exact(&mut bytes)?;
            let record: AuditRecord = serde_json::from_slice(&bytes)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn load_tail(&self) -> AuditResult<Option<ChainTail>> {
        if !self.tail_path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.tail_path)?;
        let tail =
            serde_json::from_str(&contents).map_err(|e| AuditError::Serialization(e.to_string()))?;
        Ok(Some(tail))
    }

    fn store_tail(&self, tail: &ChainTail) -> AuditResult<()> {
        let contents =
            serde_json::to_string(tail).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let tmp = self.tail_path.with_extension("tail.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.tail_path)?;
        Ok(())
    }

    fn put_blob(&self, digest: &ContentHash, bytes: &[u8]) -> AuditResult<()> {
        let path = self.blob_dir.join(digest.to_hex());
        if path.exists() {
            // Content-addressed: an existing blob is already correct.
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get_blob(&self, digest: &ContentHash) -> AuditResult<Option<Vec<u8>>> {
        let path = self.blob_dir.join(digest.to_hex());
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }
}
