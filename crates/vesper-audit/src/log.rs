//! The audit log: serialized appends, chain verification.

use std::sync::Mutex;
use tracing::{error, info};
use vesper_core::Timestamp;
use vesper_crypto::ContentHash;

use crate::entry::{AuditEntry, AuditPayload, AuditRecord, ChainTail, PayloadStorage};
use crate::error::{AuditError, AuditResult};
use crate::storage::AuditStorage;

/// Payloads above this size go out-of-band; only the digest enters the
/// chain record.
const BLOB_THRESHOLD: usize = 4096;

/// A problem found while verifying the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIssue {
    /// Sequence where the problem was found.
    pub seq: u64,
    /// What failed.
    pub detail: String,
}

/// Result of a chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    /// Whether the whole chain verified.
    pub valid: bool,
    /// Number of entries checked.
    pub length: u64,
    /// Every problem found. Empty when valid.
    pub issues: Vec<ChainIssue>,
}

struct ChainHead {
    next_seq: u64,
    prev_hash: ContentHash,
}

/// The append-only audit log.
///
/// Appends are serialized through an internal lock; reads go straight
/// to storage. The log refuses to open over a chain whose tail does
/// not verify.
pub struct AuditLog {
    storage: Box<dyn AuditStorage>,
    head: Mutex<ChainHead>,
}

impl AuditLog {
    /// Open the log over a storage backend, verifying the existing
    /// chain against the persisted tail.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ChainBroken`] or
    /// [`AuditError::TailMismatch`] when history fails verification;
    /// the log must not be appended to in that state.
    pub fn open(storage: Box<dyn AuditStorage>) -> AuditResult<Self> {
        let records = storage.load_all()?;
        let verification = verify_records(&records);
        if !verification.valid {
            let first = verification
                .issues
                .first()
                .cloned()
                .unwrap_or(ChainIssue {
                    seq: 0,
                    detail: "unknown".to_string(),
                });
            error!(seq = first.seq, detail = %first.detail, "audit chain failed verification");
            return Err(AuditError::ChainBroken {
                seq: first.seq,
                detail: first.detail,
            });
        }

        let tail = storage.load_tail()?;
        let last = records.last().map(|r| &r.entry);
        match (tail, last) {
            (None, _) => {},
            (Some(tail), None) => {
                return Err(AuditError::TailMismatch {
                    tail_seq: tail.seq,
                    log_seq: u64::MAX,
                });
            },
            (Some(tail), Some(last)) => {
                // The tail must point at a real entry in the verified
                // chain. Pointing behind the last record is the crash
                // window between record append and tail write; repair
                // it forward. Anything else refuses the log.
                let tail_matches = usize::try_from(tail.seq)
                    .ok()
                    .and_then(|i| records.get(i))
                    .is_some_and(|r| r.entry.hash == tail.hash);
                if !tail_matches {
                    return Err(AuditError::TailMismatch {
                        tail_seq: tail.seq,
                        log_seq: last.seq,
                    });
                }
                if tail.seq != last.seq {
                    info!(
                        tail_seq = tail.seq,
                        log_seq = last.seq,
                        "tail lagged behind log, repairing"
                    );
                    storage.store_tail(&ChainTail {
                        seq: last.seq,
                        hash: last.hash,
                    })?;
                }
            },
        }

        let head = match last {
            Some(entry) => ChainHead {
                next_seq: entry.seq.saturating_add(1),
                prev_hash: entry.hash,
            },
            None => ChainHead {
                next_seq: 0,
                prev_hash: ContentHash::zero(),
            },
        };

        info!(entries = records.len(), "audit log opened, chain verified");
        Ok(Self {
            storage,
            head: Mutex::new(head),
        })
    }

    /// Append one payload, extending the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails. A failed
    /// append does not advance the chain head.
    pub fn append(&self, payload: &AuditPayload) -> AuditResult<AuditEntry> {
        // Digest over canonical bytes (sorted object keys), so a
        // round-trip through storage reproduces the digested form
        // exactly.
        let value = serde_json::to_value(payload)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        let payload_bytes =
            serde_json::to_vec(&value).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let payload_digest = ContentHash::hash(&payload_bytes);

        let stored_payload = if payload_bytes.len() > BLOB_THRESHOLD {
            self.storage.put_blob(&payload_digest, &payload_bytes)?;
            PayloadStorage::Blob {
                digest: payload_digest,
            }
        } else {
            PayloadStorage::Inline { value }
        };

        let mut head = self
            .head
            .lock()
            .map_err(|_| AuditError::Storage("chain head lock poisoned".to_string()))?;

        let timestamp = Timestamp::now();
        let kind = payload.kind().to_string();
        let hash = AuditEntry::compute_hash(
            &head.prev_hash,
            head.next_seq,
            &timestamp,
            &kind,
            &payload_digest,
        );
        let entry = AuditEntry {
            seq: head.next_seq,
            timestamp,
            kind,
            payload_digest,
            prev_hash: head.prev_hash,
            hash,
        };

        let record = AuditRecord {
            entry: entry.clone(),
            payload: stored_payload,
        };
        self.storage.append(&record)?;
        self.storage.store_tail(&ChainTail {
            seq: entry.seq,
            hash: entry.hash,
        })?;

        head.next_seq = head.next_seq.saturating_add(1);
        head.prev_hash = entry.hash;
        Ok(entry)
    }

    /// Every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn records(&self) -> AuditResult<Vec<AuditRecord>> {
        self.storage.load_all()
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn len(&self) -> AuditResult<u64> {
        Ok(self.storage.load_all()?.len() as u64)
    }

    /// Whether the log is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn is_empty(&self) -> AuditResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Recompute every link and report the chain's health.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn verify_chain(&self) -> AuditResult<ChainVerification> {
        Ok(verify_records(&self.storage.load_all()?))
    }

    /// Fetch the payload bytes for a record, resolving blob references.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced blob is missing or unreadable.
    pub fn payload_bytes(&self, record: &AuditRecord) -> AuditResult<Vec<u8>> {
        match &record.payload {
            PayloadStorage::Inline { value } => {
                serde_json::to_vec(value).map_err(|e| AuditError::Serialization(e.to_string()))
            },
            PayloadStorage::Blob { digest } => self
                .storage
                .get_blob(digest)?
                .ok_or_else(|| AuditError::Storage(format!("missing blob {digest}"))),
        }
    }
}

fn verify_records(records: &[AuditRecord]) -> ChainVerification {
    let mut issues = Vec::new();
    let mut prev_hash = ContentHash::zero();

    for (index, record) in records.iter().enumerate() {
        let entry = &record.entry;
        let expected_seq = index as u64;

        if entry.seq != expected_seq {
            issues.push(ChainIssue {
                seq: expected_seq,
                detail: format!("expected seq {expected_seq}, found {}", entry.seq),
            });
        }
        if entry.prev_hash != prev_hash {
            issues.push(ChainIssue {
                seq: entry.seq,
                detail: "prev_hash does not match previous entry".to_string(),
            });
        }
        if entry.hash != entry.expected_hash() {
            issues.push(ChainIssue {
                seq: entry.seq,
                detail: "hash does not match entry contents".to_string(),
            });
        }
        if let PayloadStorage::Inline { value } = &record.payload {
            let digest = serde_json::to_vec(value)
                .map(|bytes| ContentHash::hash(&bytes))
                .unwrap_or_default();
            if digest != entry.payload_digest {
                issues.push(ChainIssue {
                    seq: entry.seq,
                    detail: "payload digest does not match inline payload".to_string(),
                });
            }
        }
        prev_hash = entry.hash;
    }

    ChainVerification {
        valid: issues.is_empty(),
        length: records.len() as u64,
        issues,
    }
}
