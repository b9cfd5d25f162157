//! Audit error types.

use thiserror::Error;

/// Errors from audit log operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The storage backend failed.
    #[error("audit storage error: {0}")]
    Storage(String),

    /// A record could not be serialized or deserialized.
    #[error("audit serialization error: {0}")]
    Serialization(String),

    /// The persisted tail does not match the last log record. The log
    /// refuses to append until the operator intervenes.
    #[error("audit tail mismatch: tail says seq {tail_seq}, log ends at {log_seq}")]
    TailMismatch {
        /// Sequence recorded in the tail file.
        tail_seq: u64,
        /// Sequence of the last log record (`u64::MAX` for an empty log).
        log_seq: u64,
    },

    /// The chain failed verification on open.
    #[error("audit chain broken at seq {seq}: {detail}")]
    ChainBroken {
        /// First broken sequence.
        seq: u64,
        /// What failed.
        detail: String,
    },

    /// An I/O error from the file backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
