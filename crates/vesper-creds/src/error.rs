//! Credential store error types.

use thiserror::Error;

/// Errors from credential store operations.
#[derive(Debug, Error)]
pub enum CredError {
    /// The backing store could not be read or written.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// The secrets file has permissions that expose it.
    #[error("secrets file {path} has insecure permissions {mode:o}, should be 0600")]
    InsecurePermissions {
        /// Offending file path.
        path: String,
        /// Observed mode bits.
        mode: u32,
    },

    /// The stored data could not be parsed.
    #[error("credential parse error: {0}")]
    Parse(String),

    /// An I/O error from the filesystem backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for credential operations.
pub type CredResult<T> = Result<T, CredError>;
