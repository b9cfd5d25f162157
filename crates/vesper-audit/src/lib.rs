//! Vesper Audit - Chain-linked audit logging.
//!
//! Every security-relevant router action is recorded as an audit
//! entry. Entries are chain-linked: each carries the hash of the
//! previous, so any modification to history breaks the chain and is
//! detectable.
//!
//! # Chain discipline
//!
//! `hash = SHA256(prev_hash || seq || timestamp || kind ||
//! payload_digest)` where `payload_digest = SHA256(payload)`. A
//! companion tail record `(seq, hash)` is persisted under the same
//! atomic-rename discipline as the log; on open the chain is verified
//! against the tail and appends are refused if the tail does not
//! verify. Payloads above a threshold are stored out-of-band and only
//! their digest enters the chain.
//!
//! # Example
//!
//! ```
//! use vesper_audit::{AuditLog, AuditPayload, MemoryAuditStorage};
//!
//! let log = AuditLog::open(Box::new(MemoryAuditStorage::new())).unwrap();
//! log.append(&AuditPayload::RouterStarted {
//!     version: "0.1.0".to_string(),
//! })
//! .unwrap();
//!
//! let report = log.verify_chain().unwrap();
//! assert!(report.valid);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod log;
mod storage;

pub use entry::{AuditEntry, AuditPayload, AuditRecord, ChainTail, PayloadStorage};
pub use error::{AuditError, AuditResult};
pub use log::{AuditLog, ChainIssue, ChainVerification};
pub use storage::{AuditStorage, FileAuditStorage, MemoryAuditStorage};
