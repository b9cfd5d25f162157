//! Prelude module - commonly used types for convenient import.

pub use crate::{
    AuditEntry, AuditError, AuditLog, AuditPayload, AuditRecord, AuditResult, AuditStorage,
    ChainIssue, ChainTail, ChainVerification, FileAuditStorage, MemoryAuditStorage,
    PayloadStorage,
};
