//! Audit entry types and payloads.

use serde::{Deserialize, Serialize};
use vesper_core::{
    CloudProviderKind, ComplexityLevel, ExecutionLocation, IntentId, RouterDecision, Timestamp,
};
use vesper_crypto::ContentHash;

/// Chain metadata for one audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0.
    pub seq: u64,
    /// When the entry was appended.
    pub timestamp: Timestamp,
    /// Stable kind label of the payload.
    pub kind: String,
    /// SHA-256 digest of the serialized payload.
    pub payload_digest: ContentHash,
    /// Hash of the previous entry; zero for the genesis entry.
    pub prev_hash: ContentHash,
    /// This entry's chain hash.
    pub hash: ContentHash,
}

impl AuditEntry {
    /// Compute the chain hash for the given link inputs.
    #[must_use]
    pub fn compute_hash(
        prev_hash: &ContentHash,
        seq: u64,
        timestamp: &Timestamp,
        kind: &str,
        payload_digest: &ContentHash,
    ) -> ContentHash {
        ContentHash::hash_multi(&[
            prev_hash.as_bytes(),
            &seq.to_le_bytes(),
            &timestamp.0.timestamp_micros().to_le_bytes(),
            kind.as_bytes(),
            payload_digest.as_bytes(),
        ])
    }

    /// Recompute this entry's hash from its fields.
    #[must_use]
    pub fn expected_hash(&self) -> ContentHash {
        Self::compute_hash(
            &self.prev_hash,
            self.seq,
            &self.timestamp,
            &self.kind,
            &self.payload_digest,
        )
    }

    /// Whether this entry links correctly onto `previous`.
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.prev_hash == previous.hash && self.seq == previous.seq.saturating_add(1)
    }
}

/// Where the payload bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "snake_case")]
pub enum PayloadStorage {
    /// Payload stored inline in the record.
    Inline {
        /// The payload value.
        value: serde_json::Value,
    },
    /// Payload stored out-of-band, referenced by content hash.
    Blob {
        /// Digest naming the blob.
        digest: ContentHash,
    },
}

/// A chain entry together with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Chain metadata.
    pub entry: AuditEntry,
    /// The payload, inline or by reference.
    pub payload: PayloadStorage,
}

/// The persisted chain tail, written next to the log under the same
/// atomic-rename discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTail {
    /// Sequence of the last entry.
    pub seq: u64,
    /// Hash of the last entry.
    pub hash: ContentHash,
}

/// Auditable router actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditPayload {
    /// The router came up.
    RouterStarted {
        /// Crate version string.
        version: String,
    },

    /// A sanitizer pattern failed to compile and was dropped.
    PatternDropped {
        /// Pattern name.
        name: String,
        /// Compile error.
        error: String,
    },

    /// Input sanitization found violations.
    InputSanitized {
        /// Intent the input belongs to.
        intent_id: IntentId,
        /// Number of violations detected.
        violation_count: usize,
        /// Highest severity label.
        max_severity: String,
    },

    /// The routing engine produced a decision.
    DecisionMade {
        /// Intent the decision belongs to.
        intent_id: IntentId,
        /// The decision.
        decision: RouterDecision,
        /// Assessed complexity.
        complexity: ComplexityLevel,
        /// Human-readable rationale.
        reason: String,
    },

    /// An execution completed successfully.
    ExecutionCompleted {
        /// Intent that completed.
        intent_id: IntentId,
        /// Where it ran.
        location: ExecutionLocation,
        /// Total tokens used.
        tokens_used: u64,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
        /// Whether egress redaction fired.
        redaction_applied: bool,
    },

    /// An execution failed.
    ExecutionFailed {
        /// Intent that failed.
        intent_id: IntentId,
        /// Error kind label.
        error_kind: String,
        /// Full internal detail.
        detail: String,
    },

    /// An execution was cancelled by the caller.
    Cancelled {
        /// Intent that was cancelled.
        intent_id: IntentId,
        /// Chunks already delivered before cancellation.
        chunks_delivered: usize,
    },

    /// Lockdown was engaged.
    LockdownEngaged,

    /// Lockdown was released.
    LockdownReleased,

    /// A credential was stored for a provider.
    CredentialStored {
        /// Provider the credential belongs to.
        provider: CloudProviderKind,
    },

    /// A credential was deleted.
    CredentialDeleted {
        /// Provider whose credential was removed.
        provider: CloudProviderKind,
    },
}

impl AuditPayload {
    /// Stable kind label, hashed into the chain.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RouterStarted { .. } => "router_started",
            Self::PatternDropped { .. } => "pattern_dropped",
            Self::InputSanitized { .. } => "input_sanitized",
            Self::DecisionMade { .. } => "decision_made",
            Self::ExecutionCompleted { .. } => "execution_completed",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::LockdownEngaged => "lockdown_engaged",
            Self::LockdownReleased => "lockdown_released",
            Self::CredentialStored { .. } => "credential_stored",
            Self::CredentialDeleted { .. } => "credential_deleted",
        }
    }
}
