//! Execution results.

use crate::decision::ExecutionLocation;
use crate::ids::IntentId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token accounting for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Total tokens used.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Accumulate usage reported incrementally during streaming.
    pub fn absorb(&mut self, other: TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.max(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.max(other.completion_tokens);
    }
}

/// The outcome of a successfully executed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Intent this result belongs to.
    pub intent_id: IntentId,
    /// Generated output text.
    pub output: String,
    /// Where execution happened.
    pub location: ExecutionLocation,
    /// Token accounting.
    pub tokens_used: TokenUsage,
    /// Wall-clock duration of the execution.
    pub duration: Duration,
    /// Whether the egress filter redacted sensitive content before the
    /// payload left the device.
    pub redaction_applied: bool,
    /// HMAC signature over `(version_counter || output)`, encoded as
    /// `<version_counter>:<hex tag>`. Absent when the signing identity
    /// was unavailable; such results verify as unverified.
    pub signature: Option<String>,
}

impl ExecutionResult {
    /// Whether the result carries a signature at all.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total_saturates() {
        let usage = TokenUsage {
            prompt_tokens: u64::MAX,
            completion_tokens: 1,
        };
        assert_eq!(usage.total(), u64::MAX);
    }

    #[test]
    fn test_usage_absorb_takes_max() {
        let mut usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        usage.absorb(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 40,
        });
        assert_eq!(usage.completion_tokens, 40);
        assert_eq!(usage.prompt_tokens, 10);
    }
}
