//! Prompts, execution hints, and complexity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable user prompt plus the caller's routing preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// The prompt text (UTF-8).
    text: String,
    /// Caller preferences, subject to policy.
    hint: ExecutionHint,
}

impl Prompt {
    /// Create a prompt with the default hint.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hint: ExecutionHint::default(),
        }
    }

    /// Create a prompt with an explicit hint.
    pub fn with_hint(text: impl Into<String>, hint: ExecutionHint) -> Self {
        Self {
            text: text.into(),
            hint,
        }
    }

    /// The prompt text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The execution hint.
    #[must_use]
    pub fn hint(&self) -> &ExecutionHint {
        &self.hint
    }

    /// Whether the prompt is empty after trimming.
    ///
    /// Empty prompts are rejected before routing.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Character count of the prompt text.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Per-request caller preferences overriding defaults, subject to policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHint {
    /// Allow routing to non-sovereign public cloud providers.
    pub allow_public_cloud: bool,
    /// Require local execution. Honored unless local is infeasible.
    pub force_local: bool,
    /// Require cloud execution. Honored only if policy permits cloud and
    /// an approved provider exists.
    pub force_cloud: bool,
    /// Optional output token budget for this request.
    pub token_budget: Option<u32>,
}

impl ExecutionHint {
    /// A hint requesting local execution.
    #[must_use]
    pub fn local() -> Self {
        Self {
            force_local: true,
            ..Self::default()
        }
    }

    /// A hint requesting cloud execution with public providers allowed.
    #[must_use]
    pub fn cloud() -> Self {
        Self {
            allow_public_cloud: true,
            force_cloud: true,
            ..Self::default()
        }
    }

    /// Set the token budget.
    #[must_use]
    pub fn with_token_budget(mut self, budget: u32) -> Self {
        self.token_budget = Some(budget);
        self
    }
}

/// Assessed complexity of a prompt.
///
/// Drives the minimum local-model quality required to keep the request
/// on device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Simple factual or conversational prompts.
    Low,
    /// Multi-step or structured prompts.
    Medium,
    /// Long, multi-part, or reasoning-heavy prompts.
    High,
}

impl ComplexityLevel {
    /// Minimum local-model quality score required for this level.
    #[must_use]
    pub fn min_quality(&self) -> u8 {
        match self {
            Self::Low => 5,
            Self::Medium => 7,
            Self::High => 9,
        }
    }

    /// Expected output token range for this level.
    #[must_use]
    pub fn token_range_hint(&self) -> (u32, u32) {
        match self {
            Self::Low => (1, 100),
            Self::Medium => (101, 1000),
            Self::High => (1001, 8000),
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}
