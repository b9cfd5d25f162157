//! Routing decisions and the vocabulary they are made in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of on-device model, smallest to largest.
///
/// The model catalog maps each class to a concrete model (name, quality
/// scores, memory requirements); the decision engine works in classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelClass {
    /// Compact model (phi-4 class, ~4B parameters).
    Compact,
    /// Mid-size model (~8-14B parameters).
    Standard,
    /// Large model (70B class).
    Large,
}

impl ModelClass {
    /// All classes, smallest first.
    pub const ALL: [Self; 3] = [Self::Compact, Self::Standard, Self::Large];
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Standard => write!(f, "standard"),
            Self::Large => write!(f, "large"),
        }
    }
}

/// Cloud inference provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProviderKind {
    /// Anthropic-style messages API (content block deltas over SSE).
    Anthropic,
    /// OpenAI-style chat completions API (choice deltas over SSE).
    OpenAi,
    /// Google-style generate-content API (candidate parts over SSE).
    Google,
}

impl CloudProviderKind {
    /// All known providers.
    pub const ALL: [Self; 3] = [Self::Anthropic, Self::OpenAi, Self::Google];

    /// Stable identifier used for credential service names and audit
    /// payloads.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }

    /// Parse from the stable identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

impl fmt::Display for CloudProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Broad task category inferred from the prompt.
///
/// Local models have per-task quality scores; a model that writes good
/// code may summarize poorly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// General question answering and conversation.
    #[default]
    General,
    /// Code generation or analysis.
    Code,
    /// Summarization and condensation.
    Summarize,
    /// Creative writing.
    Creative,
}

/// Where a request was (or will be) executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionLocation {
    /// On-device accelerator.
    Local,
    /// Remote cloud provider.
    Cloud,
}

impl fmt::Display for ExecutionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// The routing engine's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum RouterDecision {
    /// Execute on device with the given model class.
    Local {
        /// Model class to load.
        model: ModelClass,
    },
    /// Execute via the given cloud provider and model.
    Cloud {
        /// Provider to call.
        provider: CloudProviderKind,
        /// Provider-specific model name.
        model: String,
    },
}

impl RouterDecision {
    /// Where this decision executes.
    #[must_use]
    pub fn location(&self) -> ExecutionLocation {
        match self {
            Self::Local { .. } => ExecutionLocation::Local,
            Self::Cloud { .. } => ExecutionLocation::Cloud,
        }
    }

    /// Whether this decision stays on device.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// The cloud provider, if this decision leaves the device.
    #[must_use]
    pub fn provider(&self) -> Option<CloudProviderKind> {
        match self {
            Self::Local { .. } => None,
            Self::Cloud { provider, .. } => Some(*provider),
        }
    }
}

impl fmt::Display for RouterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { model } => write!(f, "local({model})"),
            Self::Cloud { provider, model } => write!(f, "cloud({provider}, {model})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_roundtrip() {
        for provider in CloudProviderKind::ALL {
            assert_eq!(CloudProviderKind::from_id(provider.id()), Some(provider));
        }
        assert_eq!(CloudProviderKind::from_id("unknown"), None);
    }

    #[test]
    fn test_decision_location() {
        let local = RouterDecision::Local {
            model: ModelClass::Compact,
        };
        assert!(local.is_local());
        assert_eq!(local.location(), ExecutionLocation::Local);
        assert_eq!(local.provider(), None);

        let cloud = RouterDecision::Cloud {
            provider: CloudProviderKind::Anthropic,
            model: "claude-sonnet".to_string(),
        };
        assert!(!cloud.is_local());
        assert_eq!(cloud.provider(), Some(CloudProviderKind::Anthropic));
    }

    #[test]
    fn test_decision_display() {
        let cloud = RouterDecision::Cloud {
            provider: CloudProviderKind::OpenAi,
            model: "gpt-4o".to_string(),
        };
        assert_eq!(cloud.to_string(), "cloud(openai, gpt-4o)");
    }
}
