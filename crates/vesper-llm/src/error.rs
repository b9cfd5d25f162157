//! LLM backend error types.

use std::time::Duration;
use thiserror::Error;
use vesper_core::CloudProviderKind;

/// Errors from local or cloud inference backends.
///
/// The execution manager reclassifies these into the router error
/// taxonomy at its boundary; retry decisions are made there, driven by
/// [`LlmError::is_retryable`].
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential stored for the provider.
    #[error("no credential for provider {provider}")]
    CredentialMissing {
        /// Provider whose credential is missing.
        provider: CloudProviderKind,
    },

    /// Upstream rate limit.
    #[error("rate limited")]
    RateLimited {
        /// `Retry-After` delay, if the provider supplied one.
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status.
    #[error("http {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Transport-level failure (connect, TLS, mid-stream disconnect).
    #[error("transport error: {0}")]
    Transport(String),

    /// The stream produced no bytes within the progress window.
    #[error("stream stalled")]
    Stalled,

    /// The provider sent something the parser cannot understand.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A provider-reported in-stream error event.
    #[error("provider stream error: {0}")]
    StreamError(String),

    /// The runtime or transport was misconfigured.
    #[error("configuration error: {0}")]
    Config(String),

    /// The local runtime is already serving a generation.
    #[error("local runtime busy")]
    RuntimeBusy,

    /// Generation was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether the failure is transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) | Self::Stalled => true,
            Self::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            },
            _ => false,
        }
    }
}

/// Result type for backend operations.
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let retryable = [408u16, 429, 500, 502, 503, 599];
        for status in retryable {
            assert!(
                LlmError::Http {
                    status,
                    message: String::new()
                }
                .is_retryable(),
                "{status} should be retryable"
            );
        }
        for status in [400u16, 401, 403, 404, 422] {
            assert!(
                !LlmError::Http {
                    status,
                    message: String::new()
                }
                .is_retryable(),
                "{status} should not be retryable"
            );
        }
    }

    #[test]
    fn test_transport_is_retryable() {
        assert!(LlmError::Transport("reset".to_string()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
        assert!(
            !LlmError::CredentialMissing {
                provider: CloudProviderKind::Google
            }
            .is_retryable()
        );
    }
}
