//! The router error taxonomy.
//!
//! Every failure anywhere in the pipeline is reclassified into one of
//! these kinds at the boundary where it occurs. Retries apply only to
//! retryable kinds and only inside the execution manager.

use crate::decision::CloudProviderKind;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the hybrid router.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// The input was rejected before routing (empty, oversized, malformed).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The active security policy forbids every viable route.
    #[error("policy denied: {reason}")]
    PolicyDenied {
        /// Why the policy refused the request.
        reason: String,
    },

    /// Network unreachable and no local route was feasible.
    #[error("offline and no local route available")]
    Offline,

    /// The accelerator is busy and no fallback was permitted.
    #[error("system busy: accelerator in use")]
    SystemBusy,

    /// The provider's circuit breaker is open.
    #[error("circuit open for provider {provider}")]
    CircuitOpen {
        /// Provider whose breaker rejected the dispatch.
        provider: CloudProviderKind,
    },

    /// Rate limit reached, either locally or upstream.
    #[error("rate limited")]
    RateLimited {
        /// Upstream-provided delay before retrying, if any.
        retry_after: Option<Duration>,
    },

    /// The provider returned a non-retryable error, or retries were
    /// exhausted.
    #[error("provider error {code}: {message}")]
    ProviderError {
        /// HTTP status or provider-specific code.
        code: u16,
        /// Provider-supplied message.
        message: String,
    },

    /// A bounded operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// No credential is stored for the provider the route requires.
    #[error("no credential stored for provider {provider}")]
    CredentialMissing {
        /// Provider whose credential was missing.
        provider: CloudProviderKind,
    },

    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,

    /// An internal invariant failed. Detail goes to the audit log; the
    /// user sees a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Severity rank for precedence ordering. Lower ranks are reported
    /// in preference to higher ones when multiple failures coincide.
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => 0,
            Self::PolicyDenied { .. } => 1,
            Self::Offline => 2,
            Self::SystemBusy => 3,
            Self::CircuitOpen { .. } => 4,
            Self::RateLimited { .. } => 5,
            Self::ProviderError { .. } => 6,
            Self::Timeout => 7,
            Self::Cancelled | Self::CredentialMissing { .. } | Self::Internal(_) => 8,
        }
    }

    /// Whether the execution manager may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout => true,
            Self::ProviderError { code, .. } => {
                *code == 408 || *code == 429 || (500..=599).contains(code)
            },
            _ => false,
        }
    }

    /// Short, actionable message for user display.
    ///
    /// Non-actionable internal errors surface generically; full detail
    /// is recorded to the audit log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(detail) => format!("Invalid input: {detail}."),
            Self::PolicyDenied { reason } => format!("Blocked by policy: {reason}."),
            Self::Offline => "Offline. Switched to local mode.".to_string(),
            Self::SystemBusy => "The device is busy with another request.".to_string(),
            Self::CircuitOpen { provider } => {
                format!("{provider} is temporarily unavailable.")
            },
            Self::RateLimited {
                retry_after: Some(delay),
            } => {
                format!("Rate limit reached; try again in {}s.", delay.as_secs())
            },
            Self::RateLimited { retry_after: None } => {
                "Rate limit reached; try again shortly.".to_string()
            },
            Self::ProviderError { code, .. } => {
                format!("The provider returned an error ({code}).")
            },
            Self::Timeout => "The request timed out.".to_string(),
            Self::CredentialMissing { provider } => {
                format!("No API key configured for {provider}.")
            },
            Self::Cancelled => "Cancelled.".to_string(),
            Self::Internal(_) => "Temporary issue. Try again.".to_string(),
        }
    }

    /// Process exit code for CLI harnesses.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) => 5,
            Self::PolicyDenied { .. } => 1,
            Self::Offline => 2,
            Self::SystemBusy => 3,
            Self::CircuitOpen { .. }
            | Self::RateLimited { .. }
            | Self::ProviderError { .. }
            | Self::Timeout
            | Self::CredentialMissing { .. }
            | Self::Cancelled
            | Self::Internal(_) => 4,
        }
    }

    /// Stable kind string for audit payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::PolicyDenied { .. } => "policy_denied",
            Self::Offline => "offline",
            Self::SystemBusy => "system_busy",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::RateLimited { .. } => "rate_limited",
            Self::ProviderError { .. } => "provider_error",
            Self::Timeout => "timeout",
            Self::CredentialMissing { .. } => "credential_missing",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type used across the router crates.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_precedence() {
        let invalid = RouterError::InvalidInput("empty".to_string());
        let denied = RouterError::PolicyDenied {
            reason: "lockdown".to_string(),
        };
        let timeout = RouterError::Timeout;

        assert!(invalid.severity() < denied.severity());
        assert!(denied.severity() < RouterError::Offline.severity());
        assert!(RouterError::SystemBusy.severity() < timeout.severity());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            RouterError::RateLimited {
                retry_after: None
            }
            .is_retryable()
        );
        assert!(RouterError::Timeout.is_retryable());
        assert!(
            RouterError::ProviderError {
                code: 503,
                message: "unavailable".to_string(),
            }
            .is_retryable()
        );
        assert!(
            !RouterError::ProviderError {
                code: 400,
                message: "bad request".to_string(),
            }
            .is_retryable()
        );
        assert!(
            !RouterError::PolicyDenied {
                reason: "lockdown".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = RouterError::Internal("mutex poisoned in admission".to_string());
        assert_eq!(err.user_message(), "Temporary issue. Try again.");
    }

    #[test]
    fn test_rate_limit_message_includes_delay() {
        let err = RouterError::RateLimited {
            retry_after: Some(Duration::from_secs(12)),
        };
        assert_eq!(err.user_message(), "Rate limit reached; try again in 12s.");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            RouterError::PolicyDenied {
                reason: String::new()
            }
            .exit_code(),
            1
        );
        assert_eq!(RouterError::Offline.exit_code(), 2);
        assert_eq!(RouterError::SystemBusy.exit_code(), 3);
        assert_eq!(RouterError::Timeout.exit_code(), 4);
        assert_eq!(
            RouterError::InvalidInput(String::new()).exit_code(),
            5
        );
    }
}
