//! Security policy records.
//!
//! A [`SecurityPolicy`] is an immutable record replaced wholesale by the
//! policy manager. Lockdown-on captures the prior state so lockdown-off
//! can restore it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk posture attached to the active policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine operation.
    #[default]
    Low,
    /// Elevated caution; prefer privacy-preserving routes.
    Medium,
    /// Hostile environment assumed.
    High,
}

/// How aggressively the router may use hardware and cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Offload everything to a sovereign cloud provider.
    SafeMode,
    /// Weigh quality, privacy, and hardware state.
    #[default]
    Balanced,
    /// Prefer the highest-quality route regardless of cost.
    Performance,
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SafeMode => write!(f, "safe_mode"),
            Self::Balanced => write!(f, "balanced"),
            Self::Performance => write!(f, "performance"),
        }
    }
}

/// Immutable security policy snapshot.
///
/// Invariant: `is_lockdown` implies `execution_policy == SafeMode`.
/// [`SecurityPolicy::lockdown`] and [`SecurityPolicy::release_lockdown`]
/// preserve this by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Current risk posture.
    pub risk_level: RiskLevel,
    /// Active execution policy.
    pub execution_policy: ExecutionPolicy,
    /// Whether lockdown is engaged. Under lockdown no outbound network
    /// request is permitted.
    pub is_lockdown: bool,
    /// Policy in force before lockdown was engaged, restored on release.
    pub pre_lockdown_snapshot: Option<Box<SecurityPolicy>>,
}

impl SecurityPolicy {
    /// The default balanced policy.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            execution_policy: ExecutionPolicy::Balanced,
            is_lockdown: false,
            pre_lockdown_snapshot: None,
        }
    }

    /// Construct a policy with the given execution policy.
    #[must_use]
    pub fn with_execution_policy(execution_policy: ExecutionPolicy) -> Self {
        Self {
            execution_policy,
            ..Self::balanced()
        }
    }

    /// Engage lockdown, capturing the current state for later restore.
    ///
    /// Idempotent: locking down an already locked-down policy returns it
    /// unchanged.
    #[must_use]
    pub fn lockdown(self) -> Self {
        if self.is_lockdown {
            return self;
        }
        Self {
            risk_level: RiskLevel::High,
            execution_policy: ExecutionPolicy::SafeMode,
            is_lockdown: true,
            pre_lockdown_snapshot: Some(Box::new(self)),
        }
    }

    /// Release lockdown, restoring the captured pre-lockdown state.
    ///
    /// If no snapshot was captured (policy was constructed locked down),
    /// falls back to the balanced default.
    #[must_use]
    pub fn release_lockdown(self) -> Self {
        if !self.is_lockdown {
            return self;
        }
        match self.pre_lockdown_snapshot {
            Some(prior) => *prior,
            None => Self::balanced(),
        }
    }

    /// Whether cloud egress is permitted at all under this policy.
    #[must_use]
    pub fn permits_cloud(&self) -> bool {
        !self.is_lockdown
    }

    /// Whether execution must go through a sovereign provider when it
    /// leaves the device.
    #[must_use]
    pub fn requires_sovereign_cloud(&self) -> bool {
        self.execution_policy == ExecutionPolicy::SafeMode
            || self.risk_level >= RiskLevel::Medium
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::balanced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockdown_forces_safe_mode() {
        let policy = SecurityPolicy::with_execution_policy(ExecutionPolicy::Performance);
        let locked = policy.lockdown();

        assert!(locked.is_lockdown);
        assert_eq!(locked.execution_policy, ExecutionPolicy::SafeMode);
        assert!(!locked.permits_cloud());
    }

    #[test]
    fn test_lockdown_roundtrip_restores_prior_state() {
        let policy = SecurityPolicy::with_execution_policy(ExecutionPolicy::Performance);
        let restored = policy.clone().lockdown().release_lockdown();

        assert_eq!(restored, policy);
        assert!(restored.permits_cloud());
    }

    #[test]
    fn test_lockdown_idempotent() {
        let locked = SecurityPolicy::balanced().lockdown();
        let locked_again = locked.clone().lockdown();
        assert_eq!(locked, locked_again);
    }

    #[test]
    fn test_release_without_snapshot_falls_back() {
        let policy = SecurityPolicy {
            risk_level: RiskLevel::High,
            execution_policy: ExecutionPolicy::SafeMode,
            is_lockdown: true,
            pre_lockdown_snapshot: None,
        };
        assert_eq!(policy.release_lockdown(), SecurityPolicy::balanced());
    }

    #[test]
    fn test_safe_mode_requires_sovereign() {
        let policy = SecurityPolicy::with_execution_policy(ExecutionPolicy::SafeMode);
        assert!(policy.requires_sovereign_cloud());
        assert!(!SecurityPolicy::balanced().requires_sovereign_cloud());
    }
}
