//! The policy manager.
//!
//! Owns the active [`SecurityPolicy`] exclusively. Everything else
//! receives immutable snapshots; a policy change is a wholesale
//! replacement. Lockdown-on captures the prior state; lockdown-off
//! restores it.

use std::sync::RwLock;
use tracing::{info, warn};
use vesper_core::SecurityPolicy;

/// Serial owner of the active security policy.
#[derive(Debug)]
pub struct PolicyManager {
    active: RwLock<SecurityPolicy>,
}

impl PolicyManager {
    /// Create a manager with the given initial policy.
    #[must_use]
    pub fn new(initial: SecurityPolicy) -> Self {
        Self {
            active: RwLock::new(initial),
        }
    }

    /// Snapshot the active policy.
    #[must_use]
    pub fn snapshot(&self) -> SecurityPolicy {
        self.active
            .read()
            .map_or_else(|_| SecurityPolicy::balanced().lockdown(), |g| g.clone())
    }

    /// Replace the policy wholesale.
    pub fn replace(&self, policy: SecurityPolicy) {
        if let Ok(mut guard) = self.active.write() {
            info!(execution_policy = %policy.execution_policy, lockdown = policy.is_lockdown, "policy replaced");
            *guard = policy;
        }
    }

    /// Engage lockdown, capturing the current policy for restore.
    pub fn engage_lockdown(&self) {
        if let Ok(mut guard) = self.active.write() {
            if guard.is_lockdown {
                return;
            }
            warn!("lockdown engaged");
            let prior = guard.clone();
            *guard = prior.lockdown();
        }
    }

    /// Release lockdown, restoring the captured pre-lockdown policy.
    pub fn release_lockdown(&self) {
        if let Ok(mut guard) = self.active.write() {
            if !guard.is_lockdown {
                return;
            }
            info!("lockdown released");
            let locked = guard.clone();
            *guard = locked.release_lockdown();
        }
    }

    /// Whether lockdown is currently engaged.
    #[must_use]
    pub fn is_lockdown(&self) -> bool {
        self.active.read().is_ok_and(|g| g.is_lockdown)
    }
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new(SecurityPolicy::balanced())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::ExecutionPolicy;

    #[test]
    fn test_snapshot_is_detached() {
        let manager = PolicyManager::default();
        let snapshot = manager.snapshot();
        manager.engage_lockdown();
        // The earlier snapshot is unaffected by later mutation.
        assert!(!snapshot.is_lockdown);
        assert!(manager.is_lockdown());
    }

    #[test]
    fn test_lockdown_lifecycle() {
        let manager = PolicyManager::new(SecurityPolicy::with_execution_policy(
            ExecutionPolicy::Performance,
        ));

        manager.engage_lockdown();
        let locked = manager.snapshot();
        assert!(locked.is_lockdown);
        assert_eq!(locked.execution_policy, ExecutionPolicy::SafeMode);

        manager.release_lockdown();
        let restored = manager.snapshot();
        assert!(!restored.is_lockdown);
        assert_eq!(restored.execution_policy, ExecutionPolicy::Performance);
    }

    #[test]
    fn test_double_engage_is_idempotent() {
        let manager = PolicyManager::default();
        manager.engage_lockdown();
        manager.engage_lockdown();
        manager.release_lockdown();
        assert!(!manager.is_lockdown());
    }

    #[test]
    fn test_release_without_lockdown_is_noop() {
        let manager = PolicyManager::default();
        manager.release_lockdown();
        assert!(!manager.is_lockdown());
    }
}
