//! Accelerator admission.
//!
//! At most one local inference is in flight at any instant. The lock
//! is a single atomic boolean; acquisition is a compare-exchange, and
//! release happens on guard drop so every terminal state (completed,
//! failed, cancelled, panicked task) frees the accelerator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The accelerator exclusivity lock.
#[derive(Debug, Clone, Default)]
pub struct AcceleratorLock {
    active: Arc<AtomicBool>,
}

impl AcceleratorLock {
    /// Create an idle lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically try to take the accelerator.
    ///
    /// Returns `None` when an inference is already running.
    #[must_use]
    pub fn try_acquire(&self) -> Option<AcceleratorGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AcceleratorGuard {
                active: Arc::clone(&self.active),
            })
    }

    /// Whether an inference currently holds the accelerator.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// RAII guard; dropping releases the accelerator.
#[derive(Debug)]
pub struct AcceleratorGuard {
    active: Arc<AtomicBool>,
}

impl Drop for AcceleratorGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_acquisition() {
        let lock = AcceleratorLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_active());
        assert!(lock.try_acquire().is_none());
    }

    #[test]
    fn test_release_on_drop() {
        let lock = AcceleratorLock::new();
        {
            let _guard = lock.try_acquire().expect("first acquire");
            assert!(lock.is_active());
        }
        assert!(!lock.is_active());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_no_instant_with_two_holders() {
        // Hammer the lock from many threads; at most one holder at any
        // instant, every acquisition eventually succeeds.
        let lock = AcceleratorLock::new();
        let concurrent = Arc::new(AtomicBool::new(false));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let lock = lock.clone();
                let concurrent = Arc::clone(&concurrent);
                scope.spawn(move || {
                    for _ in 0..200 {
                        if let Some(_guard) = lock.try_acquire() {
                            // A second holder here would mean the CAS
                            // admitted two at once.
                            assert!(
                                !concurrent.swap(true, Ordering::SeqCst),
                                "two holders observed"
                            );
                            concurrent.store(false, Ordering::SeqCst);
                        }
                    }
                });
            }
        });
    }
}
