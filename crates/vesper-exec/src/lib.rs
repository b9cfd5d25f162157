//! Vesper Exec - The hybrid execution manager and router facade.
//!
//! [`HybridRouter`] is the single entry point every prompt flows
//! through: sanitize, assess, decide, execute, audit. The
//! [`HybridExecutionManager`] beneath it owns the accelerator lock
//! (at most one local inference at any instant), the cloud concurrency
//! cap, the redaction gate in front of every outbound byte, retries
//! with backoff, circuit breaking, and cancellation.
//!
//! # State machine
//!
//! `Idle -> Admitting -> Running(Local | Cloud) -> Completed | Failed |
//! Cancelled`. Admission re-reads `(SystemState, SecurityPolicy,
//! NetworkReachability)` and re-applies the policy gate; a decision
//! made milliseconds earlier may be invalidated and downgraded to
//! cloud (or rejected) if the system crossed a threshold.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod admission;
mod manager;
mod router;

pub use admission::{AcceleratorGuard, AcceleratorLock};
pub use manager::{ExecutionContext, HybridExecutionManager, ManagerPorts};
pub use router::{HybridRouter, RouterPorts};
