//! Vesper Guard - Failure guards for the execution manager.
//!
//! Three small machines gate every cloud dispatch:
//!
//! - A per-provider [`CircuitBreaker`] (`Closed` / `Open` / `HalfOpen`
//!   with at most one probe in flight)
//! - A per-channel token-bucket [`RateBucket`]
//! - A [`RetryPolicy`] computing exponential backoff with an upstream
//!   `Retry-After` override
//!
//! All three are plain state machines driven by caller-supplied
//! instants, so every transition is unit-testable without sleeping.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod breaker;
mod bucket;
mod retry;

pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use bucket::{RateBucket, RateLimiter};
pub use retry::RetryPolicy;
