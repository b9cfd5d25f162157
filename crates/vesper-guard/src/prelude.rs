//! Prelude module - commonly used types for convenient import.

pub use crate::{
    BreakerRegistry, BreakerState, CircuitBreaker, RateBucket, RateLimiter, RetryPolicy,
};
