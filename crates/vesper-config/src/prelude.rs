//! Prelude module - commonly used types for convenient import.

pub use crate::{
    CircuitBreakerSettings, ConfigError, ConfigResult, RateLimitSettings, RetrySettings,
    RouterConfig, TimeoutSettings, load, load_from_str, validate,
};
