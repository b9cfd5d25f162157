//! Vesper Config - Unified configuration for the hybrid router.
//!
//! Configuration is loaded from a single TOML file, expanded
//! (`${VAR}` / `${VAR:-default}` environment references), validated,
//! and handed out as an immutable snapshot. Components never reload
//! behind the router's back; a new config means a new snapshot.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod loader;
mod types;
mod validate;

pub use loader::{config_dir, expand_env, load, load_from_str};
pub use types::{
    CircuitBreakerSettings, ConfigError, ConfigResult, RateLimitSettings, RetrySettings,
    RouterConfig, TimeoutSettings,
};
pub use validate::validate;
