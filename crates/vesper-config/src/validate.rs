//! Configuration validation.
//!
//! Problems are accumulated so the user sees every issue at once
//! rather than fixing them one reload at a time.

use crate::types::{ConfigError, ConfigResult, RouterConfig};

/// Validate a configuration snapshot.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] listing every problem found.
pub fn validate(config: &RouterConfig) -> ConfigResult<()> {
    let mut problems = Vec::new();

    if !(1..=10).contains(&config.local_quality_threshold) {
        problems.push(format!(
            "local_quality_threshold must be 1..=10, got {}",
            config.local_quality_threshold
        ));
    }

    if config.minimum_ram_for_local_gib == 0 {
        problems.push("minimum_ram_for_local_gib must be at least 1".to_string());
    }

    if config.max_concurrent_cloud_streams == 0 {
        problems.push("max_concurrent_cloud_streams must be at least 1".to_string());
    }

    if config.circuit_breaker.failure_threshold == 0 {
        problems.push("circuit_breaker.failure_threshold must be at least 1".to_string());
    }

    if config.retry.base_delay_seconds <= 0.0 {
        problems.push(format!(
            "retry.base_delay_seconds must be positive, got {}",
            config.retry.base_delay_seconds
        ));
    }

    if config.retry.multiplier < 1.0 {
        problems.push(format!(
            "retry.multiplier must be at least 1.0, got {}",
            config.retry.multiplier
        ));
    }

    if config.retry.max_delay_seconds < config.retry.base_delay_seconds {
        problems.push("retry.max_delay_seconds must be >= retry.base_delay_seconds".to_string());
    }

    if config.rate_limit.max_tokens == 0 {
        problems.push("rate_limit.max_tokens must be at least 1".to_string());
    }

    if config.rate_limit.refill_amount == 0 {
        problems.push("rate_limit.refill_amount must be at least 1".to_string());
    }

    if config.timeouts.cloud_request_seconds == 0 || config.timeouts.cloud_resource_seconds == 0 {
        problems.push("timeouts must be positive".to_string());
    }

    if config.timeouts.cloud_resource_seconds < config.timeouts.cloud_request_seconds {
        problems.push(
            "timeouts.cloud_resource_seconds must be >= timeouts.cloud_request_seconds"
                .to_string(),
        );
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}
