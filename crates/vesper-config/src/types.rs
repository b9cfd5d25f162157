//! Configuration types and defaults.
//!
//! Every field has a serde default so a partial TOML file (or none at
//! all) yields the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vesper_core::{CloudProviderKind, ModelClass, ThermalState};
use vesper_sanitize::EgressConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML.
    #[error("config parse error: {0}")]
    Parse(String),

    /// Validation failed; all problems are listed.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// An environment reference could not be resolved.
    #[error("environment variable not set: {0}")]
    MissingEnv(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds spent open before a half-open probe is admitted.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_seconds() -> u64 {
    60
}

impl CircuitBreakerSettings {
    /// Cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

/// Retry and backoff tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts before surfacing the error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Exponential backoff base in seconds.
    #[serde(default = "default_base_delay_seconds")]
    pub base_delay_seconds: f64,
    /// Backoff multiplier per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Backoff ceiling in seconds.
    #[serde(default = "default_max_delay_seconds")]
    pub max_delay_seconds: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_seconds() -> f64 {
    1.0
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_seconds() -> f64 {
    60.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_seconds: default_base_delay_seconds(),
            multiplier: default_multiplier(),
            max_delay_seconds: default_max_delay_seconds(),
        }
    }
}

/// Per-channel token bucket tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Bucket capacity.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Tokens added per refill.
    #[serde(default = "default_refill_amount")]
    pub refill_amount: u32,
    /// Seconds between refills.
    #[serde(default = "default_refill_interval_seconds")]
    pub refill_interval_seconds: u64,
}

fn default_max_tokens() -> u32 {
    60
}

fn default_refill_amount() -> u32 {
    1
}

fn default_refill_interval_seconds() -> u64 {
    1
}

impl RateLimitSettings {
    /// Refill interval as a duration.
    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_seconds)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            refill_amount: default_refill_amount(),
            refill_interval_seconds: default_refill_interval_seconds(),
        }
    }
}

/// External-call deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Cloud request timeout in seconds.
    #[serde(default = "default_cloud_request_seconds")]
    pub cloud_request_seconds: u64,
    /// Cloud resource timeout in seconds.
    #[serde(default = "default_cloud_resource_seconds")]
    pub cloud_resource_seconds: u64,
    /// Streaming stall limit in seconds; no byte within this window
    /// aborts the stream.
    #[serde(default = "default_stall_seconds")]
    pub stall_seconds: u64,
    /// Floor for the local generation ceiling in seconds.
    #[serde(default = "default_local_minimum_seconds")]
    pub local_minimum_seconds: u64,
}

fn default_cloud_request_seconds() -> u64 {
    15
}

fn default_cloud_resource_seconds() -> u64 {
    30
}

fn default_stall_seconds() -> u64 {
    30
}

fn default_local_minimum_seconds() -> u64 {
    10
}

impl TimeoutSettings {
    /// Cloud request timeout.
    #[must_use]
    pub fn cloud_request(&self) -> Duration {
        Duration::from_secs(self.cloud_request_seconds)
    }

    /// Cloud resource timeout.
    #[must_use]
    pub fn cloud_resource(&self) -> Duration {
        Duration::from_secs(self.cloud_resource_seconds)
    }

    /// Streaming stall limit.
    #[must_use]
    pub fn stall(&self) -> Duration {
        Duration::from_secs(self.stall_seconds)
    }

    /// Local generation ceiling floor.
    #[must_use]
    pub fn local_minimum(&self) -> Duration {
        Duration::from_secs(self.local_minimum_seconds)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            cloud_request_seconds: default_cloud_request_seconds(),
            cloud_resource_seconds: default_cloud_resource_seconds(),
            stall_seconds: default_stall_seconds(),
            local_minimum_seconds: default_local_minimum_seconds(),
        }
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Minimum local-model quality score to prefer local execution.
    #[serde(default = "default_local_quality_threshold")]
    pub local_quality_threshold: u8,

    /// Prefer privacy-preserving cloud providers when going cloud.
    #[serde(default = "default_true")]
    pub prefer_sovereign: bool,

    /// Force all execution through sovereign cloud.
    #[serde(default)]
    pub safe_mode_enabled: bool,

    /// Tie-breaker among eligible cloud providers.
    #[serde(default = "default_preferred_cloud_provider")]
    pub preferred_cloud_provider: CloudProviderKind,

    /// Tie-breaker among eligible local models. `None` means the
    /// largest high-quality model wins.
    #[serde(default)]
    pub preferred_local_model: Option<ModelClass>,

    /// Admission floor for local execution, in GiB of available RAM.
    #[serde(default = "default_minimum_ram_for_local_gib")]
    pub minimum_ram_for_local_gib: u64,

    /// Hottest thermal state still allowing local execution.
    #[serde(default = "default_max_thermal_for_local")]
    pub max_thermal_for_local: ThermalState,

    /// Route to cloud when unplugged below 20% battery.
    #[serde(default = "default_true")]
    pub offload_on_low_battery: bool,

    /// Upper bound on concurrent cloud inferences.
    #[serde(default = "default_max_concurrent_cloud_streams")]
    pub max_concurrent_cloud_streams: usize,

    /// Circuit breaker tuning.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Retry tuning.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Per-channel rate limit tuning.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// External-call deadlines.
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Egress filter configuration applied before cloud dispatch.
    #[serde(default)]
    pub egress: EgressConfig,

    /// Audit log directory. `None` keeps the log in memory.
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,

    /// Credentials file path, environment references allowed.
    #[serde(default)]
    pub credentials_file: Option<String>,
}

fn default_local_quality_threshold() -> u8 {
    7
}

fn default_true() -> bool {
    true
}

fn default_preferred_cloud_provider() -> CloudProviderKind {
    CloudProviderKind::Anthropic
}

fn default_minimum_ram_for_local_gib() -> u64 {
    4
}

fn default_max_thermal_for_local() -> ThermalState {
    ThermalState::Fair
}

fn default_max_concurrent_cloud_streams() -> usize {
    3
}

impl RouterConfig {
    /// Admission floor for local execution, in bytes.
    #[must_use]
    pub fn minimum_ram_for_local(&self) -> u64 {
        self.minimum_ram_for_local_gib
            .saturating_mul(1024 * 1024 * 1024)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            local_quality_threshold: default_local_quality_threshold(),
            prefer_sovereign: true,
            safe_mode_enabled: false,
            preferred_cloud_provider: default_preferred_cloud_provider(),
            preferred_local_model: None,
            minimum_ram_for_local_gib: default_minimum_ram_for_local_gib(),
            max_thermal_for_local: default_max_thermal_for_local(),
            offload_on_low_battery: true,
            max_concurrent_cloud_streams: default_max_concurrent_cloud_streams(),
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
            rate_limit: RateLimitSettings::default(),
            timeouts: TimeoutSettings::default(),
            egress: EgressConfig::default(),
            audit_dir: None,
            credentials_file: None,
        }
    }
}
