//! Per-provider circuit breaker.
//!
//! One machine, three states. `Closed` admits everything and counts
//! consecutive failures. Reaching the threshold opens the breaker for
//! the cooldown. After the cooldown the next admission request moves it
//! to `HalfOpen`, where exactly one probe may be in flight: the probe's
//! success closes the breaker, its failure reopens it with a fresh
//! cooldown.

use std::time::Instant;
use tracing::{debug, warn};
use vesper_config::CircuitBreakerSettings;
use vesper_core::CloudProviderKind;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation; requests are admitted.
    Closed,
    /// Rejecting requests until the instant passes.
    Open {
        /// When the cooldown elapses.
        until: Instant,
    },
    /// Probing recovery; at most one request in flight.
    HalfOpen {
        /// Whether the probe slot is taken.
        probe_in_flight: bool,
    },
}

/// Per-provider failure guard.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    settings: CircuitBreakerSettings,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            settings,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Instant of the most recent recorded failure.
    #[must_use]
    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Ask to admit one request at `now`.
    ///
    /// In `Open`, admission is refused until the cooldown elapses; the
    /// first request after that becomes the half-open probe. In
    /// `HalfOpen`, only the single probe slot is admitted.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open { until } => {
                if now >= until {
                    debug!("breaker cooldown elapsed, admitting probe");
                    self.state = BreakerState::HalfOpen {
                        probe_in_flight: true,
                    };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    false
                } else {
                    self.state = BreakerState::HalfOpen {
                        probe_in_flight: true,
                    };
                    true
                }
            },
        }
    }

    /// Record a successful request.
    pub fn record_success(&mut self) {
        if matches!(self.state, BreakerState::HalfOpen { .. }) {
            debug!("probe succeeded, closing breaker");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
    }

    /// Record a failed request at `now`.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        match self.state {
            BreakerState::Closed => {
                if self.consecutive_failures >= self.settings.failure_threshold {
                    warn!(
                        failures = self.consecutive_failures,
                        "failure threshold reached, opening breaker"
                    );
                    self.trip(now);
                }
            },
            BreakerState::HalfOpen { .. } => {
                warn!("probe failed, reopening breaker");
                self.trip(now);
            },
            BreakerState::Open { .. } => {},
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = BreakerState::Open {
            until: now.checked_add(self.settings.cooldown()).unwrap_or(now),
        };
    }
}

/// Registry of breakers, one per provider.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: dashmap::DashMap<CloudProviderKind, CircuitBreaker>,
    settings: CircuitBreakerSettings,
}

impl BreakerRegistry {
    /// Create an empty registry; breakers materialize on first use.
    #[must_use]
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            breakers: dashmap::DashMap::new(),
            settings,
        }
    }

    /// Ask to admit one request to the provider.
    pub fn admit(&self, provider: CloudProviderKind, now: Instant) -> bool {
        self.breakers
            .entry(provider)
            .or_insert_with(|| CircuitBreaker::new(self.settings))
            .admit(now)
    }

    /// Record a success for the provider.
    pub fn record_success(&self, provider: CloudProviderKind) {
        if let Some(mut breaker) = self.breakers.get_mut(&provider) {
            breaker.record_success();
        }
    }

    /// Record a failure for the provider.
    pub fn record_failure(&self, provider: CloudProviderKind, now: Instant) {
        self.breakers
            .entry(provider)
            .or_insert_with(|| CircuitBreaker::new(self.settings))
            .record_failure(now);
    }

    /// State of the provider's breaker, if one exists yet.
    #[must_use]
    pub fn state(&self, provider: CloudProviderKind) -> Option<BreakerState> {
        self.breakers.get(&provider).map(|b| b.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: 5,
            cooldown_seconds: 60,
        }
    }

    #[test]
    fn test_closed_admits() {
        let mut breaker = CircuitBreaker::new(settings());
        assert!(breaker.admit(Instant::now()));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();

        for _ in 0..4 {
            breaker.record_failure(now);
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        breaker.record_failure(now);
        assert!(matches!(breaker.state(), BreakerState::Open { .. }));
        assert!(!breaker.admit(now));
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();

        for _ in 0..4 {
            breaker.record_failure(now);
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure(now);
        }
        // Never reached 5 in a row.
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_open_monotonic_until_cooldown() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }

        // Any instant before the cooldown elapses is rejected.
        assert!(!breaker.admit(now));
        assert!(!breaker.admit(now + Duration::from_secs(59)));
        // At the boundary the probe is admitted.
        assert!(breaker.admit(now + Duration::from_secs(60)));
        assert_eq!(
            breaker.state(),
            BreakerState::HalfOpen {
                probe_in_flight: true
            }
        );
    }

    #[test]
    fn test_half_open_admits_exactly_one_probe() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        let later = now + Duration::from_secs(61);

        assert!(breaker.admit(later));
        // Second concurrent request is refused while the probe flies.
        assert!(!breaker.admit(later));
        assert!(!breaker.admit(later + Duration::from_secs(10)));
    }

    #[test]
    fn test_probe_success_closes() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        assert!(breaker.admit(now + Duration::from_secs(60)));
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.admit(now + Duration::from_secs(61)));
    }

    #[test]
    fn test_probe_failure_reopens_with_fresh_cooldown() {
        let mut breaker = CircuitBreaker::new(settings());
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        let probe_at = now + Duration::from_secs(60);
        assert!(breaker.admit(probe_at));
        breaker.record_failure(probe_at);

        // Reopened: the previous cooldown instant no longer admits.
        assert!(!breaker.admit(probe_at + Duration::from_secs(30)));
        assert!(breaker.admit(probe_at + Duration::from_secs(60)));
    }

    #[test]
    fn test_registry_isolates_providers() {
        let registry = BreakerRegistry::new(settings());
        let now = Instant::now();

        for _ in 0..5 {
            registry.record_failure(CloudProviderKind::Anthropic, now);
        }
        assert!(!registry.admit(CloudProviderKind::Anthropic, now));
        assert!(registry.admit(CloudProviderKind::OpenAi, now));
        assert!(matches!(
            registry.state(CloudProviderKind::Anthropic),
            Some(BreakerState::Open { .. })
        ));
        assert_eq!(registry.state(CloudProviderKind::Google), None);
    }
}
