//! Event types published on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vesper_core::{
    BatteryState, IntentId, MemoryPressureLevel, NetworkReachability, RouterDecision,
    ThermalState,
};

/// Metadata carried by every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Component that emitted the event.
    pub source: String,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl EventMetadata {
    /// Create metadata stamped now.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Events published by monitors and the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterEvent {
    /// Memory pressure crossed a level boundary.
    MemoryPressureChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// New pressure level.
        level: MemoryPressureLevel,
    },

    /// Thermal state changed.
    ThermalChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// New thermal state.
        state: ThermalState,
    },

    /// Battery state or level changed materially.
    BatteryChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// New battery state.
        state: BatteryState,
        /// New charge fraction, if known.
        level: Option<f64>,
    },

    /// Network reachability changed.
    NetworkReachabilityChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// New reachability.
        reachability: NetworkReachability,
    },

    /// The routing engine produced a decision.
    DecisionMade {
        /// Event metadata.
        metadata: EventMetadata,
        /// Intent the decision belongs to.
        intent_id: IntentId,
        /// The decision.
        decision: RouterDecision,
        /// Human-readable rationale.
        reason: String,
    },

    /// An execution reached a terminal state.
    ExecutionFinished {
        /// Event metadata.
        metadata: EventMetadata,
        /// Intent that finished.
        intent_id: IntentId,
        /// Terminal state label (completed, failed, cancelled).
        outcome: String,
    },
}

impl RouterEvent {
    /// Stable event-type label for logging and subscriptions.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MemoryPressureChanged { .. } => "memory_pressure_changed",
            Self::ThermalChanged { .. } => "thermal_changed",
            Self::BatteryChanged { .. } => "battery_changed",
            Self::NetworkReachabilityChanged { .. } => "network_reachability_changed",
            Self::DecisionMade { .. } => "decision_made",
            Self::ExecutionFinished { .. } => "execution_finished",
        }
    }
}
