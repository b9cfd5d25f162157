//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vesper_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{RouterError, RouterResult};

// Prompt and complexity
pub use crate::{ComplexityLevel, ExecutionHint, Prompt};

// Hardware state
pub use crate::{
    BatteryState, MemoryPressureLevel, NetworkReachability, SystemState, ThermalState,
};

// Policy
pub use crate::{ExecutionPolicy, RiskLevel, SecurityPolicy};

// Decisions and results
pub use crate::{
    CloudProviderKind, ExecutionLocation, ExecutionResult, ModelClass, RouterDecision, TaskKind,
    TokenUsage,
};

// Identifiers
pub use crate::{ChannelId, IntentId, Timestamp};
