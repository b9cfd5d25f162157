//! Vesper Core - Shared types for the hybrid inference router.
//!
//! This crate defines the data model every other Vesper crate speaks:
//! prompts and execution hints, system-state snapshots, security
//! policies, routing decisions, execution results, and the router
//! error taxonomy.
//!
//! # Design
//!
//! All types here are plain values. Snapshots ([`SystemState`],
//! [`SecurityPolicy`]) are copied by value into decision records; no
//! aliasing exists between a live monitor and a snapshot. Long-lived
//! stateful components live in other crates and own their state
//! exclusively.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod decision;
mod error;
mod ids;
mod policy;
mod prompt;
mod result;
mod state;

pub use decision::{CloudProviderKind, ExecutionLocation, ModelClass, RouterDecision, TaskKind};
pub use error::{RouterError, RouterResult};
pub use ids::{ChannelId, IntentId, Timestamp};
pub use policy::{ExecutionPolicy, RiskLevel, SecurityPolicy};
pub use prompt::{ComplexityLevel, ExecutionHint, Prompt};
pub use result::{ExecutionResult, TokenUsage};
pub use state::{
    BatteryState, MemoryPressureLevel, NetworkReachability, SystemState, ThermalState,
};
