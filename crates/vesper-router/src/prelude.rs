//! Prelude module - commonly used types for convenient import.

pub use crate::{
    CloudProviderSpec, LocalModelSpec, ModelCatalog, PolicyManager, RouteRequest, RoutingEngine,
    assess, classify_task,
};
