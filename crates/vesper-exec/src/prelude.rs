//! Prelude module - commonly used types for convenient import.

pub use crate::{
    AcceleratorGuard, AcceleratorLock, ExecutionContext, HybridExecutionManager, HybridRouter,
    ManagerPorts, RouterPorts,
};
