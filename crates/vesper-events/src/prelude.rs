//! Prelude module - commonly used types for convenient import.

pub use crate::{EventBus, EventMetadata, EventReceiver, RouterEvent};
