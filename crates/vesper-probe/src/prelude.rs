//! Prelude module - commonly used types for convenient import.

pub use crate::{
    BatteryReading, GpuReading, MemoryReading, MonitorConfig, MonitorUpdate, StaticSensors,
    SystemProbe, SystemSensors,
};
