//! Vesper Probe - System-state monitoring.
//!
//! Sub-monitors run as long-lived background tasks: a thermal watcher,
//! a memory-pressure watcher, a battery monitor, a GPU/VRAM monitor, a
//! CPU load monitor, a coarse competing-applications sampler, and a
//! network reachability watcher. Each monitor owns one signal and
//! publishes updates over a bounded channel to a composer actor, which
//! folds the latest value of every signal into a single [`SystemState`]
//! snapshot. Readers always observe a consistent point-in-time view;
//! change events go out on the bus only after the snapshot they
//! reference is published.
//!
//! Hardware reads come through the [`SystemSensors`] port. Platform
//! integrations implement it outside the core; [`StaticSensors`] ships
//! for tests and headless runs.
//!
//! [`SystemState`]: vesper_core::SystemState

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod monitor;
mod probe;
mod sensors;

pub use monitor::{MonitorConfig, MonitorUpdate};
pub use probe::SystemProbe;
pub use sensors::{BatteryReading, GpuReading, MemoryReading, StaticSensors, SystemSensors};
