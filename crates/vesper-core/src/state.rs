//! System-state snapshots and hardware signal types.
//!
//! A [`SystemState`] is an atomic point-in-time view composed by the
//! probe from its monitors. Readers never observe partial updates; the
//! routing engine and execution manager receive snapshots by value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// CPU utilization above which the system counts as overloaded.
const CPU_OVERLOAD_THRESHOLD: f64 = 0.85;

/// Battery fraction below which an unplugged machine counts as low.
const LOW_BATTERY_THRESHOLD: f64 = 0.2;

/// Device thermal state, coarsest to hottest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ThermalState {
    /// Normal operating temperature.
    #[default]
    Nominal,
    /// Slightly elevated; intensive compute still allowed.
    Fair,
    /// Elevated; local inference is throttled off.
    Serious,
    /// Critical; only essential work should run.
    Critical,
}

impl fmt::Display for ThermalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Fair => write!(f, "fair"),
            Self::Serious => write!(f, "serious"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Battery charging state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    /// State could not be determined (e.g. desktop without a battery).
    #[default]
    Unknown,
    /// Running on battery power.
    Unplugged,
    /// Connected to power and charging.
    Charging,
    /// Connected to power at full charge.
    Full,
}

/// Memory pressure level reported by the memory monitor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressureLevel {
    /// Plenty of memory available.
    #[default]
    Normal,
    /// Memory is getting tight; large allocations should be avoided.
    Warning,
    /// System is under severe memory pressure.
    Critical,
}

/// Network reachability as reported by the network monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkReachability {
    /// Network is available without restrictions.
    #[default]
    Satisfied,
    /// Network is available but metered (e.g. cellular hotspot).
    Expensive,
    /// Network is available under data-saver constraints.
    Constrained,
    /// No network path is available.
    Offline,
}

impl NetworkReachability {
    /// Whether any outbound request can be attempted at all.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// Atomic snapshot of hardware state taken before each routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Bytes of RAM currently available.
    pub ram_available: u64,
    /// Total installed RAM in bytes.
    pub ram_total: u64,
    /// Current thermal state.
    pub thermal_state: ThermalState,
    /// Battery charging state.
    pub battery_state: BatteryState,
    /// Battery charge fraction in `[0, 1]`, if known.
    pub battery_level: Option<f64>,
    /// GPU VRAM currently available in bytes, if a discrete pool exists.
    pub gpu_vram_available: Option<u64>,
    /// GPU utilization fraction in `[0, 1]`, if known.
    pub gpu_utilization: Option<f64>,
    /// CPU utilization fraction in `[0, 1]`.
    pub cpu_utilization: f64,
    /// Coarse labels of resource-heavy applications currently running.
    pub competing_applications: BTreeSet<String>,
}

impl SystemState {
    /// A healthy-system snapshot, useful as a starting point in tests
    /// and as the probe's value before the first sensor read.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            ram_available: 16 * 1024 * 1024 * 1024,
            ram_total: 32 * 1024 * 1024 * 1024,
            thermal_state: ThermalState::Nominal,
            battery_state: BatteryState::Full,
            battery_level: Some(1.0),
            gpu_vram_available: Some(8 * 1024 * 1024 * 1024),
            gpu_utilization: Some(0.0),
            cpu_utilization: 0.1,
            competing_applications: BTreeSet::new(),
        }
    }

    /// Whether available RAM meets the given floor.
    #[must_use]
    pub fn has_sufficient_ram(&self, min_bytes: u64) -> bool {
        self.ram_available >= min_bytes
    }

    /// Whether the thermal state still admits intensive compute.
    #[must_use]
    pub fn allows_intensive_compute(&self) -> bool {
        matches!(
            self.thermal_state,
            ThermalState::Nominal | ThermalState::Fair
        )
    }

    /// Whether the CPU is overloaded.
    #[must_use]
    pub fn cpu_overloaded(&self) -> bool {
        self.cpu_utilization > CPU_OVERLOAD_THRESHOLD
    }

    /// Whether a resource-heavy application is competing for hardware.
    #[must_use]
    pub fn heavy_app_running(&self) -> bool {
        !self.competing_applications.is_empty()
    }

    /// Whether the machine is unplugged with a low battery.
    #[must_use]
    pub fn low_battery(&self) -> bool {
        self.battery_state == BatteryState::Unplugged
            && self
                .battery_level
                .is_some_and(|level| level < LOW_BATTERY_THRESHOLD)
    }

    /// Whether the system should offload everything it can.
    ///
    /// True when thermals are serious or critical, when the CPU is
    /// overloaded on a non-nominal machine, when a heavy application is
    /// competing on a non-nominal machine, or when the battery is low.
    #[must_use]
    pub fn should_enter_safe_mode(&self) -> bool {
        matches!(
            self.thermal_state,
            ThermalState::Serious | ThermalState::Critical
        ) || (self.cpu_overloaded() && self.thermal_state != ThermalState::Nominal)
            || (self.heavy_app_running() && self.thermal_state != ThermalState::Nominal)
            || self.low_battery()
    }

    /// Memory pressure level derived from the RAM headroom fraction.
    #[must_use]
    pub fn memory_pressure(&self) -> MemoryPressureLevel {
        if self.ram_total == 0 {
            return MemoryPressureLevel::Critical;
        }
        #[allow(clippy::cast_precision_loss)]
        let headroom = self.ram_available as f64 / self.ram_total as f64;
        if headroom < 0.05 {
            MemoryPressureLevel::Critical
        } else if headroom < 0.15 {
            MemoryPressureLevel::Warning
        } else {
            MemoryPressureLevel::Normal
        }
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::healthy()
    }
}
