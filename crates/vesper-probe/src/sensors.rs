//! The sensor port and its deterministic test implementation.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::RwLock;
use vesper_core::{BatteryState, NetworkReachability, ThermalState};

/// One memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    /// Bytes available.
    pub available: u64,
    /// Bytes installed.
    pub total: u64,
}

/// One battery reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    /// Charging state.
    pub state: BatteryState,
    /// Charge fraction in `[0, 1]`, if known.
    pub level: Option<f64>,
}

/// One GPU reading, absent when no discrete VRAM pool exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuReading {
    /// VRAM bytes available.
    pub vram_available: u64,
    /// Utilization fraction in `[0, 1]`, if known.
    pub utilization: Option<f64>,
}

/// Port to platform hardware sensors.
///
/// Implementations must tolerate being polled from several monitor
/// tasks concurrently. Reads are suspension points (they may cross an
/// IPC boundary on real platforms).
#[async_trait]
pub trait SystemSensors: Send + Sync {
    /// Current thermal state.
    async fn thermal(&self) -> ThermalState;

    /// Current memory availability.
    async fn memory(&self) -> MemoryReading;

    /// Current battery state.
    async fn battery(&self) -> BatteryReading;

    /// Current GPU state, if a discrete pool exists.
    async fn gpu(&self) -> Option<GpuReading>;

    /// Current CPU utilization fraction in `[0, 1]`.
    async fn cpu_utilization(&self) -> f64;

    /// Coarse labels of resource-heavy applications currently running.
    async fn competing_applications(&self) -> BTreeSet<String>;

    /// Current network reachability.
    async fn network(&self) -> NetworkReachability;
}

/// Deterministic sensors for tests and headless runs.
///
/// Every signal is settable; monitors observe the new value on their
/// next poll.
#[derive(Debug)]
pub struct StaticSensors {
    thermal: RwLock<ThermalState>,
    memory: RwLock<MemoryReading>,
    battery: RwLock<BatteryReading>,
    gpu: RwLock<Option<GpuReading>>,
    cpu: RwLock<f64>,
    apps: RwLock<BTreeSet<String>>,
    network: RwLock<NetworkReachability>,
}

impl StaticSensors {
    /// Sensors reporting a healthy, plugged-in machine.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            thermal: RwLock::new(ThermalState::Nominal),
            memory: RwLock::new(MemoryReading {
                available: 16 * 1024 * 1024 * 1024,
                total: 32 * 1024 * 1024 * 1024,
            }),
            battery: RwLock::new(BatteryReading {
                state: BatteryState::Full,
                level: Some(1.0),
            }),
            gpu: RwLock::new(Some(GpuReading {
                vram_available: 8 * 1024 * 1024 * 1024,
                utilization: Some(0.0),
            })),
            cpu: RwLock::new(0.1),
            apps: RwLock::new(BTreeSet::new()),
            network: RwLock::new(NetworkReachability::Satisfied),
        }
    }

    /// Set the thermal state.
    pub fn set_thermal(&self, state: ThermalState) {
        if let Ok(mut guard) = self.thermal.write() {
            *guard = state;
        }
    }

    /// Set the memory reading.
    pub fn set_memory(&self, available: u64, total: u64) {
        if let Ok(mut guard) = self.memory.write() {
            *guard = MemoryReading { available, total };
        }
    }

    /// Set the battery reading.
    pub fn set_battery(&self, state: BatteryState, level: Option<f64>) {
        if let Ok(mut guard) = self.battery.write() {
            *guard = BatteryReading { state, level };
        }
    }

    /// Set the GPU reading.
    pub fn set_gpu(&self, reading: Option<GpuReading>) {
        if let Ok(mut guard) = self.gpu.write() {
            *guard = reading;
        }
    }

    /// Set CPU utilization.
    pub fn set_cpu(&self, utilization: f64) {
        if let Ok(mut guard) = self.cpu.write() {
            *guard = utilization.clamp(0.0, 1.0);
        }
    }

    /// Set the competing application labels.
    pub fn set_competing_applications(&self, apps: BTreeSet<String>) {
        if let Ok(mut guard) = self.apps.write() {
            *guard = apps;
        }
    }

    /// Set network reachability.
    pub fn set_network(&self, reachability: NetworkReachability) {
        if let Ok(mut guard) = self.network.write() {
            *guard = reachability;
        }
    }
}

impl Default for StaticSensors {
    fn default() -> Self {
        Self::healthy()
    }
}

#[async_trait]
impl SystemSensors for StaticSensors {
    async fn thermal(&self) -> ThermalState {
        self.thermal.read().map_or(ThermalState::Nominal, |g| *g)
    }

    async fn memory(&self) -> MemoryReading {
        self.memory.read().map_or(
            MemoryReading {
                available: 0,
                total: 0,
            },
            |g| *g,
        )
    }

    async fn battery(&self) -> BatteryReading {
        self.battery.read().map_or(
            BatteryReading {
                state: BatteryState::Unknown,
                level: None,
            },
            |g| *g,
        )
    }

    async fn gpu(&self) -> Option<GpuReading> {
        self.gpu.read().ok().and_then(|g| *g)
    }

    async fn cpu_utilization(&self) -> f64 {
        self.cpu.read().map_or(0.0, |g| *g)
    }

    async fn competing_applications(&self) -> BTreeSet<String> {
        self.apps.read().map_or_else(|_| BTreeSet::new(), |g| g.clone())
    }

    async fn network(&self) -> NetworkReachability {
        self.network
            .read()
            .map_or(NetworkReachability::Offline, |g| *g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_sensors_settable() {
        let sensors = StaticSensors::healthy();
        assert_eq!(sensors.thermal().await, ThermalState::Nominal);

        sensors.set_thermal(ThermalState::Critical);
        assert_eq!(sensors.thermal().await, ThermalState::Critical);

        sensors.set_network(NetworkReachability::Offline);
        assert_eq!(sensors.network().await, NetworkReachability::Offline);
    }

    #[tokio::test]
    async fn test_cpu_clamped() {
        let sensors = StaticSensors::healthy();
        sensors.set_cpu(3.5);
        assert!((sensors.cpu_utilization().await - 1.0).abs() < f64::EPSILON);
    }
}
