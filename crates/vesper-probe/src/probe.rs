//! The probe: composer actor plus public snapshot API.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vesper_core::{NetworkReachability, SystemState};
use vesper_events::{EventBus, EventMetadata, RouterEvent};

use crate::monitor::{MonitorConfig, MonitorUpdate, spawn_monitors};
use crate::sensors::SystemSensors;

/// Capacity of the monitor-to-composer channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Battery level change below which no event is emitted.
const BATTERY_LEVEL_EPSILON: f64 = 0.05;

/// Composes monitor readings into atomic [`SystemState`] snapshots.
///
/// The composer is a serial actor: it owns the state exclusively and
/// applies one update at a time. Snapshots are published over a watch
/// channel FIRST, then the corresponding change event goes out on the
/// bus, so every event refers to an already-visible snapshot.
pub struct SystemProbe {
    update_tx: mpsc::Sender<MonitorUpdate>,
    state_rx: watch::Receiver<SystemState>,
    net_rx: watch::Receiver<NetworkReachability>,
    tasks: Vec<JoinHandle<()>>,
}

impl SystemProbe {
    /// Start the composer and one monitor task per signal.
    #[must_use]
    pub fn start(
        sensors: Arc<dyn SystemSensors>,
        bus: EventBus,
        config: MonitorConfig,
    ) -> Self {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SystemState::healthy());
        let (net_tx, net_rx) = watch::channel(NetworkReachability::Satisfied);

        let mut tasks = spawn_monitors(&sensors, &config, &update_tx);
        tasks.push(tokio::spawn(composer_loop(
            update_rx, state_tx, net_tx, bus,
        )));

        Self {
            update_tx,
            state_rx,
            net_rx,
            tasks,
        }
    }

    /// The latest composed snapshot. Cheap; no suspension.
    #[must_use]
    pub fn snapshot(&self) -> SystemState {
        self.state_rx.borrow().clone()
    }

    /// The latest network reachability.
    #[must_use]
    pub fn network(&self) -> NetworkReachability {
        *self.net_rx.borrow()
    }

    /// Wait for the composer to drain every queued update, then return
    /// the resulting snapshot. Used where a decision needs fresh state
    /// rather than merely recent state.
    pub async fn settled_snapshot(&self) -> (SystemState, NetworkReachability) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .update_tx
            .send(MonitorUpdate::Snapshot(reply_tx))
            .await
            .is_err()
        {
            warn!("probe composer gone, serving last snapshot");
            return (self.snapshot(), self.network());
        }
        match reply_rx.await {
            Ok(pair) => pair,
            Err(_) => (self.snapshot(), self.network()),
        }
    }

    /// Push one update into the composer directly.
    ///
    /// Monitors do this from their poll loops; tests use it to drive
    /// transitions without waiting for timers.
    pub async fn push_update(&self, update: MonitorUpdate) {
        let _ = self.update_tx.send(update).await;
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SystemState> {
        self.state_rx.clone()
    }

    /// Stop every task owned by the probe.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for SystemProbe {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn composer_loop(
    mut update_rx: mpsc::Receiver<MonitorUpdate>,
    state_tx: watch::Sender<SystemState>,
    net_tx: watch::Sender<NetworkReachability>,
    bus: EventBus,
) {
    let mut state = SystemState::healthy();
    let mut network = NetworkReachability::Satisfied;

    while let Some(update) = update_rx.recv().await {
        let prev_pressure = state.memory_pressure();
        let prev_thermal = state.thermal_state;
        let prev_battery = (state.battery_state, state.battery_level);
        let prev_network = network;

        match update {
            MonitorUpdate::Thermal(thermal) => state.thermal_state = thermal,
            MonitorUpdate::Memory(reading) => {
                state.ram_available = reading.available;
                state.ram_total = reading.total;
            },
            MonitorUpdate::Battery(reading) => {
                state.battery_state = reading.state;
                state.battery_level = reading.level;
            },
            MonitorUpdate::Gpu(reading) => {
                state.gpu_vram_available = reading.map(|r| r.vram_available);
                state.gpu_utilization = reading.and_then(|r| r.utilization);
            },
            MonitorUpdate::Cpu(utilization) => state.cpu_utilization = utilization,
            MonitorUpdate::CompetingApps(apps) => state.competing_applications = apps,
            MonitorUpdate::Network(reachability) => network = reachability,
            MonitorUpdate::Snapshot(reply) => {
                let _ = reply.send((state.clone(), network));
                continue;
            },
        }

        // Publish the snapshot before any event that references it.
        let _ = state_tx.send(state.clone());
        let _ = net_tx.send(network);

        let pressure = state.memory_pressure();
        if pressure != prev_pressure {
            debug!(?prev_pressure, ?pressure, "memory pressure changed");
            bus.publish(RouterEvent::MemoryPressureChanged {
                metadata: EventMetadata::new("memory-monitor"),
                level: pressure,
            });
        }
        if state.thermal_state != prev_thermal {
            debug!(prev = %prev_thermal, new = %state.thermal_state, "thermal changed");
            bus.publish(RouterEvent::ThermalChanged {
                metadata: EventMetadata::new("thermal-monitor"),
                state: state.thermal_state,
            });
        }
        let battery_moved = match (prev_battery.1, state.battery_level) {
            (Some(a), Some(b)) => (a - b).abs() >= BATTERY_LEVEL_EPSILON,
            (a, b) => a.is_some() != b.is_some(),
        };
        if state.battery_state != prev_battery.0 || battery_moved {
            bus.publish(RouterEvent::BatteryChanged {
                metadata: EventMetadata::new("battery-monitor"),
                state: state.battery_state,
                level: state.battery_level,
            });
        }
        if network != prev_network {
            debug!(?prev_network, ?network, "network reachability changed");
            bus.publish(RouterEvent::NetworkReachabilityChanged {
                metadata: EventMetadata::new("network-monitor"),
                reachability: network,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{MemoryReading, StaticSensors};
    use std::time::Duration;
    use vesper_core::{BatteryState, ThermalState};

    fn quick_config() -> MonitorConfig {
        MonitorConfig {
            thermal_interval: Duration::from_millis(10),
            memory_interval: Duration::from_millis(10),
            battery_interval: Duration::from_millis(10),
            gpu_interval: Duration::from_millis(10),
            cpu_interval: Duration::from_millis(10),
            apps_interval: Duration::from_millis(10),
            network_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_snapshot_reflects_pushed_updates() {
        // Keep the sensor value in lockstep with the pushed update so
        // the concurrent pollers can never disagree with the push.
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_thermal(ThermalState::Serious);
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            EventBus::new(),
            quick_config(),
        );

        probe
            .push_update(MonitorUpdate::Thermal(ThermalState::Serious))
            .await;
        let (state, _) = probe.settled_snapshot().await;
        assert_eq!(state.thermal_state, ThermalState::Serious);
    }

    #[tokio::test]
    async fn test_monitors_poll_sensors() {
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_thermal(ThermalState::Fair);
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            EventBus::new(),
            quick_config(),
        );

        // Give the pollers a few ticks.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (state, net) = probe.settled_snapshot().await;
        assert_eq!(state.thermal_state, ThermalState::Fair);
        assert_eq!(net, NetworkReachability::Satisfied);
    }

    #[tokio::test]
    async fn test_thermal_event_emitted_on_transition() {
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_thermal(ThermalState::Critical);
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            bus,
            quick_config(),
        );

        probe
            .push_update(MonitorUpdate::Thermal(ThermalState::Critical))
            .await;
        let _ = probe.settled_snapshot().await;

        let mut saw_thermal = false;
        while let Some(event) = receiver.try_recv() {
            if let RouterEvent::ThermalChanged { state, .. } = event.as_ref() {
                assert_eq!(*state, ThermalState::Critical);
                saw_thermal = true;
            }
        }
        assert!(saw_thermal);
    }

    #[tokio::test]
    async fn test_event_follows_snapshot_publication() {
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_memory(1024 * 1024 * 1024, 32 * 1024 * 1024 * 1024);
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            bus,
            quick_config(),
        );
        let state_rx = probe.watch_state();

        probe
            .push_update(MonitorUpdate::Memory(MemoryReading {
                available: 1024 * 1024 * 1024,
                total: 32 * 1024 * 1024 * 1024,
            }))
            .await;
        let _ = probe.settled_snapshot().await;

        while let Some(event) = receiver.try_recv() {
            if let RouterEvent::MemoryPressureChanged { level, .. } = event.as_ref() {
                // By the time the event is observable, the snapshot it
                // references must already be visible.
                assert_eq!(state_rx.borrow().memory_pressure(), *level);
            }
        }
    }

    #[tokio::test]
    async fn test_network_transition_event() {
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_network(NetworkReachability::Offline);
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            bus,
            quick_config(),
        );

        probe
            .push_update(MonitorUpdate::Network(NetworkReachability::Offline))
            .await;
        let (_, net) = probe.settled_snapshot().await;
        assert_eq!(net, NetworkReachability::Offline);

        let mut saw_network = false;
        while let Some(event) = receiver.try_recv() {
            if let RouterEvent::NetworkReachabilityChanged { reachability, .. } = event.as_ref() {
                assert_eq!(*reachability, NetworkReachability::Offline);
                saw_network = true;
            }
        }
        assert!(saw_network);
    }

    #[tokio::test]
    async fn test_battery_epsilon_suppresses_noise() {
        let sensors = Arc::new(StaticSensors::healthy());
        sensors.set_battery(BatteryState::Full, Some(0.99));
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let probe = SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            bus,
            quick_config(),
        );

        // 1.0 -> 0.99 is below the epsilon; same state, no event.
        probe
            .push_update(MonitorUpdate::Battery(crate::sensors::BatteryReading {
                state: BatteryState::Full,
                level: Some(0.99),
            }))
            .await;
        let _ = probe.settled_snapshot().await;

        while let Some(event) = receiver.try_recv() {
            assert!(
                !matches!(event.as_ref(), RouterEvent::BatteryChanged { .. }),
                "battery noise should not produce events"
            );
        }
    }
}
