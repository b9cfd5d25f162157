//! Monitor tasks and the updates they publish.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::trace;
use vesper_core::{NetworkReachability, SystemState, ThermalState};

use crate::sensors::{BatteryReading, GpuReading, MemoryReading, SystemSensors};

/// One update from a monitor to the composer.
#[derive(Debug)]
pub enum MonitorUpdate {
    /// Thermal state reading.
    Thermal(ThermalState),
    /// Memory reading.
    Memory(MemoryReading),
    /// Battery reading.
    Battery(BatteryReading),
    /// GPU reading.
    Gpu(Option<GpuReading>),
    /// CPU utilization reading.
    Cpu(f64),
    /// Competing application labels.
    CompetingApps(BTreeSet<String>),
    /// Network reachability reading.
    Network(NetworkReachability),
    /// Request-reply: poll nothing, answer with the current snapshot
    /// after all previously queued updates are applied.
    Snapshot(oneshot::Sender<(SystemState, NetworkReachability)>),
}

/// Poll intervals for the monitor tasks.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Thermal poll interval.
    pub thermal_interval: Duration,
    /// Memory poll interval.
    pub memory_interval: Duration,
    /// Battery poll interval.
    pub battery_interval: Duration,
    /// GPU poll interval.
    pub gpu_interval: Duration,
    /// CPU poll interval.
    pub cpu_interval: Duration,
    /// Competing-applications sample interval.
    pub apps_interval: Duration,
    /// Network reachability poll interval.
    pub network_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thermal_interval: Duration::from_secs(5),
            memory_interval: Duration::from_secs(2),
            battery_interval: Duration::from_secs(30),
            gpu_interval: Duration::from_secs(2),
            cpu_interval: Duration::from_secs(1),
            apps_interval: Duration::from_secs(15),
            network_interval: Duration::from_secs(5),
        }
    }
}

fn spawn_poller<F, Fut>(
    interval: Duration,
    tx: mpsc::Sender<MonitorUpdate>,
    mut poll: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = MonitorUpdate> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let update = poll().await;
            trace!(?update, "monitor poll");
            if tx.send(update).await.is_err() {
                // Composer is gone; shut down.
                return;
            }
        }
    })
}

/// Spawn one task per signal, each polling its sensor and pushing the
/// reading to the composer channel.
pub(crate) fn spawn_monitors(
    sensors: &Arc<dyn SystemSensors>,
    config: &MonitorConfig,
    tx: &mpsc::Sender<MonitorUpdate>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(7);

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(config.thermal_interval, tx.clone(), move || {
        let s = Arc::clone(&s);
        async move { MonitorUpdate::Thermal(s.thermal().await) }
    }));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(config.memory_interval, tx.clone(), move || {
        let s = Arc::clone(&s);
        async move { MonitorUpdate::Memory(s.memory().await) }
    }));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(
        config.battery_interval,
        tx.clone(),
        move || {
            let s = Arc::clone(&s);
            async move { MonitorUpdate::Battery(s.battery().await) }
        },
    ));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(config.gpu_interval, tx.clone(), move || {
        let s = Arc::clone(&s);
        async move { MonitorUpdate::Gpu(s.gpu().await) }
    }));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(config.cpu_interval, tx.clone(), move || {
        let s = Arc::clone(&s);
        async move { MonitorUpdate::Cpu(s.cpu_utilization().await) }
    }));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(config.apps_interval, tx.clone(), move || {
        let s = Arc::clone(&s);
        async move { MonitorUpdate::CompetingApps(s.competing_applications().await) }
    }));

    let s = Arc::clone(sensors);
    handles.push(spawn_poller(
        config.network_interval,
        tx.clone(),
        move || {
            let s = Arc::clone(&s);
            async move { MonitorUpdate::Network(s.network().await) }
        },
    ));

    handles
}
