//! Shared sysinfo caches
//!
//! Sensor discovery in sysinfo is expensive, so a single `Components`,
//! `System` and `Networks` instance is created on first use and shared by
//! every source that needs it.

use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};

/// Minimum interval between sensor refreshes (250ms)
/// This prevents redundant refreshes when multiple sources read temperatures
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Shared components with refresh timestamp
struct SharedSensors {
    components: Components,
    last_refresh: Instant,
}

impl SharedSensors {
    fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
            last_refresh: Instant::now(),
        }
    }

    /// Refresh only if enough time has passed since last refresh
    fn refresh_if_needed(&mut self) {
        if self.last_refresh.elapsed() >= MIN_REFRESH_INTERVAL {
            self.components.refresh();
            self.last_refresh = Instant::now();
        }
    }
}

static SHARED_COMPONENTS: Lazy<Mutex<SharedSensors>> = Lazy::new(|| {
    log::warn!("=== Initializing shared temperature sensors (one-time) ===");
    let sensors = SharedSensors::new();
    log::info!(
        "Shared temperature sensors initialized: {} components",
        sensors.components.len()
    );
    Mutex::new(sensors)
});

static SHARED_SYSTEM: Lazy<Mutex<System>> = Lazy::new(|| {
    Mutex::new(System::new_with_specifics(
        RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::new().with_ram()),
    ))
});

static SHARED_NETWORKS: Lazy<Mutex<Networks>> =
    Lazy::new(|| Mutex::new(Networks::new_with_refreshed_list()));

/// Lock a shared cache, recovering from a poisoned mutex (the data is still valid)
fn lock<T>(mutex: &'static Mutex<T>, name: &str) -> MutexGuard<'static, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Shared {} mutex was poisoned, recovering", name);
        poisoned.into_inner()
    })
}

/// Refresh the shared components (if needed) and return `(label, celsius)` pairs
pub fn get_refreshed_temperatures() -> Vec<(String, f32)> {
    let mut sensors = lock(&SHARED_COMPONENTS, "sensors");
    sensors.refresh_if_needed();
    sensors
        .components
        .iter()
        .map(|c| (c.label().to_string(), c.temperature()))
        .collect()
}

/// Run `f` against the shared `System` instance
pub fn with_system<R>(f: impl FnOnce(&mut System) -> R) -> R {
    let mut system = lock(&SHARED_SYSTEM, "system");
    f(&mut system)
}

/// Refresh the shared network list and return `(received, transmitted)` byte
/// totals summed over non-loopback interfaces
pub fn network_totals() -> (u64, u64) {
    let mut networks = lock(&SHARED_NETWORKS, "networks");
    networks.refresh();
    networks
        .iter()
        .filter(|(name, _)| !is_loopback(name))
        .fold((0u64, 0u64), |(rx, tx), (_, data)| {
            (
                rx.saturating_add(data.total_received()),
                tx.saturating_add(data.total_transmitted()),
            )
        })
}

fn is_loopback(interface: &str) -> bool {
    interface == "lo" || interface.starts_with("lo:") || interface.starts_with("Loopback")
}

/// Force initialization of the shared caches
///
/// Call this at application startup so sensor discovery happens before the
/// first sampling pass.
pub fn initialize() {
    let _ = &*SHARED_COMPONENTS;
    let _ = &*SHARED_SYSTEM;
    let _ = &*SHARED_NETWORKS;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("wlo1"));
    }
}
