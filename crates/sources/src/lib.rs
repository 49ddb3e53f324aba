//! lcd-sens-sources: Metric source implementations for lcd-sens.

mod cpu;
mod gpu;
mod memory;
mod network;
mod shared_sensors;
mod sysfs;

pub use cpu::{pick_best_amd_temp, CpuFrequencySource, CpuTemperatureSource, CpuUsageSource};
pub use gpu::{GpuInfo, GpuSource, GpuVendor};
pub use memory::RamUsageSource;
pub use network::{Direction, NetworkRateSource};

use lcd_sens_core::{BoxedMetricSource, MetricKind};

/// Initialize shared sensor caches (call once at startup)
pub fn initialize_sensors() {
    shared_sensors::initialize();
}

/// Built-in source for a single metric kind
pub fn source_for(kind: MetricKind) -> Option<BoxedMetricSource> {
    let source: BoxedMetricSource = match kind {
        MetricKind::CpuUsage => Box::new(CpuUsageSource::new()),
        MetricKind::CpuTemperature => Box::new(CpuTemperatureSource::new()),
        MetricKind::CpuFrequency => Box::new(CpuFrequencySource::new()),
        MetricKind::RamUsage => Box::new(RamUsageSource::new()),
        MetricKind::GpuUsage | MetricKind::GpuTemperature | MetricKind::GpuFrequency => {
            match GpuSource::new(kind) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    log::warn!("Failed to create GPU source for {}: {}", kind, e);
                    return None;
                }
            }
        }
        MetricKind::NetworkUpload => Box::new(NetworkRateSource::upload()),
        MetricKind::NetworkDownload => Box::new(NetworkRateSource::download()),
    };
    Some(source)
}

/// One source per metric kind
pub fn default_sources() -> Vec<BoxedMetricSource> {
    MetricKind::ALL.iter().filter_map(|&kind| source_for(kind)).collect()
}
