//! RAM usage source

use anyhow::{anyhow, Result};
use lcd_sens_core::{MetricKind, MetricSource};

use crate::shared_sensors;

/// Used RAM as a percentage of total RAM
pub struct RamUsageSource;

impl RamUsageSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RamUsageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for RamUsageSource {
    fn kind(&self) -> MetricKind {
        MetricKind::RamUsage
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let (used, total) = shared_sensors::with_system(|system| {
            system.refresh_memory();
            (system.used_memory(), system.total_memory())
        });

        if total == 0 {
            return Err(anyhow!("total memory reported as 0"));
        }
        Ok(Some(used as f64 / total as f64 * 100.0))
    }
}
