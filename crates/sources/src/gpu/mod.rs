//! GPU metric sources with multi-vendor support (NVIDIA, AMD, Intel)

mod amd;
mod backend;
mod detector;
mod intel;
mod intel_top;
mod nvidia;

pub use backend::{GpuInfo, GpuVendor};

use backend::{GpuBackend, GpuBackendEnum, GpuMetrics};

use anyhow::{anyhow, Result};
use lcd_sens_core::{MetricKind, MetricSource};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Readings younger than this are reused instead of hitting sysfs/NVML again
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Global GPU detection (performed once at startup)
static GPU_MANAGER: Lazy<GpuManager> = Lazy::new(|| {
    GpuManager {
        primary: detector::detect_gpus()
            .into_iter()
            .next()
            .map(|b| Arc::new(Mutex::new(CachedBackend::new(b)))),
    }
});

/// GPU manager holding the backend of the selected card
struct GpuManager {
    primary: Option<Arc<Mutex<CachedBackend>>>,
}

/// Backend plus the time of its last update, so the three GPU sources
/// share one hardware read per pass
struct CachedBackend {
    backend: GpuBackendEnum,
    last_update: Option<Instant>,
}

impl CachedBackend {
    fn new(backend: GpuBackendEnum) -> Self {
        Self {
            backend,
            last_update: None,
        }
    }

    fn refreshed_metrics(&mut self) -> Result<GpuMetrics> {
        let stale = self
            .last_update
            .map_or(true, |t| t.elapsed() >= MIN_REFRESH_INTERVAL);
        if stale {
            self.backend.update()?;
            self.last_update = Some(Instant::now());
        }
        Ok(self.backend.metrics().clone())
    }
}

/// One GPU metric (usage, temperature or core clock) of the selected card
pub struct GpuSource {
    kind: MetricKind,
    backend: Option<Arc<Mutex<CachedBackend>>>,
}

impl GpuSource {
    pub fn new(kind: MetricKind) -> Result<Self> {
        match kind {
            MetricKind::GpuUsage | MetricKind::GpuTemperature | MetricKind::GpuFrequency => {
                Ok(Self {
                    kind,
                    backend: GPU_MANAGER.primary.clone(),
                })
            }
            other => Err(anyhow!("{} is not a GPU metric", other)),
        }
    }
}

impl MetricSource for GpuSource {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let Some(backend) = self.backend.as_ref() else {
            return Ok(None);
        };

        let metrics = backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .refreshed_metrics()?;

        Ok(match self.kind {
            MetricKind::GpuUsage => metrics.utilization.map(|u| u as f64),
            MetricKind::GpuTemperature => metrics.temperature.map(|t| t as f64),
            MetricKind::GpuFrequency => metrics.clock_core.map(|c| c as f64),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_gpu_kinds() {
        assert!(GpuSource::new(MetricKind::CpuUsage).is_err());
    }

    #[test]
    fn test_missing_backend_is_unavailable() {
        let mut source = GpuSource {
            kind: MetricKind::GpuUsage,
            backend: None,
        };
        assert!(!source.is_available());
        assert_eq!(source.sample().unwrap(), None);
    }
}
