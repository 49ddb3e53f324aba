//! NVIDIA cards through NVML (`nvidia` feature)

use super::backend::{GpuBackend, GpuInfo, GpuMetrics};
use anyhow::Result;

#[cfg(feature = "nvidia")]
mod nvml {
    use super::super::backend::{GpuInfo, GpuMetrics, GpuVendor};
    use anyhow::{anyhow, Result};
    use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
    use nvml_wrapper::Nvml;
    use once_cell::sync::Lazy;

    /// Process-wide NVML handle; `None` when the driver library is missing
    static NVML: Lazy<Option<Nvml>> = Lazy::new(|| match Nvml::init() {
        Ok(nvml) => Some(nvml),
        Err(e) => {
            log::info!("NVML unavailable: {}", e);
            None
        }
    });

    fn handle() -> Result<&'static Nvml> {
        NVML.as_ref().ok_or_else(|| anyhow!("NVML is not available"))
    }

    pub fn count() -> u32 {
        NVML.as_ref()
            .and_then(|nvml| nvml.device_count().ok())
            .unwrap_or(0)
    }

    pub fn probe(index: u32) -> Result<GpuInfo> {
        let card = handle()?.device_by_index(index)?;
        Ok(GpuInfo {
            index,
            name: card
                .name()
                .unwrap_or_else(|_| format!("NVIDIA GPU {}", index)),
            vendor: GpuVendor::Nvidia,
        })
    }

    pub fn read(index: u32) -> Result<GpuMetrics> {
        let card = handle()?
            .device_by_index(index)
            .map_err(|e| anyhow!("NVIDIA GPU {} vanished: {}", index, e))?;
        Ok(GpuMetrics {
            temperature: card.temperature(TemperatureSensor::Gpu).ok().map(|t| t as f32),
            utilization: card.utilization_rates().ok().map(|rates| rates.gpu),
            clock_core: card.clock_info(Clock::Graphics).ok(),
        })
    }
}

pub struct NvidiaBackend {
    info: GpuInfo,
    metrics: GpuMetrics,
}

impl NvidiaBackend {
    #[cfg(feature = "nvidia")]
    pub fn new(index: u32) -> Result<Self> {
        Ok(Self {
            info: nvml::probe(index)?,
            metrics: GpuMetrics::default(),
        })
    }

    #[cfg(not(feature = "nvidia"))]
    pub fn new(_index: u32) -> Result<Self> {
        anyhow::bail!("built without the `nvidia` feature")
    }

    /// Cards NVML can see (0 without the driver or the feature)
    pub fn device_count() -> u32 {
        #[cfg(feature = "nvidia")]
        return nvml::count();

        #[cfg(not(feature = "nvidia"))]
        0
    }
}

impl GpuBackend for NvidiaBackend {
    fn info(&self) -> &GpuInfo {
        &self.info
    }

    fn update(&mut self) -> Result<()> {
        #[cfg(feature = "nvidia")]
        {
            self.metrics = nvml::read(self.info.index)?;
        }
        Ok(())
    }

    fn metrics(&self) -> &GpuMetrics {
        &self.metrics
    }
}
