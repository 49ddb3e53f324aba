//! Abstract GPU backend trait

use anyhow::Result;

use super::amd::AmdBackend;
use super::intel::IntelBackend;
use super::nvidia::NvidiaBackend;

/// GPU information structure
#[derive(Debug, Clone)]
pub struct GpuInfo {
    pub index: u32,
    pub name: String,
    pub vendor: GpuVendor,
}

/// GPU vendor enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
}

impl GpuVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "NVIDIA",
            GpuVendor::Amd => "AMD",
            GpuVendor::Intel => "Intel",
        }
    }
}

/// GPU metrics structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuMetrics {
    pub temperature: Option<f32>, // Temperature in Celsius
    pub utilization: Option<u32>, // GPU utilization in %
    pub clock_core: Option<u32>,  // Core clock in MHz
}

/// Abstract GPU backend trait
///
/// Each vendor implements this trait to provide consistent GPU metrics.
pub trait GpuBackend: Send {
    /// Get information about this GPU
    fn info(&self) -> &GpuInfo;

    /// Update GPU metrics (refresh data from hardware)
    fn update(&mut self) -> Result<()>;

    /// Get current metrics
    fn metrics(&self) -> &GpuMetrics;
}

/// Backends as an enum instead of `Box<dyn>` for single indirection
pub enum GpuBackendEnum {
    Amd(Box<AmdBackend>),
    Intel(Box<IntelBackend>),
    Nvidia(Box<NvidiaBackend>),
}

impl GpuBackend for GpuBackendEnum {
    fn info(&self) -> &GpuInfo {
        match self {
            GpuBackendEnum::Amd(b) => b.info(),
            GpuBackendEnum::Intel(b) => b.info(),
            GpuBackendEnum::Nvidia(b) => b.info(),
        }
    }

    fn update(&mut self) -> Result<()> {
        match self {
            GpuBackendEnum::Amd(b) => b.update(),
            GpuBackendEnum::Intel(b) => b.update(),
            GpuBackendEnum::Nvidia(b) => b.update(),
        }
    }

    fn metrics(&self) -> &GpuMetrics {
        match self {
            GpuBackendEnum::Amd(b) => b.metrics(),
            GpuBackendEnum::Intel(b) => b.metrics(),
            GpuBackendEnum::Nvidia(b) => b.metrics(),
        }
    }
}
