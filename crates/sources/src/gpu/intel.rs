//! Intel GPU backend using sysfs (i915/xe)

use super::backend::{GpuBackend, GpuInfo, GpuMetrics, GpuVendor};
use super::intel_top::IntelGpuTop;
use crate::sysfs;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

const INTEL_VENDOR_ID: u32 = 0x8086;

const INTEL_GPU_TOP: &str = "intel_gpu_top";

/// Source of the utilization reading
enum UsageState {
    /// Tool not started yet; spawned on the first update
    Pending(&'static str),
    Running(IntelGpuTop),
    Unavailable,
}

/// Intel GPU backend.
///
/// Frequency and temperature come from sysfs. The kernel exposes no
/// utilization counter, so usage is read from `intel_gpu_top` when it is
/// installed (it needs perf access, usually root).
pub struct IntelBackend {
    info: GpuInfo,
    metrics: GpuMetrics,
    card_path: PathBuf,
    hwmon_path: Option<PathBuf>,
    usage: UsageState,
}

impl IntelBackend {
    pub fn new(card_index: u32) -> Result<Self> {
        let backend = Self::from_card_path(
            card_index,
            PathBuf::from(format!("/sys/class/drm/card{}", card_index)),
            PathBuf::from("/sys/class/hwmon"),
        )?;
        Ok(backend.with_usage_tool(INTEL_GPU_TOP))
    }

    pub fn from_card_path(card_index: u32, card_path: PathBuf, hwmon_class: PathBuf) -> Result<Self> {
        let vendor_id = sysfs::read_hex_file(&card_path.join("device").join("vendor"))?;
        if vendor_id != INTEL_VENDOR_ID {
            return Err(anyhow!("card{} is not an Intel GPU", card_index));
        }
        if !card_path.join("gt_cur_freq_mhz").exists() {
            return Err(anyhow!("card{} exposes no GT frequency", card_index));
        }

        let hwmon_path = sysfs::hwmon_roots_for(&hwmon_class, &["i915", "xe"])
            .into_iter()
            .next();

        Ok(Self {
            info: GpuInfo {
                index: card_index,
                name: format!("Intel GPU {}", card_index),
                vendor: GpuVendor::Intel,
            },
            metrics: GpuMetrics::default(),
            card_path,
            hwmon_path,
            usage: UsageState::Unavailable,
        })
    }

    /// Read usage through `program` instead of leaving it unavailable
    pub fn with_usage_tool(mut self, program: &'static str) -> Self {
        self.usage = UsageState::Pending(program);
        self
    }

    fn read_usage(&mut self) -> Option<u32> {
        if let UsageState::Pending(program) = self.usage {
            self.usage = match IntelGpuTop::spawn(program) {
                Some(top) => UsageState::Running(top),
                None => UsageState::Unavailable,
            };
        }
        match &self.usage {
            UsageState::Running(top) => top.busy().map(|busy| busy.clamp(0.0, 100.0).round() as u32),
            _ => None,
        }
    }
}

impl GpuBackend for IntelBackend {
    fn info(&self) -> &GpuInfo {
        &self.info
    }

    fn update(&mut self) -> Result<()> {
        self.metrics.clock_core = sysfs::read_int_file(&self.card_path.join("gt_cur_freq_mhz"))
            .ok()
            .map(|mhz| mhz.max(0) as u32);
        self.metrics.temperature = self.hwmon_path.as_ref().and_then(|hwmon| {
            sysfs::hwmon_temp_channels(hwmon)
                .keys()
                .find_map(|idx| sysfs::read_millidegrees(&hwmon.join(format!("temp{}_input", idx))))
        });
        self.metrics.utilization = self.read_usage();
        Ok(())
    }

    fn metrics(&self) -> &GpuMetrics {
        &self.metrics
    }
}
