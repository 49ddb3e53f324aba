//! AMD GPU backend using sysfs

use super::backend::{GpuBackend, GpuInfo, GpuMetrics, GpuVendor};
use crate::sysfs;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

const AMD_VENDOR_ID: u32 = 0x1002;

/// AMD GPU backend
pub struct AmdBackend {
    info: GpuInfo,
    metrics: GpuMetrics,
    device_path: PathBuf,
    hwmon_path: Option<PathBuf>,
}

impl AmdBackend {
    /// Create a new AMD backend for the specified DRM card index
    pub fn new(card_index: u32) -> Result<Self> {
        Self::from_device_path(
            card_index,
            PathBuf::from(format!("/sys/class/drm/card{}/device", card_index)),
        )
    }

    /// Create a backend for a card's `device` directory
    pub fn from_device_path(card_index: u32, device_path: PathBuf) -> Result<Self> {
        if !device_path.exists() {
            return Err(anyhow!("AMD GPU card{} not found", card_index));
        }

        let vendor_id = sysfs::read_hex_file(&device_path.join("vendor"))?;
        if vendor_id != AMD_VENDOR_ID {
            return Err(anyhow!(
                "card{} is not an AMD GPU (vendor ID: 0x{:04x})",
                card_index,
                vendor_id
            ));
        }

        let device_id = sysfs::read_hex_file(&device_path.join("device")).unwrap_or(0);
        let name = Self::get_gpu_name(device_id)
            .unwrap_or_else(|| format!("AMD GPU {}", card_index));
        let hwmon_path = Self::find_hwmon_path(&device_path);

        Ok(Self {
            info: GpuInfo {
                index: card_index,
                name,
                vendor: GpuVendor::Amd,
            },
            metrics: GpuMetrics::default(),
            device_path,
            hwmon_path,
        })
    }

    /// Find the amdgpu hwmon directory for this card
    fn find_hwmon_path(device_path: &Path) -> Option<PathBuf> {
        let candidates = sysfs::list_prefixed(&device_path.join("hwmon"), "hwmon");
        candidates
            .iter()
            .find(|p| sysfs::read_text_file(&p.join("name")).is_some_and(|n| n.contains("amdgpu")))
            .or_else(|| candidates.first())
            .cloned()
    }

    /// Get a human-readable GPU name from device ID (basic mapping)
    fn get_gpu_name(device_id: u32) -> Option<String> {
        let name = match device_id {
            0x67DF => "RX 480/470",
            0x687F => "Vega 56/64",
            0x731F => "RX 5700 XT",
            0x73BF => "RX 6900 XT",
            0x73DF => "RX 6700 XT",
            0x73FF => "RX 6600 XT",
            0x744C => "RX 7900 XTX",
            0x7480 => "RX 7600",
            _ => return None,
        };
        Some(format!("AMD Radeon {}", name))
    }

    /// Heuristic preferring discrete cards over APUs: a non-zero PCI bus,
    /// at least 1 GiB of VRAM, a higher card index and DPM clock tables all
    /// raise the score.
    pub fn discrete_score(&self) -> u32 {
        let mut score = 0;
        let bus = fs::canonicalize(&self.device_path).ok().and_then(|real| {
            real.file_name()
                .and_then(|n| n.to_str())
                .and_then(|bdf| bdf.split(':').nth(1).map(str::to_string))
        });
        if bus.is_some_and(|b| b != "00") {
            score += 100;
        }
        let vram = sysfs::read_int_file(&self.device_path.join("mem_info_vram_total")).unwrap_or(0);
        if vram >= 1 << 30 {
            score += 50;
        }
        score += self.info.index * 10;
        if self.device_path.join("pp_dpm_sclk").exists() {
            score += 5;
        }
        score
    }

    /// Junction/hotspot channel, then edge, then the first channel
    fn read_temperature(&self) -> Option<f32> {
        let hwmon = self.hwmon_path.as_ref()?;
        let channels = sysfs::hwmon_temp_channels(hwmon);

        let labelled = |keys: &[&str]| {
            channels
                .iter()
                .find(|(_, label)| keys.iter().any(|k| label.contains(k)))
                .map(|(&idx, _)| idx)
        };
        let index = labelled(&["junction", "hotspot"])
            .or_else(|| labelled(&["edge"]))
            .or_else(|| channels.keys().next().copied())?;

        sysfs::read_millidegrees(&hwmon.join(format!("temp{}_input", index)))
    }

    fn read_utilization(&self) -> Option<u32> {
        let path = self.device_path.join("gpu_busy_percent");
        sysfs::read_int_file(&path).ok().map(|v| v.clamp(0, 100) as u32)
    }

    /// Active `pp_dpm_sclk` level, else hwmon `freq1_input` (Hz)
    fn read_core_clock(&self) -> Option<u32> {
        if let Ok(content) = fs::read_to_string(self.device_path.join("pp_dpm_sclk")) {
            if let Some(mhz) = parse_active_dpm_level(&content) {
                return Some(mhz);
            }
        }

        let hwmon = self.hwmon_path.as_ref()?;
        sysfs::read_int_file(&hwmon.join("freq1_input"))
            .ok()
            .filter(|&hz| hz > 0)
            .map(|hz| (hz / 1_000_000) as u32)
    }
}

/// Extract the clock of the line marked `*` in a `pp_dpm_*` table.
/// Format: `"0: 300Mhz\n1: 1200Mhz *\n"`
fn parse_active_dpm_level(content: &str) -> Option<u32> {
    let line = content.lines().find(|l| l.contains('*'))?;
    let value = line.split(':').nth(1)?;
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl GpuBackend for AmdBackend {
    fn info(&self) -> &GpuInfo {
        &self.info
    }

    fn update(&mut self) -> Result<()> {
        self.metrics.temperature = self.read_temperature();
        self.metrics.utilization = self.read_utilization();
        self.metrics.clock_core = self.read_core_clock();
        Ok(())
    }

    fn metrics(&self) -> &GpuMetrics {
        &self.metrics
    }
}
