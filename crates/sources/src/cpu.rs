//! CPU usage, frequency and temperature sources

use anyhow::Result;
use lcd_sens_core::{MetricKind, MetricSource, MAX_PLAUSIBLE_TEMP_C, MIN_PLAUSIBLE_TEMP_C};
use std::path::{Path, PathBuf};

use crate::shared_sensors;
use crate::sysfs;

/// Global CPU usage in percent
pub struct CpuUsageSource;

impl CpuUsageSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuUsageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for CpuUsageSource {
    fn kind(&self) -> MetricKind {
        MetricKind::CpuUsage
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let usage = shared_sensors::with_system(|system| {
            system.refresh_cpu_all();
            system.global_cpu_usage()
        });
        Ok(Some(usage as f64))
    }
}

/// Current frequency of the first CPU in MHz
pub struct CpuFrequencySource;

impl CpuFrequencySource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuFrequencySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for CpuFrequencySource {
    fn kind(&self) -> MetricKind {
        MetricKind::CpuFrequency
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let freq = shared_sensors::with_system(|system| {
            system.refresh_cpu_frequency();
            system.cpus().first().map(|cpu| cpu.frequency())
        });
        // sysinfo reports 0 when the frequency is unknown
        Ok(freq.filter(|&mhz| mhz > 0).map(|mhz| mhz as f64))
    }
}

/// Package/die temperature in °C.
///
/// Lookup order: AMD `k10temp`/`zenpower` hwmon channels, then CPU-looking
/// sysinfo components, then `/sys/class/thermal` zones. Readings outside the
/// plausible range are ignored.
pub struct CpuTemperatureSource {
    hwmon_class: PathBuf,
    thermal_class: PathBuf,
    use_components: bool,
}

const AMD_CPU_DRIVERS: &[&str] = &["k10temp", "zenpower"];
const CPU_COMPONENT_KEYS: &[&str] = &[
    "k10temp", "zenpower", "coretemp", "cpu", "package", "tctl", "tdie",
];
const CPU_ZONE_KEYS: &[&str] = &["k10temp", "zenpower", "x86_pkg_temp", "cpu"];

impl CpuTemperatureSource {
    pub fn new() -> Self {
        Self {
            hwmon_class: PathBuf::from("/sys/class/hwmon"),
            thermal_class: PathBuf::from("/sys/class/thermal"),
            use_components: true,
        }
    }

    /// Read from alternate sysfs roots and skip sysinfo (used by tests)
    pub fn with_roots(hwmon_class: impl Into<PathBuf>, thermal_class: impl Into<PathBuf>) -> Self {
        Self {
            hwmon_class: hwmon_class.into(),
            thermal_class: thermal_class.into(),
            use_components: false,
        }
    }

    fn from_amd_hwmon(&self) -> Option<f32> {
        sysfs::hwmon_roots_for(&self.hwmon_class, AMD_CPU_DRIVERS)
            .iter()
            .find_map(|root| pick_best_amd_temp(root))
    }

    fn from_components(&self) -> Option<f32> {
        if !self.use_components {
            return None;
        }
        shared_sensors::get_refreshed_temperatures()
            .into_iter()
            .filter(|(label, _)| {
                let label = label.to_lowercase();
                CPU_COMPONENT_KEYS.iter().any(|k| label.contains(k))
            })
            .map(|(_, temp)| temp)
            .find(|&t| is_plausible(t))
    }

    fn from_thermal_zones(&self) -> Option<f32> {
        sysfs::list_prefixed(&self.thermal_class, "thermal_zone")
            .iter()
            .filter(|zone| {
                sysfs::read_text_file(&zone.join("type"))
                    .is_some_and(|t| CPU_ZONE_KEYS.iter().any(|k| t.contains(k)))
            })
            .filter_map(|zone| sysfs::read_millidegrees(&zone.join("temp")))
            .find(|&t| is_plausible(t))
    }
}

impl Default for CpuTemperatureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for CpuTemperatureSource {
    fn kind(&self) -> MetricKind {
        MetricKind::CpuTemperature
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let temp = self
            .from_amd_hwmon()
            .or_else(|| self.from_components())
            .or_else(|| self.from_thermal_zones());
        Ok(temp.map(|t| t as f64))
    }
}

fn is_plausible(celsius: f32) -> bool {
    celsius > MIN_PLAUSIBLE_TEMP_C && celsius < MAX_PLAUSIBLE_TEMP_C
}

/// Best temperature channel of a k10temp/zenpower hwmon directory:
/// Tdie, then Tctl, then the hottest non-CCD channel, then the hottest CCD.
pub fn pick_best_amd_temp(root: &Path) -> Option<f32> {
    let channels = sysfs::hwmon_temp_channels(root);
    let read = |idx: u32| {
        sysfs::read_millidegrees(&root.join(format!("temp{}_input", idx))).filter(|&t| is_plausible(t))
    };

    for wanted in ["tdie", "tctl"] {
        if let Some(t) = channels
            .iter()
            .filter(|(_, label)| label.contains(wanted))
            .find_map(|(&idx, _)| read(idx))
        {
            return Some(t);
        }
    }

    let (ccd, non_ccd): (Vec<_>, Vec<_>) = channels
        .iter()
        .filter_map(|(&idx, label)| read(idx).map(|t| (label.contains("ccd"), t)))
        .partition(|(is_ccd, _)| *is_ccd);

    let hottest = |temps: Vec<(bool, f32)>| temps.into_iter().map(|(_, t)| t).reduce(f32::max);
    hottest(non_ccd).or_else(|| hottest(ccd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_channel(root: &Path, idx: u32, label: Option<&str>, millideg: i64) {
        fs::write(root.join(format!("temp{}_input", idx)), millideg.to_string()).unwrap();
        if let Some(label) = label {
            fs::write(root.join(format!("temp{}_label", idx)), label).unwrap();
        }
    }

    #[test]
    fn test_amd_prefers_tdie_over_tctl() {
        let dir = tempfile::tempdir().unwrap();
        write_channel(dir.path(), 1, Some("Tctl"), 70_000);
        write_channel(dir.path(), 2, Some("Tdie"), 60_000);
        write_channel(dir.path(), 3, Some("Tccd1"), 80_000);
        assert_eq!(pick_best_amd_temp(dir.path()), Some(60.0));
    }

    #[test]
    fn test_amd_falls_back_to_hottest_non_ccd_then_ccd() {
        let dir = tempfile::tempdir().unwrap();
        write_channel(dir.path(), 3, Some("Tccd1"), 80_000);
        write_channel(dir.path(), 4, Some("Tccd2"), 82_000);
        assert_eq!(pick_best_amd_temp(dir.path()), Some(82.0));

        write_channel(dir.path(), 5, None, 48_000);
        write_channel(dir.path(), 6, None, 52_000);
        assert_eq!(pick_best_amd_temp(dir.path()), Some(52.0));
    }

    #[test]
    fn test_implausible_readings_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_channel(dir.path(), 1, Some("Tctl"), 0);
        write_channel(dir.path(), 2, None, 130_000);
        assert_eq!(pick_best_amd_temp(dir.path()), None);
    }

    #[test]
    fn test_source_walks_hwmon_then_thermal_zones() {
        let hwmon = tempfile::tempdir().unwrap();
        let thermal = tempfile::tempdir().unwrap();

        let zone = thermal.path().join("thermal_zone0");
        fs::create_dir(&zone).unwrap();
        fs::write(zone.join("type"), "x86_pkg_temp\n").unwrap();
        fs::write(zone.join("temp"), "55000\n").unwrap();

        let mut source = CpuTemperatureSource::with_roots(hwmon.path(), thermal.path());
        assert_eq!(source.sample().unwrap(), Some(55.0));

        let amd = hwmon.path().join("hwmon2");
        fs::create_dir(&amd).unwrap();
        fs::write(amd.join("name"), "k10temp\n").unwrap();
        write_channel(&amd, 1, Some("Tctl"), 61_500);
        assert_eq!(source.sample().unwrap(), Some(61.5));
    }

    #[test]
    fn test_no_sensors_is_unavailable_not_error() {
        let hwmon = tempfile::tempdir().unwrap();
        let thermal = tempfile::tempdir().unwrap();
        let mut source = CpuTemperatureSource::with_roots(hwmon.path(), thermal.path());
        assert_eq!(source.sample().unwrap(), None);
    }
}
