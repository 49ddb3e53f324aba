//! Metric identifiers, samples and the immutable snapshot published by the
//! sampling engine.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Every metric the sampling engine knows how to collect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    #[serde(rename = "cpu_usage")]
    CpuUsage,
    #[serde(rename = "cpu_temperature")]
    CpuTemperature,
    #[serde(rename = "cpu_frequency")]
    CpuFrequency,
    #[serde(rename = "ram_usage")]
    RamUsage,
    #[serde(rename = "gpu_usage")]
    GpuUsage,
    #[serde(rename = "gpu_temperature")]
    GpuTemperature,
    #[serde(rename = "gpu_frequency")]
    GpuFrequency,
    #[serde(rename = "network_upload")]
    NetworkUpload,
    #[serde(rename = "network_download")]
    NetworkDownload,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::CpuUsage,
        MetricKind::CpuTemperature,
        MetricKind::CpuFrequency,
        MetricKind::RamUsage,
        MetricKind::GpuUsage,
        MetricKind::GpuTemperature,
        MetricKind::GpuFrequency,
        MetricKind::NetworkUpload,
        MetricKind::NetworkDownload,
    ];

    /// Identifier used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::CpuTemperature => "cpu_temperature",
            MetricKind::CpuFrequency => "cpu_frequency",
            MetricKind::RamUsage => "ram_usage",
            MetricKind::GpuUsage => "gpu_usage",
            MetricKind::GpuTemperature => "gpu_temperature",
            MetricKind::GpuFrequency => "gpu_frequency",
            MetricKind::NetworkUpload => "network_upload",
            MetricKind::NetworkDownload => "network_download",
        }
    }

    /// Human readable label shown when a layer does not override it
    pub fn default_label(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "CPU Usage",
            MetricKind::CpuTemperature => "CPU Temp",
            MetricKind::CpuFrequency => "CPU Freq",
            MetricKind::RamUsage => "RAM Usage",
            MetricKind::GpuUsage => "GPU Usage",
            MetricKind::GpuTemperature => "GPU Temp",
            MetricKind::GpuFrequency => "GPU Freq",
            MetricKind::NetworkUpload => "Upload",
            MetricKind::NetworkDownload => "Download",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage | MetricKind::RamUsage | MetricKind::GpuUsage => "%",
            MetricKind::CpuTemperature | MetricKind::GpuTemperature => "°C",
            MetricKind::CpuFrequency | MetricKind::GpuFrequency => "MHz",
            MetricKind::NetworkUpload | MetricKind::NetworkDownload => "KB/s",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown metric: {}", s))
    }
}

/// One sampled value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub value: f64,
    pub unit: String,
    pub label: String,
    pub timestamp: DateTime<Local>,
}

impl MetricSample {
    /// Sample carrying the kind's default label and unit
    pub fn new(kind: MetricKind, value: f64, timestamp: DateTime<Local>) -> Self {
        Self {
            kind,
            value,
            unit: kind.default_unit().to_string(),
            label: kind.default_label().to_string(),
            timestamp,
        }
    }
}

/// Immutable view of every metric collected in one sampling pass.
///
/// Kinds that were unavailable or failed during the pass are simply absent.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    samples: BTreeMap<MetricKind, MetricSample>,
    taken_at: Option<DateTime<Local>>,
}

impl MetricsSnapshot {
    pub fn new(samples: impl IntoIterator<Item = MetricSample>, taken_at: DateTime<Local>) -> Self {
        Self {
            samples: samples.into_iter().map(|s| (s.kind, s)).collect(),
            taken_at: Some(taken_at),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricSample> {
        self.samples.get(&kind)
    }

    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.samples.get(&kind).map(|s| s.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.values()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// When the pass that produced this snapshot finished (`None` before the first pass)
    pub fn taken_at(&self) -> Option<DateTime<Local>> {
        self.taken_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
        }
        assert!("disk_usage".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_snapshot_lookup() {
        let now = Local::now();
        let snapshot = MetricsSnapshot::new(
            vec![
                MetricSample::new(MetricKind::CpuUsage, 42.0, now),
                MetricSample::new(MetricKind::RamUsage, 61.5, now),
            ],
            now,
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.value(MetricKind::RamUsage), Some(61.5));
        assert_eq!(snapshot.get(MetricKind::CpuUsage).unwrap().label, "CPU Usage");
        assert!(snapshot.get(MetricKind::GpuUsage).is_none());
        assert!(MetricsSnapshot::empty().taken_at().is_none());
    }
}
