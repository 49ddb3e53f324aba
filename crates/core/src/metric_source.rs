//! Metric source trait and the sampling pass shared by every engine

use anyhow::Result;
use chrono::{DateTime, Local};
use lcd_sens_types::{MetricKind, MetricSample};

/// Trait for all metric sources
///
/// A source produces exactly one [`MetricKind`]. Sources own whatever
/// handles they need (sysinfo, sysfs paths, NVML) and refresh them on each
/// call to [`MetricSource::sample`].
pub trait MetricSource: Send {
    /// Metric this source produces
    fn kind(&self) -> MetricKind;

    /// Unit attached to every sample
    fn unit(&self) -> &str {
        self.kind().default_unit()
    }

    /// Label attached to every sample
    fn label(&self) -> &str {
        self.kind().default_label()
    }

    /// Check if this source can produce values on the current system
    fn is_available(&self) -> bool {
        true
    }

    /// Read the current value.
    ///
    /// `Ok(None)` means the metric is not supported on this host, `Err` a
    /// transient read failure. Both leave the slot absent for this pass.
    fn sample(&mut self) -> Result<Option<f64>>;
}

/// Type-erased metric source for dynamic dispatch
pub type BoxedMetricSource = Box<dyn MetricSource>;

/// Run one sampling pass over `sources`.
///
/// Failures are logged at debug level and only drop the failing source's
/// sample; the remaining sources are always sampled.
pub fn sample_all(sources: &mut [BoxedMetricSource], now: DateTime<Local>) -> Vec<MetricSample> {
    let mut samples = Vec::with_capacity(sources.len());
    for source in sources.iter_mut() {
        let kind = source.kind();
        match source.sample() {
            Ok(Some(value)) if value.is_finite() => samples.push(MetricSample {
                kind,
                value,
                unit: source.unit().to_string(),
                label: source.label().to_string(),
                timestamp: now,
            }),
            Ok(Some(value)) => log::debug!("{} produced non-finite value {}", kind, value),
            Ok(None) => log::trace!("{} unavailable on this host", kind),
            Err(e) => log::debug!("Failed to sample {}: {:#}", kind, e),
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Fixed(MetricKind, f64);

    impl MetricSource for Fixed {
        fn kind(&self) -> MetricKind {
            self.0
        }

        fn sample(&mut self) -> Result<Option<f64>> {
            Ok(Some(self.1))
        }
    }

    struct Broken;

    impl MetricSource for Broken {
        fn kind(&self) -> MetricKind {
            MetricKind::GpuTemperature
        }

        fn sample(&mut self) -> Result<Option<f64>> {
            Err(anyhow!("sensor went away"))
        }
    }

    struct Unsupported;

    impl MetricSource for Unsupported {
        fn kind(&self) -> MetricKind {
            MetricKind::GpuUsage
        }

        fn sample(&mut self) -> Result<Option<f64>> {
            Ok(None)
        }
    }

    #[test]
    fn test_failing_source_only_drops_its_slot() {
        let mut sources: Vec<BoxedMetricSource> = vec![
            Box::new(Fixed(MetricKind::CpuUsage, 42.0)),
            Box::new(Broken),
            Box::new(Unsupported),
            Box::new(Fixed(MetricKind::RamUsage, 55.0)),
        ];

        let samples = sample_all(&mut sources, Local::now());
        let kinds: Vec<_> = samples.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![MetricKind::CpuUsage, MetricKind::RamUsage]);
        assert_eq!(samples[0].unit, "%");
        assert_eq!(samples[0].label, "CPU Usage");
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let mut sources: Vec<BoxedMetricSource> =
            vec![Box::new(Fixed(MetricKind::CpuTemperature, f64::NAN))];
        assert!(sample_all(&mut sources, Local::now()).is_empty());
    }
}
