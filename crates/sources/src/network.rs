//! Network throughput sources

use anyhow::Result;
use lcd_sens_core::{MetricKind, MetricSource, BYTES_PER_KB};
use std::time::Instant;

use crate::shared_sensors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Transfer rate in KB/s, summed over all non-loopback interfaces.
///
/// The rate is the byte delta between two consecutive samples, so the first
/// sample after construction only primes the counters and reports nothing.
pub struct NetworkRateSource {
    direction: Direction,
    meter: RateMeter,
}

impl NetworkRateSource {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            meter: RateMeter::default(),
        }
    }

    pub fn upload() -> Self {
        Self::new(Direction::Upload)
    }

    pub fn download() -> Self {
        Self::new(Direction::Download)
    }
}

impl MetricSource for NetworkRateSource {
    fn kind(&self) -> MetricKind {
        match self.direction {
            Direction::Upload => MetricKind::NetworkUpload,
            Direction::Download => MetricKind::NetworkDownload,
        }
    }

    fn sample(&mut self) -> Result<Option<f64>> {
        let (received, transmitted) = shared_sensors::network_totals();
        let total = match self.direction {
            Direction::Upload => transmitted,
            Direction::Download => received,
        };
        Ok(self.meter.update(total, Instant::now()))
    }
}

/// Turns a monotonically growing byte counter into KB/s
#[derive(Debug, Default)]
struct RateMeter {
    previous: Option<(u64, Instant)>,
}

impl RateMeter {
    fn update(&mut self, total_bytes: u64, now: Instant) -> Option<f64> {
        let rate = self.previous.and_then(|(prev_bytes, prev_time)| {
            let elapsed = now.duration_since(prev_time).as_secs_f64();
            if elapsed > 0.0 {
                // Counters can go backwards when an interface disappears
                let delta = total_bytes.saturating_sub(prev_bytes);
                Some(delta as f64 / elapsed / BYTES_PER_KB)
            } else {
                None
            }
        });
        self.previous = Some((total_bytes, now));
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_meter() {
        let mut meter = RateMeter::default();
        let start = Instant::now();

        assert_eq!(meter.update(10_000, start), None);
        let rate = meter.update(10_000 + 2048, start + Duration::from_secs(2)).unwrap();
        assert!((rate - 1.0).abs() < 1e-9);

        // Counter reset never yields a negative rate
        let rate = meter.update(0, start + Duration::from_secs(3)).unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(NetworkRateSource::upload().kind(), MetricKind::NetworkUpload);
        assert_eq!(NetworkRateSource::download().kind(), MetricKind::NetworkDownload);
    }
}
