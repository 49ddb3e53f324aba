//! lcd-sens-core: Core traits and shared constants for lcd-sens.
//!
//! This crate contains the `MetricSource` trait implemented by every sensor
//! backend and the constants shared by the sampling and refresh loops.

pub mod constants;
mod metric_source;

pub use constants::{
    BYTES_PER_KB, DEFAULT_SAMPLE_INTERVAL, MAX_PLAUSIBLE_TEMP_C,
    MIN_PLAUSIBLE_TEMP_C,
};
pub use metric_source::{sample_all, BoxedMetricSource, MetricSource};

// Re-export types used in trait signatures for convenience
pub use lcd_sens_types::{MetricKind, MetricSample, MetricsSnapshot};
