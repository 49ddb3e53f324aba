//! Shared constants

use std::time::Duration;

/// Interval between metric sampling passes
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

pub const BYTES_PER_KB: f64 = 1024.0;

/// Temperatures outside this range are treated as bogus sensor readings
pub const MIN_PLAUSIBLE_TEMP_C: f32 = 0.0;
pub const MAX_PLAUSIBLE_TEMP_C: f32 = 120.0;
