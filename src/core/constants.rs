//! Shared constants for the application

use std::time::Duration;

/// Refresh loop tick period when the configuration does not set one
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Minimum gap between two frames, including requested renders.
/// Matches the smallest refresh interval a configuration may ask for.
pub const DEFAULT_MIN_FRAME_INTERVAL: Duration =
    Duration::from_millis(lcd_sens_types::MIN_REFRESH_INTERVAL_MS);

/// Bound on a single device open
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on ticks skipped after consecutive device failures
pub const DEFAULT_MAX_BACKOFF_TICKS: u32 = 30;
