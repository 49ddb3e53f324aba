//! lcd-sens: renders live system metrics onto USB LCD panels
//!
//! This library wires the workspace crates together:
//! - [`core::MetricsEngine`] samples system sensors and publishes snapshots
//! - [`core::RefreshLoop`] composes, encodes and sends frames to a panel
//! - [`config`] loads application settings and display configurations and
//!   reloads the latter when the file changes

pub mod config;
pub mod core;

// Re-export commonly used types
pub use config::{load_display_config, AppSettings, ReloadingScene};
pub use core::{MetricsEngine, RefreshLoop, RefreshSettings};
pub use lcd_sens_types::{DisplayConfig, Scene};
