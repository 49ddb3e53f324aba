//! Application settings and display configuration loading

use anyhow::{Context, Result};
use lcd_sens_types::{DisplayConfig, Layer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{
    DEFAULT_MAX_BACKOFF_TICKS, DEFAULT_MIN_FRAME_INTERVAL, DEFAULT_OPEN_TIMEOUT,
};
use crate::core::RefreshSettings;

/// Application-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    /// Display configuration to load when `--config` is not given
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// `VID:PID` of the panel to drive instead of auto-detecting
    #[serde(default)]
    pub device: Option<String>,
    /// Log verbosity (0=warn, 1=info, 2=debug, 3=trace)
    #[serde(default)]
    pub debug_level: u8,
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    #[serde(default = "default_max_backoff_ticks")]
    pub max_backoff_ticks: u32,
    #[serde(default = "default_min_frame_interval_ms")]
    pub min_frame_interval_ms: u64,
}

fn default_open_timeout_ms() -> u64 {
    DEFAULT_OPEN_TIMEOUT.as_millis() as u64
}

fn default_max_backoff_ticks() -> u32 {
    DEFAULT_MAX_BACKOFF_TICKS
}

fn default_min_frame_interval_ms() -> u64 {
    DEFAULT_MIN_FRAME_INTERVAL.as_millis() as u64
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            device: None,
            debug_level: 0,
            open_timeout_ms: default_open_timeout_ms(),
            max_backoff_ticks: default_max_backoff_ticks(),
            min_frame_interval_ms: default_min_frame_interval_ms(),
        }
    }
}

impl AppSettings {
    /// Load settings from the platform config directory.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        Ok(settings)
    }

    /// `<config dir>/lcd-sens/settings.json`
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Platform configuration directory for lcd-sens
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "lcd-sens", "lcd-sens")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Display configuration path: explicit setting, else `display.json`
    /// next to the settings file
    pub fn display_config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("display.json")),
        }
    }

    /// Loop settings for a display refreshed every `interval`
    pub fn refresh_settings(&self, interval: Duration) -> RefreshSettings {
        RefreshSettings {
            interval,
            min_frame_interval: Duration::from_millis(self.min_frame_interval_ms),
            open_timeout: Duration::from_millis(self.open_timeout_ms),
            max_backoff_ticks: self.max_backoff_ticks,
        }
    }
}

/// Load a display configuration file.
///
/// Relative image paths are resolved against the file's directory.
pub fn load_display_config(path: &Path) -> Result<DisplayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading display config {}", path.display()))?;
    let mut config = DisplayConfig::from_json(&content)
        .with_context(|| format!("parsing display config {}", path.display()))?;
    if let Some(base) = path.parent() {
        resolve_image_paths(&mut config, base);
    }
    Ok(config)
}

fn resolve_image_paths(config: &mut DisplayConfig, base: &Path) {
    let resolve = |image: &mut Option<PathBuf>| {
        if let Some(p) = image.as_mut() {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    };

    if let Some(bg) = config.background.as_mut() {
        resolve(&mut bg.image);
    }
    if let Some(fg) = config.foreground.as_mut() {
        resolve(&mut fg.image);
    }
    for layer in config.layers.iter_mut().flatten() {
        match layer {
            Layer::Background(bg) => resolve(&mut bg.image),
            Layer::Foreground(fg) => resolve(&mut fg.image),
            _ => {}
        }
    }
}
