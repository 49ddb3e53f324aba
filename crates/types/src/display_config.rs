//! Display configuration document.
//!
//! The grouped form (`background`, `metrics`, `texts`, ...) mirrors how themes
//! are usually written by hand. An explicit `layers` list, when present,
//! replaces the grouped form entirely.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::background::{BackgroundLayer, ForegroundLayer};
use crate::graph::{BarGraphLayer, CircularGraphLayer};
use crate::layer::{DateLayer, Layer, MetricLayer, TextLayer, TimeLayer};
use crate::scene::{Rotation, Scene};

/// Lower bound for the refresh interval
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default)]
    pub background: Option<BackgroundLayer>,
    #[serde(default)]
    pub foreground: Option<ForegroundLayer>,
    #[serde(default)]
    pub date: Option<DateLayer>,
    #[serde(default)]
    pub time: Option<TimeLayer>,
    #[serde(default)]
    pub metrics: Vec<MetricLayer>,
    #[serde(default)]
    pub texts: Vec<TextLayer>,
    #[serde(default)]
    pub bars: Vec<BarGraphLayer>,
    #[serde(default)]
    pub circulars: Vec<CircularGraphLayer>,
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::default(),
            refresh_interval_ms: default_refresh_interval_ms(),
            background: Some(BackgroundLayer::default()),
            foreground: None,
            date: None,
            time: None,
            metrics: Vec::new(),
            texts: Vec::new(),
            bars: Vec::new(),
            circulars: Vec::new(),
            layers: None,
        }
    }
}

impl DisplayConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Frame period, never below [`MIN_REFRESH_INTERVAL_MS`]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS))
    }

    /// Build the scene in paint order: background, metrics, date, time,
    /// texts, bars, circulars, foreground.
    pub fn to_scene(&self) -> Scene {
        if let Some(layers) = &self.layers {
            return Scene::new(self.rotation, layers.clone());
        }

        let mut layers = Vec::new();
        if let Some(bg) = &self.background {
            layers.push(Layer::Background(bg.clone()));
        }
        layers.extend(self.metrics.iter().cloned().map(Layer::Metric));
        if let Some(date) = &self.date {
            layers.push(Layer::Date(date.clone()));
        }
        if let Some(time) = &self.time {
            layers.push(Layer::Time(time.clone()));
        }
        layers.extend(self.texts.iter().cloned().map(Layer::Text));
        layers.extend(self.bars.iter().cloned().map(Layer::BarGraph));
        layers.extend(self.circulars.iter().cloned().map(Layer::CircularGraph));
        if let Some(fg) = &self.foreground {
            layers.push(Layer::Foreground(fg.clone()));
        }

        Scene::new(self.rotation, layers)
    }
}
