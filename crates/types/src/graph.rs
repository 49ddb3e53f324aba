//! Bar and circular gauge layers

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::layer::Position;
use crate::metric::MetricKind;
use crate::text::TextStyle;

/// Bar orientation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BarOrientation {
    #[serde(rename = "horizontal")]
    #[default]
    Horizontal, // Fills left to right
    #[serde(rename = "vertical")]
    Vertical, // Fills bottom to top
}

/// Fraction of a gauge that is filled for `value` in `[min, max]`.
///
/// Always within `[0, 1]`; a degenerate range (`max <= min`) yields 0.
pub fn fill_fraction(value: f64, min: f64, max: f64) -> f64 {
    if max <= min || !value.is_finite() {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Rectangular progress bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BarGraphLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub metric: Option<MetricKind>,
    /// Used when no metric is bound or it has never been sampled
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    #[serde(default = "default_bar_width")]
    pub width: f64,
    #[serde(default = "default_bar_height")]
    pub height: f64,
    #[serde(default)]
    pub orientation: BarOrientation,
    #[serde(default = "default_fill_color")]
    pub fill_color: Color,
    #[serde(default = "default_track_color")]
    pub background_color: Color,
    #[serde(default = "default_border_color")]
    pub border_color: Color,
    #[serde(default)]
    pub show_border: bool,
    #[serde(default = "default_border_width")]
    pub border_width: f64,
    #[serde(default)]
    pub corner_radius: f64,
}

impl BarGraphLayer {
    pub fn fraction(&self, value: f64) -> f64 {
        fill_fraction(value, self.min_value, self.max_value)
    }
}

impl Default for BarGraphLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Position::default(),
            metric: None,
            value: 0.0,
            min_value: 0.0,
            max_value: default_max_value(),
            width: default_bar_width(),
            height: default_bar_height(),
            orientation: BarOrientation::default(),
            fill_color: default_fill_color(),
            background_color: default_track_color(),
            border_color: default_border_color(),
            show_border: false,
            border_width: default_border_width(),
            corner_radius: 0.0,
        }
    }
}

/// Ring gauge drawn around `position`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircularGraphLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub metric: Option<MetricKind>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    #[serde(default = "default_start_angle")]
    pub start_angle: f64, // Degrees (0 = right, 90 = down, -90 = up)
    #[serde(default = "default_sweep_angle")]
    pub sweep_angle: f64, // Degrees, clockwise
    #[serde(default = "default_fill_color")]
    pub fill_color: Color,
    #[serde(default = "default_track_color")]
    pub track_color: Color,
    #[serde(default = "default_true")]
    pub show_track: bool,
    #[serde(default)]
    pub show_value: bool,
    #[serde(default)]
    pub value_style: TextStyle,
}

impl CircularGraphLayer {
    pub fn fraction(&self, value: f64) -> f64 {
        fill_fraction(value, self.min_value, self.max_value)
    }
}

impl Default for CircularGraphLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Position::default(),
            metric: None,
            value: 0.0,
            min_value: 0.0,
            max_value: default_max_value(),
            radius: default_radius(),
            thickness: default_thickness(),
            start_angle: default_start_angle(),
            sweep_angle: default_sweep_angle(),
            fill_color: default_fill_color(),
            track_color: default_track_color(),
            show_track: true,
            show_value: false,
            value_style: TextStyle::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_value() -> f64 {
    100.0
}

fn default_bar_width() -> f64 {
    200.0
}

fn default_bar_height() -> f64 {
    20.0
}

fn default_radius() -> f64 {
    50.0
}

fn default_thickness() -> f64 {
    10.0
}

fn default_start_angle() -> f64 {
    -90.0
}

fn default_sweep_angle() -> f64 {
    360.0
}

fn default_fill_color() -> Color {
    Color::from_rgba8(0, 200, 100, 255)
}

fn default_track_color() -> Color {
    Color::from_rgba8(60, 60, 60, 255)
}

fn default_border_color() -> Color {
    Color::WHITE
}

fn default_border_width() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_clamps() {
        assert_eq!(fill_fraction(-10.0, 0.0, 100.0), 0.0);
        assert_eq!(fill_fraction(150.0, 0.0, 100.0), 1.0);
        assert_eq!(fill_fraction(25.0, 0.0, 100.0), 0.25);
        assert_eq!(fill_fraction(f64::NAN, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_degenerate_range_is_empty() {
        assert_eq!(fill_fraction(50.0, 100.0, 100.0), 0.0);
        assert_eq!(fill_fraction(50.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_fraction_is_monotonic() {
        let bar = BarGraphLayer {
            min_value: 20.0,
            max_value: 80.0,
            ..Default::default()
        };
        let mut last = 0.0;
        for step in 0..=120 {
            let f = bar.fraction(step as f64);
            assert!(f >= last);
            assert!((0.0..=1.0).contains(&f));
            last = f;
        }
        assert_eq!(last, 1.0);
    }
}
