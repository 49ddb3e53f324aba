//! Background and foreground image layers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::Color;
use crate::layer::Position;

/// How an image is fitted onto the panel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[serde(rename = "stretch")]
    #[default]
    Stretch, // Ignore aspect ratio
    #[serde(rename = "fit", alias = "scaled_fit")]
    Fit, // Contain, letterboxed on the solid color
    #[serde(rename = "fill", alias = "scaled_fill")]
    Fill, // Cover, center cropped
    #[serde(rename = "centered")]
    Centered, // Native size, centered and cropped
    #[serde(rename = "tiled")]
    Tiled, // Native size, repeated from the top-left
}

/// Bottom-most layer: a solid color with an optional image on top.
///
/// `image` may name a still image, an animated GIF or a directory whose
/// images are shown in name order, each for `frame_duration_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_background_color")]
    pub color: Color,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub scale_mode: ScaleMode,
    /// Opacity of the image over the solid color
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_frame_duration_ms")]
    pub frame_duration_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_background_color() -> Color {
    Color::BLACK
}

fn default_alpha() -> f64 {
    1.0
}

fn default_frame_duration_ms() -> u64 {
    1000
}

impl Default for BackgroundLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            color: default_background_color(),
            image: None,
            scale_mode: ScaleMode::default(),
            alpha: default_alpha(),
            frame_duration_ms: default_frame_duration_ms(),
        }
    }
}

/// Image overlay painted above every other layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForegroundLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_alpha")]
    pub opacity: f64,
    /// `None` paints the image at its native size at `position`
    #[serde(default)]
    pub scale_mode: Option<ScaleMode>,
}

impl Default for ForegroundLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            image: None,
            position: Position::default(),
            opacity: default_alpha(),
            scale_mode: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_mode_aliases() {
        let fit: ScaleMode = serde_json::from_str("\"scaled_fit\"").unwrap();
        let fill: ScaleMode = serde_json::from_str("\"scaled_fill\"").unwrap();
        assert_eq!(fit, ScaleMode::Fit);
        assert_eq!(fill, ScaleMode::Fill);
    }

    #[test]
    fn test_background_defaults() {
        let bg: BackgroundLayer = serde_json::from_str("{}").unwrap();
        assert!(bg.enabled);
        assert_eq!(bg.color, Color::BLACK);
        assert_eq!(bg.alpha, 1.0);
        assert!(bg.image.is_none());
        assert_eq!(bg.frame_duration_ms, 1000);
    }
}
