//! Text styling shared by every text-bearing layer

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Horizontal anchor of a text layer's position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "center")]
    #[default]
    Center,
    #[serde(rename = "right")]
    Right,
}

/// Drop shadow drawn beneath the text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShadowConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_shadow_color")]
    pub color: Color,
    #[serde(default = "default_shadow_offset")]
    pub offset_x: i32,
    #[serde(default = "default_shadow_offset")]
    pub offset_y: i32,
    /// Number of box-blur passes over the shadow mask
    #[serde(default = "default_shadow_blur")]
    pub blur: u32,
}

fn default_shadow_color() -> Color {
    Color::new(0.0, 0.0, 0.0, 0.5)
}

fn default_shadow_offset() -> i32 {
    2
}

fn default_shadow_blur() -> u32 {
    2
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color: default_shadow_color(),
            offset_x: default_shadow_offset(),
            offset_y: default_shadow_offset(),
            blur: default_shadow_blur(),
        }
    }
}

/// Stroke around the glyph outlines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_outline_width")]
    pub width: f64,
}

fn default_outline_width() -> f64 {
    1.0
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Color::BLACK,
            width: default_outline_width(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GradientDirection {
    #[serde(rename = "vertical")]
    #[default]
    Vertical,
    #[serde(rename = "horizontal")]
    Horizontal,
    #[serde(rename = "diagonal")]
    Diagonal,
}

/// Two-stop gradient replacing the solid text color
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gradient_start")]
    pub color1: Color,
    #[serde(default = "default_gradient_end")]
    pub color2: Color,
    #[serde(default)]
    pub direction: GradientDirection,
}

fn default_gradient_start() -> Color {
    Color::WHITE
}

fn default_gradient_end() -> Color {
    Color::new(0.39, 0.39, 0.39, 1.0)
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color1: default_gradient_start(),
            color2: default_gradient_end(),
            direction: GradientDirection::default(),
        }
    }
}

/// Font and effects of a text layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_text_color")]
    pub color: Color,
    #[serde(default)]
    pub alignment: TextAlignment,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default)]
    pub outline: OutlineConfig,
    #[serde(default)]
    pub gradient: GradientConfig,
}

fn default_font_family() -> String {
    "Sans".to_string()
}

fn default_font_size() -> f64 {
    24.0
}

fn default_text_color() -> Color {
    Color::WHITE
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: default_text_color(),
            alignment: TextAlignment::default(),
            shadow: ShadowConfig::default(),
            outline: OutlineConfig::default(),
            gradient: GradientConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_defaults_from_empty_object() {
        let style: TextStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style, TextStyle::default());
        assert!(!style.shadow.enabled);
        assert_eq!(style.alignment, TextAlignment::Center);
    }

    #[test]
    fn test_partial_effect_config() {
        let style: TextStyle = serde_json::from_str(
            r##"{"font_size": 32, "outline": {"enabled": true, "color": "#FF0000"}}"##,
        )
        .unwrap();
        assert_eq!(style.font_size, 32.0);
        assert!(style.outline.enabled);
        assert_eq!(style.outline.width, 1.0);
        assert_eq!(style.outline.color.to_rgba8(), (255, 0, 0, 255));
    }
}
