//! Layer model: one renderable item of a scene.
//!
//! `Layer` is a closed set. Each variant owns an explicit config struct whose
//! optional fields carry serde defaults, so a configuration only has to name
//! what it changes.

use serde::{Deserialize, Serialize};

use crate::background::{BackgroundLayer, ForegroundLayer};
use crate::graph::{BarGraphLayer, CircularGraphLayer};
use crate::metric::MetricKind;
use crate::text::TextStyle;

/// Point in device pixel space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

fn default_true() -> bool {
    true
}

/// Static text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TextLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: TextStyle,
}

/// Live metric value rendered through a format string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    pub metric: MetricKind,
    /// Empty uses the sample's label
    #[serde(default)]
    pub label: String,
    /// Empty uses the sample's unit
    #[serde(default)]
    pub unit: String,
    /// Supports `{label}`, `{value}`, `{value:.N}` and `{unit}`
    #[serde(default = "default_format_string")]
    pub format_string: String,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub style: TextStyle,
}

fn default_format_string() -> String {
    "{label}{value}{unit}".to_string()
}

impl MetricLayer {
    pub fn new(metric: MetricKind) -> Self {
        Self {
            enabled: true,
            position: Position::default(),
            metric,
            label: String::new(),
            unit: String::new(),
            format_string: default_format_string(),
            decimals: 0,
            style: TextStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[serde(rename = "default")]
    #[default]
    Default, // Monday 3 March 2025
    #[serde(rename = "short")]
    Short, // Mon Mar 3 2025
    #[serde(rename = "numeric")]
    Numeric, // 03/03/2025
}

/// Current date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_true")]
    pub show_weekday: bool,
    #[serde(default)]
    pub show_year: bool,
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default)]
    pub style: TextStyle,
}

impl DateLayer {
    /// chrono format string for the configured flags
    pub fn format_string(&self) -> String {
        match self.date_format {
            DateFormat::Numeric => {
                if self.show_year {
                    "%d/%m/%Y".to_string()
                } else {
                    "%d/%m".to_string()
                }
            }
            DateFormat::Short => {
                let mut fmt = String::new();
                if self.show_weekday {
                    fmt.push_str("%a ");
                }
                fmt.push_str("%b %-d");
                if self.show_year {
                    fmt.push_str(" %Y");
                }
                fmt
            }
            DateFormat::Default => {
                let mut fmt = String::new();
                if self.show_weekday {
                    fmt.push_str("%A ");
                }
                fmt.push_str("%-d %B");
                if self.show_year {
                    fmt.push_str(" %Y");
                }
                fmt
            }
        }
    }
}

impl Default for DateLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Position::default(),
            show_weekday: true,
            show_year: false,
            date_format: DateFormat::default(),
            style: TextStyle::default(),
        }
    }
}

/// Current time of day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeLayer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_true")]
    pub use_24_hour: bool,
    #[serde(default)]
    pub show_seconds: bool,
    /// Only meaningful for the 12 hour clock
    #[serde(default)]
    pub show_am_pm: bool,
    #[serde(default)]
    pub style: TextStyle,
}

impl TimeLayer {
    pub fn format_string(&self) -> &'static str {
        match (self.use_24_hour, self.show_seconds, self.show_am_pm) {
            (true, false, _) => "%H:%M",
            (true, true, _) => "%H:%M:%S",
            (false, false, false) => "%I:%M",
            (false, true, false) => "%I:%M:%S",
            (false, false, true) => "%I:%M %p",
            (false, true, true) => "%I:%M:%S %p",
        }
    }
}

impl Default for TimeLayer {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Position::default(),
            use_24_hour: true,
            show_seconds: false,
            show_am_pm: false,
            style: TextStyle::default(),
        }
    }
}

/// Any renderable layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Layer {
    #[serde(rename = "background")]
    Background(BackgroundLayer),
    #[serde(rename = "foreground")]
    Foreground(ForegroundLayer),
    #[serde(rename = "text")]
    Text(TextLayer),
    #[serde(rename = "metric")]
    Metric(MetricLayer),
    #[serde(rename = "date")]
    Date(DateLayer),
    #[serde(rename = "time")]
    Time(TimeLayer),
    #[serde(rename = "bar_graph")]
    BarGraph(BarGraphLayer),
    #[serde(rename = "circular_graph")]
    CircularGraph(CircularGraphLayer),
}

impl Layer {
    pub fn is_enabled(&self) -> bool {
        match self {
            Layer::Background(l) => l.enabled,
            Layer::Foreground(l) => l.enabled,
            Layer::Text(l) => l.enabled,
            Layer::Metric(l) => l.enabled,
            Layer::Date(l) => l.enabled,
            Layer::Time(l) => l.enabled,
            Layer::BarGraph(l) => l.enabled,
            Layer::CircularGraph(l) => l.enabled,
        }
    }

    /// Type tag, as written in configuration files
    pub fn type_name(&self) -> &'static str {
        match self {
            Layer::Background(_) => "background",
            Layer::Foreground(_) => "foreground",
            Layer::Text(_) => "text",
            Layer::Metric(_) => "metric",
            Layer::Date(_) => "date",
            Layer::Time(_) => "time",
            Layer::BarGraph(_) => "bar_graph",
            Layer::CircularGraph(_) => "circular_graph",
        }
    }
}
