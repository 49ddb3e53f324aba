//! lcd-sens-types: Shared data types for lcd-sens.
//!
//! This crate contains pure data types (colors, metric samples, layer and
//! scene configurations) shared across all lcd-sens crates. They carry no
//! Cairo dependency unless the `cairo` feature is enabled, making them
//! suitable as a foundation layer.

pub mod background;
pub mod color;
pub mod display_config;
pub mod frame;
pub mod graph;
pub mod layer;
pub mod metric;
pub mod scene;
pub mod text;

// Re-export commonly used types at the crate root for convenience
pub use background::{BackgroundLayer, ForegroundLayer, ScaleMode};
pub use color::{Color, ColorParseError};
pub use display_config::{DisplayConfig, MIN_REFRESH_INTERVAL_MS};
pub use frame::{Frame, FrameSizeError};
pub use graph::{fill_fraction, BarGraphLayer, BarOrientation, CircularGraphLayer};
pub use layer::{DateFormat, DateLayer, Layer, MetricLayer, Position, TextLayer, TimeLayer};
pub use metric::{MetricKind, MetricSample, MetricsSnapshot};
pub use scene::{Rotation, Scene};
pub use text::{
    GradientConfig, GradientDirection, OutlineConfig, ShadowConfig, TextAlignment, TextStyle,
};
