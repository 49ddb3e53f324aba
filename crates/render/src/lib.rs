//! lcd-sens-render: Cairo/Pango compositor for lcd-sens scenes.
//!
//! The only entry point most callers need is [`Compositor::render`], which
//! paints a [`lcd_sens_types::Scene`] into a [`lcd_sens_types::Frame`].

pub mod arc_display;
pub mod background;
pub mod bar_display;
pub mod compositor;
pub mod error;
pub mod pango_text;
pub mod render_cache;
pub mod text_renderer;

pub use compositor::{write_png, Compositor};
pub use error::RenderError;
pub use render_cache::ImageCache;
pub use text_renderer::{format_metric, format_value, resolve_text};
