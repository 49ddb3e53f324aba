//! Render errors

use lcd_sens_types::FrameSizeError;
use thiserror::Error;

/// Frame-level rendering failure.
///
/// Problems confined to a single layer (missing image, absent metric) never
/// surface here; the layer is skipped and the frame still renders.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("cairo error: {0}")]
    Cairo(#[from] cairo::Error),

    #[error("cannot access surface pixels: {0}")]
    SurfaceAccess(#[from] cairo::BorrowError),

    #[error(transparent)]
    Frame(#[from] FrameSizeError),

    #[error("failed to write PNG: {0}")]
    Png(#[from] cairo::IoError),
}
