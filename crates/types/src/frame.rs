//! Raster frame handed from the compositor to the device encoder

use std::fmt;
use thiserror::Error;

use crate::scene::Rotation;

/// `width × height` RGBA8 pixels, row-major, no padding between rows
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Pixel buffer length does not match the declared dimensions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{len} bytes cannot hold a {width}x{height} RGBA frame")]
pub struct FrameSizeError {
    pub width: u32,
    pub height: u32,
    pub len: usize,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Opaque black frame
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 255])
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * Self::BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameSizeError> {
        if data.len() != width as usize * height as usize * Self::BYTES_PER_PIXEL {
            return Err(FrameSizeError {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL
    }

    /// RGBA at `(x, y)`; panics when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let o = self.offset(x, y);
        [self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let o = self.offset(x, y);
        self.data[o..o + 4].copy_from_slice(&rgba);
    }

    /// Rotate clockwise. 90 and 270 swap width and height.
    pub fn rotated(&self, rotation: Rotation) -> Frame {
        if rotation == Rotation::Deg0 {
            return self.clone();
        }

        let (w, h) = (self.width, self.height);
        let (out_w, out_h) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
        let mut out = Frame::new(out_w, out_h);
        for y in 0..h {
            for x in 0..w {
                let (nx, ny) = match rotation {
                    Rotation::Deg0 => (x, y),
                    Rotation::Deg90 => (h - 1 - y, x),
                    Rotation::Deg180 => (w - 1 - x, h - 1 - y),
                    Rotation::Deg270 => (y, w - 1 - x),
                };
                out.set_pixel(nx, ny, self.pixel(x, y));
            }
        }
        out
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
