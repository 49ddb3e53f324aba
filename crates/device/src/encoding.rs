//! Pixel encodings: how RGBA frames become panel pixel streams

use lcd_sens_types::Frame;
use std::fmt;

/// Strategy turning a frame into the panel's raw pixel bytes
pub trait PixelEncoding: fmt::Debug + Send + Sync {
    fn bytes_per_pixel(&self) -> usize;

    /// Length of the pixel stream for a `width × height` frame
    fn stream_len(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }

    /// Append the encoded pixels of `frame` to `out`
    fn encode(&self, frame: &Frame, out: &mut Vec<u8>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit 5-6-5, low byte first
    Rgb565Le,
    /// 16-bit 5-6-5, high byte first
    Rgb565Be,
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565Le | PixelFormat::Rgb565Be => 2,
            PixelFormat::Rgb888 => 3,
        }
    }

    fn push(self, [r, g, b, _]: [u8; 4], out: &mut Vec<u8>) {
        match self {
            PixelFormat::Rgb565Le => out.extend_from_slice(&rgb565(r, g, b).to_le_bytes()),
            PixelFormat::Rgb565Be => out.extend_from_slice(&rgb565(r, g, b).to_be_bytes()),
            PixelFormat::Rgb888 => out.extend_from_slice(&[r, g, b]),
        }
    }

    fn push_blank(self, out: &mut Vec<u8>) {
        out.extend(std::iter::repeat(0u8).take(self.bytes_per_pixel()));
    }
}

/// Pack 8-bit channels into RGB565 by truncation
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Rows top to bottom, pixels left to right
    RowMajor,
    /// Columns left to right, each column from the bottom row up
    ColumnsBottomUp,
}

/// Fixed-format raster encoding covering every shipped panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterEncoding {
    pub format: PixelFormat,
    pub scan: ScanOrder,
    /// Last slot of every scan line is sent as zeros instead of pixel data
    pub column_terminator: bool,
}

impl RasterEncoding {
    pub const fn new(format: PixelFormat, scan: ScanOrder) -> Self {
        Self {
            format,
            scan,
            column_terminator: false,
        }
    }

    pub const fn with_column_terminator(mut self) -> Self {
        self.column_terminator = true;
        self
    }
}

impl PixelEncoding for RasterEncoding {
    fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    fn encode(&self, frame: &Frame, out: &mut Vec<u8>) {
        let (width, height) = frame.dimensions();
        out.reserve(self.stream_len(width, height));

        match self.scan {
            ScanOrder::RowMajor => {
                for y in 0..height {
                    for x in 0..width {
                        if self.column_terminator && x == width - 1 {
                            self.format.push_blank(out);
                        } else {
                            self.format.push(frame.pixel(x, y), out);
                        }
                    }
                }
            }
            ScanOrder::ColumnsBottomUp => {
                for x in 0..width {
                    for y in (0..height).rev() {
                        // y == 0 is the last slot of the column
                        if self.column_terminator && y == 0 {
                            self.format.push_blank(out);
                        } else {
                            self.format.push(frame.pixel(x, y), out);
                        }
                    }
                }
            }
        }
    }
}

/// Inverse of [`RasterEncoding::encode`], for tests. Terminator slots decode
/// as black; 565 channels are expanded by bit replication.
#[cfg(test)]
pub(crate) fn decode(encoding: &RasterEncoding, data: &[u8], width: u32, height: u32) -> Frame {
    let bpp = encoding.bytes_per_pixel();
    let mut frame = Frame::new(width, height);
    let coords: Vec<(u32, u32)> = match encoding.scan {
        ScanOrder::RowMajor => (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .collect(),
        ScanOrder::ColumnsBottomUp => (0..width)
            .flat_map(|x| (0..height).rev().map(move |y| (x, y)))
            .collect(),
    };
    for ((x, y), px) in coords.into_iter().zip(data.chunks_exact(bpp)) {
        let rgba = match encoding.format {
            PixelFormat::Rgb888 => [px[0], px[1], px[2], 255],
            PixelFormat::Rgb565Le | PixelFormat::Rgb565Be => {
                let v = if encoding.format == PixelFormat::Rgb565Le {
                    u16::from_le_bytes([px[0], px[1]])
                } else {
                    u16::from_be_bytes([px[0], px[1]])
                };
                let r = ((v >> 11) & 0x1F) as u8;
                let g = ((v >> 5) & 0x3F) as u8;
                let b = (v & 0x1F) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
            }
        };
        frame.set_pixel(x, y, rgba);
    }
    frame
}
