//! Device profile definitions
//!
//! A profile holds every per-model constant needed to turn a frame into the
//! packet stream a panel accepts: geometry, packet size, report id, header
//! and pixel encoding. Profiles are built once and never mutated.

use std::fmt;
use std::sync::Arc;

use crate::encoding::PixelEncoding;
use crate::error::DeviceError;

/// How the frame header travels relative to the pixel stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// Prepended to the pixel bytes before chunking
    Inline,
    /// Sent as its own packet ahead of the pixel chunks
    Separate,
}

/// How a stream that does not fill the last packet is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Right-pad the final packet with zeros
    ZeroFill,
    /// The stream must divide evenly into packets
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Hid,
    Bulk,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Hid => write!(f, "HID"),
            TransportKind::Bulk => write!(f, "USB bulk"),
        }
    }
}

/// Immutable per-model panel description
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub panel_width: u32,
    pub panel_height: u32,
    /// Payload bytes per packet, excluding the report id
    pub transfer_size: usize,
    /// HID report id prefixed to every packet; `None` for bulk devices
    pub report_id: Option<u8>,
    pub header: Vec<u8>,
    pub header_mode: HeaderMode,
    pub padding: Padding,
    /// End each frame with a zero-length packet
    pub commit_marker: bool,
    /// Header sent once when the stream is closed
    pub end_of_stream: Option<Vec<u8>>,
    pub transport: TransportKind,
    pub encoding: Arc<dyn PixelEncoding>,
}

impl DeviceProfile {
    /// `VID:PID` in the usual lowercase hex form
    pub fn id(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.panel_width, self.panel_height)
    }

    pub fn pixel_stream_len(&self) -> usize {
        self.encoding.stream_len(self.panel_width, self.panel_height)
    }

    /// Bytes that get chunked into fixed-size packets
    pub fn chunked_len(&self) -> usize {
        match self.header_mode {
            HeaderMode::Inline => self.header.len() + self.pixel_stream_len(),
            HeaderMode::Separate => self.pixel_stream_len(),
        }
    }

    /// Wire length of each packet, report id included
    pub fn packet_len(&self) -> usize {
        self.transfer_size + usize::from(self.report_id.is_some())
    }

    /// Number of packets per frame, header and commit marker included
    pub fn packets_per_frame(&self) -> usize {
        let chunks = self.chunked_len().div_ceil(self.transfer_size.max(1));
        let header = usize::from(self.header_mode == HeaderMode::Separate);
        header + chunks + usize::from(self.commit_marker)
    }

    /// Check the packet math
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(DeviceError::EncodingInvariantViolation(format!(
                "{}: empty panel {}x{}",
                self.name, self.panel_width, self.panel_height
            )));
        }
        if self.transfer_size == 0 {
            return Err(DeviceError::EncodingInvariantViolation(format!(
                "{}: transfer size is zero",
                self.name
            )));
        }
        if self.header_mode == HeaderMode::Separate && self.header.len() > self.transfer_size {
            return Err(DeviceError::EncodingInvariantViolation(format!(
                "{}: {} byte header does not fit a {} byte packet",
                self.name,
                self.header.len(),
                self.transfer_size
            )));
        }
        let len = self.chunked_len();
        if self.padding == Padding::Exact && len % self.transfer_size != 0 {
            return Err(DeviceError::EncodingInvariantViolation(format!(
                "{}: {} byte stream is not a multiple of {}",
                self.name, len, self.transfer_size
            )));
        }
        Ok(())
    }
}
