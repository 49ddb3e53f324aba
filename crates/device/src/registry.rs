//! Supported device table

use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::encoding::{PixelFormat, RasterEncoding, ScanOrder};
use crate::profile::{DeviceProfile, HeaderMode, Padding, TransportKind};
use crate::transport::DeviceBackend;

/// Registry of built-in device profiles
static BUILTIN: Lazy<DeviceRegistry> = Lazy::new(|| {
    DeviceRegistry::new(vec![
        square_hid_480(),
        wide_hid_320x240(),
        bulk_320x320(),
    ])
});

/// Lookup table of known panels, in detection priority order
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    profiles: Vec<DeviceProfile>,
}

impl DeviceRegistry {
    pub fn new(profiles: Vec<DeviceProfile>) -> Self {
        Self { profiles }
    }

    /// Every panel this build knows how to drive
    pub fn builtin() -> &'static DeviceRegistry {
        &BUILTIN
    }

    pub fn lookup(&self, vendor_id: u16, product_id: u16) -> Option<&DeviceProfile> {
        self.profiles
            .iter()
            .find(|p| p.vendor_id == vendor_id && p.product_id == product_id)
    }

    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }

    /// First known panel the backend reports as attached
    pub fn detect(&self, backend: &dyn DeviceBackend) -> Option<&DeviceProfile> {
        let found = self
            .profiles
            .iter()
            .find(|p| backend.is_present(p.vendor_id, p.product_id));
        match found {
            Some(p) => log::info!("Detected {} ({})", p.name, p.id()),
            None => log::debug!("No supported panel attached"),
        }
        found
    }
}

/// Parse a `VID:PID` pair written in hex (`0418:5304`, `0x87ad:0x70db`)
pub fn parse_device_id(s: &str) -> Option<(u16, u16)> {
    let (vid, pid) = s.trim().split_once(':')?;
    let hex = |part: &str| {
        let part = part.trim();
        let part = part
            .strip_prefix("0x")
            .or_else(|| part.strip_prefix("0X"))
            .unwrap_or(part);
        u16::from_str_radix(part, 16).ok()
    };
    Some((hex(vid)?, hex(pid)?))
}

fn hid_column_encoding() -> Arc<RasterEncoding> {
    Arc::new(
        RasterEncoding::new(PixelFormat::Rgb565Le, ScanOrder::ColumnsBottomUp)
            .with_column_terminator(),
    )
}

/// 480×480 round panel, HID
fn square_hid_480() -> DeviceProfile {
    let mut header = vec![0u8; 8];
    header[0..2].copy_from_slice(&[0x69, 0x88]);
    LittleEndian::write_u16_into(&[480, 480, 0], &mut header[2..8]);

    DeviceProfile {
        name: "Thermalright 480x480 HID panel",
        vendor_id: 0x0418,
        product_id: 0x5304,
        panel_width: 480,
        panel_height: 480,
        transfer_size: 512,
        report_id: Some(0x00),
        header,
        header_mode: HeaderMode::Inline,
        padding: Padding::ZeroFill,
        commit_marker: false,
        end_of_stream: None,
        transport: TransportKind::Hid,
        encoding: hid_column_encoding(),
    }
}

/// 320×240 panel, HID
fn wide_hid_320x240() -> DeviceProfile {
    let mut header = vec![0u8; 22];
    header[0..4].copy_from_slice(&[0xDA, 0xDB, 0xDC, 0xDD]);
    LittleEndian::write_u16_into(&[2, 1, 320, 240, 2, 0], &mut header[4..16]);
    LittleEndian::write_u32(&mut header[16..20], 320 * 240 * 2);
    LittleEndian::write_u16(&mut header[20..22], 0);

    DeviceProfile {
        name: "Winbond 320x240 HID panel",
        vendor_id: 0x0416,
        product_id: 0x5302,
        panel_width: 320,
        panel_height: 240,
        transfer_size: 512,
        report_id: Some(0x00),
        header,
        header_mode: HeaderMode::Inline,
        padding: Padding::ZeroFill,
        commit_marker: false,
        end_of_stream: None,
        transport: TransportKind::Hid,
        encoding: hid_column_encoding(),
    }
}

/// 64-byte bulk frame header
fn bulk_header(width: u32, height: u32, payload_len: u32) -> Vec<u8> {
    const CMD_FRAME: u32 = 3;
    const MODE_RGB565: u32 = 2;

    let mut header = vec![0u8; 64];
    header[0..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    LittleEndian::write_u32_into(&[CMD_FRAME, width, height], &mut header[4..16]);
    LittleEndian::write_u32_into(&[MODE_RGB565, payload_len], &mut header[0x38..0x40]);
    header
}

/// ChiZhu Tech 320×320 USB display, bulk
fn bulk_320x320() -> DeviceProfile {
    let (width, height) = (320, 320);
    DeviceProfile {
        name: "ChiZhu Tech 320x320 USB display",
        vendor_id: 0x87AD,
        product_id: 0x70DB,
        panel_width: width,
        panel_height: height,
        transfer_size: 512,
        report_id: None,
        header: bulk_header(width, height, width * height * 2),
        header_mode: HeaderMode::Separate,
        padding: Padding::Exact,
        commit_marker: true,
        end_of_stream: Some(bulk_header(width, height, 0)),
        transport: TransportKind::Bulk,
        encoding: Arc::new(RasterEncoding::new(PixelFormat::Rgb565Be, ScanOrder::RowMajor)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::transport::PacketSink;

    struct Present(Vec<(u16, u16)>);

    impl DeviceBackend for Present {
        fn is_present(&self, vendor_id: u16, product_id: u16) -> bool {
            self.0.contains(&(vendor_id, product_id))
        }

        fn open(&self, profile: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError> {
            Err(DeviceError::DeviceNotFound {
                vendor_id: profile.vendor_id,
                product_id: profile.product_id,
            })
        }
    }

    #[test]
    fn test_builtin_profiles_validate() {
        let registry = DeviceRegistry::builtin();
        assert_eq!(registry.profiles().len(), 3);
        for profile in registry.profiles() {
            profile.validate().unwrap();
        }
    }

    #[test]
    fn test_lookup() {
        let registry = DeviceRegistry::builtin();
        let p = registry.lookup(0x0418, 0x5304).unwrap();
        assert_eq!(p.dimensions(), (480, 480));
        assert_eq!(p.header, vec![0x69, 0x88, 0xE0, 0x01, 0xE0, 0x01, 0x00, 0x00]);
        assert!(registry.lookup(0x0418, 0x0000).is_none());
    }

    #[test]
    fn test_wide_hid_header_layout() {
        let p = DeviceRegistry::builtin().lookup(0x0416, 0x5302).unwrap();
        assert_eq!(
            p.header,
            vec![
                0xDA, 0xDB, 0xDC, 0xDD, // magic
                0x02, 0x00, 0x01, 0x00, // command, mode
                0x40, 0x01, 0xF0, 0x00, // 320 x 240
                0x02, 0x00, 0x00, 0x00, // format, reserved
                0x00, 0x58, 0x02, 0x00, // 153600 payload bytes
                0x00, 0x00,
            ]
        );

        let bulk = DeviceRegistry::builtin().lookup(0x87AD, 0x70DB).unwrap();
        assert_eq!(&bulk.header[0x3C..0x40], &204_800u32.to_le_bytes());
        assert_eq!(&bulk.end_of_stream.as_ref().unwrap()[0x3C..0x40], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_detect_returns_first_present() {
        let registry = DeviceRegistry::builtin();
        let backend = Present(vec![(0x87AD, 0x70DB), (0x0416, 0x5302)]);
        let p = registry.detect(&backend).unwrap();
        assert_eq!(p.id(), "0416:5302");
        assert!(registry.detect(&Present(vec![])).is_none());
    }

    #[test]
    fn test_parse_device_id() {
        assert_eq!(parse_device_id("0418:5304"), Some((0x0418, 0x5304)));
        assert_eq!(parse_device_id("0x87AD:0x70db"), Some((0x87AD, 0x70DB)));
        assert_eq!(parse_device_id("0418"), None);
        assert_eq!(parse_device_id("zz:5304"), None);
    }
}
