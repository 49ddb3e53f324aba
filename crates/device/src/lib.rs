//! lcd-sens-device: panel profiles, frame encoding and USB transports.
//!
//! A [`DeviceProfile`] describes one panel model. [`FrameEncoder`] turns a
//! rendered [`lcd_sens_types::Frame`] into the model's packet stream and
//! [`DeviceTransport`] writes those packets, in order, through a
//! [`DeviceBackend`]: HID reports (`hid` feature) or USB bulk transfers
//! (`usb` feature).

pub mod descriptor;
pub mod encoder;
pub mod encoding;
pub mod error;
#[cfg(feature = "hid")]
pub mod hid;
pub mod profile;
pub mod registry;
pub mod transport;
#[cfg(feature = "usb")]
pub mod usb;

pub use encoder::{EncodedFrame, FrameEncoder};
pub use encoding::{rgb565, PixelEncoding, PixelFormat, RasterEncoding, ScanOrder};
pub use error::{DeviceError, SinkError};
#[cfg(feature = "hid")]
pub use hid::HidBackend;
pub use profile::{DeviceProfile, HeaderMode, Padding, TransportKind};
pub use registry::{parse_device_id, DeviceRegistry};
pub use transport::{DeviceBackend, DeviceTransport, PacketSink};
#[cfg(feature = "usb")]
pub use usb::UsbBulkBackend;

/// Backend that dispatches on the profile's transport kind.
///
/// Backends whose feature is disabled, or whose library fails to
/// initialize, report every device as absent.
pub struct SystemBackend {
    #[cfg(feature = "hid")]
    hid: Option<HidBackend>,
    #[cfg(feature = "usb")]
    usb: Option<UsbBulkBackend>,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "hid")]
            hid: HidBackend::new()
                .map_err(|e| log::warn!("HID backend unavailable: {}", e))
                .ok(),
            #[cfg(feature = "usb")]
            usb: UsbBulkBackend::new()
                .map_err(|e| log::warn!("USB backend unavailable: {}", e))
                .ok(),
        }
    }

    /// Whether this build carries a driver for `kind`
    pub fn supports(kind: TransportKind) -> bool {
        match kind {
            TransportKind::Hid => cfg!(feature = "hid"),
            TransportKind::Bulk => cfg!(feature = "usb"),
        }
    }

    fn backend_for(&self, vendor_id: u16, product_id: u16) -> Option<&dyn DeviceBackend> {
        let kind = DeviceRegistry::builtin()
            .lookup(vendor_id, product_id)
            .map(|p| p.transport)?;
        self.backend(kind)
    }

    fn backend(&self, kind: TransportKind) -> Option<&dyn DeviceBackend> {
        match kind {
            #[cfg(feature = "hid")]
            TransportKind::Hid => self.hid.as_ref().map(|b| b as &dyn DeviceBackend),
            #[cfg(feature = "usb")]
            TransportKind::Bulk => self.usb.as_ref().map(|b| b as &dyn DeviceBackend),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for SystemBackend {
    fn is_present(&self, vendor_id: u16, product_id: u16) -> bool {
        self.backend_for(vendor_id, product_id)
            .is_some_and(|b| b.is_present(vendor_id, product_id))
    }

    fn open(&self, profile: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError> {
        match self.backend(profile.transport) {
            Some(backend) => backend.open(profile),
            None => Err(DeviceError::Backend(format!(
                "{} support is not available in this build",
                profile.transport
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(all(feature = "hid", feature = "usb"))]
    fn test_default_build_drives_every_builtin_panel() {
        for profile in DeviceRegistry::builtin().profiles() {
            assert!(
                SystemBackend::supports(profile.transport),
                "{} needs {} support",
                profile.id(),
                profile.transport
            );
        }
    }
}
