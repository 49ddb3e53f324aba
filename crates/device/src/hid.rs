//! HID report transport (hidapi)

use hidapi::{HidApi, HidDevice};
use std::sync::Mutex;

use crate::descriptor::output_report_len;
use crate::error::{DeviceError, SinkError};
use crate::profile::DeviceProfile;
use crate::transport::{DeviceBackend, PacketSink};

/// Largest report descriptor hidapi hands out
const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// Backend for panels that take frames as HID output reports
pub struct HidBackend {
    api: Mutex<HidApi>,
}

impl HidBackend {
    pub fn new() -> Result<Self, DeviceError> {
        let api = HidApi::new().map_err(|e| DeviceError::Backend(format!("hidapi init: {}", e)))?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl DeviceBackend for HidBackend {
    fn is_present(&self, vendor_id: u16, product_id: u16) -> bool {
        let mut api = self.api.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = api.refresh_devices() {
            log::debug!("Failed to refresh HID device list: {}", e);
        }
        api.device_list()
            .any(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
    }

    fn open(&self, profile: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError> {
        let device = {
            let api = self.api.lock().unwrap_or_else(|p| p.into_inner());
            api.open(profile.vendor_id, profile.product_id)
                .map_err(|e| DeviceError::PermissionDenied {
                    vendor_id: profile.vendor_id,
                    product_id: profile.product_id,
                    reason: e.to_string(),
                })?
        };

        check_report_length(&device, profile)?;
        Ok(Box::new(HidSink { device }))
    }
}

/// Compare the device's output report length with the profile packet size
fn check_report_length(device: &HidDevice, profile: &DeviceProfile) -> Result<(), DeviceError> {
    let mut buf = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    let len = match device.get_report_descriptor(&mut buf) {
        Ok(len) => len,
        Err(e) => {
            // Some platforms cannot return descriptors; trust the profile
            log::debug!("No report descriptor for {}: {}", profile.id(), e);
            return Ok(());
        }
    };

    let report_id = profile.report_id.unwrap_or(0);
    match output_report_len(&buf[..len], report_id) {
        Some(report_len) if report_len == profile.transfer_size => Ok(()),
        Some(report_len) => Err(DeviceError::ProtocolMismatch(format!(
            "{} output report {} is {} bytes, expected {}",
            profile.id(),
            report_id,
            report_len,
            profile.transfer_size
        ))),
        None => {
            log::warn!(
                "{} declares no output report {}; sending anyway",
                profile.id(),
                report_id
            );
            Ok(())
        }
    }
}

struct HidSink {
    device: HidDevice,
}

impl PacketSink for HidSink {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), SinkError> {
        let written = self
            .device
            .write(packet)
            .map_err(|e| SinkError::new(e.to_string()))?;
        if written != packet.len() {
            return Err(SinkError::new(format!(
                "short write {}/{}",
                written,
                packet.len()
            )));
        }
        Ok(())
    }
}
