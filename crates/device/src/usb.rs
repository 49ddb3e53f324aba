//! USB bulk transport (rusb)

use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;

use crate::error::{DeviceError, SinkError};
use crate::profile::DeviceProfile;
use crate::transport::{DeviceBackend, PacketSink};

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const VENDOR_SPECIFIC_CLASS: u8 = 0xFF;

/// Backend for panels that take frames over a bulk OUT endpoint
pub struct UsbBulkBackend {
    context: Context,
}

impl UsbBulkBackend {
    pub fn new() -> Result<Self, DeviceError> {
        let context =
            Context::new().map_err(|e| DeviceError::Backend(format!("libusb init: {}", e)))?;
        Ok(Self { context })
    }

    fn find(&self, vendor_id: u16, product_id: u16) -> Option<Device<Context>> {
        let devices = match self.context.devices() {
            Ok(devices) => devices,
            Err(e) => {
                log::debug!("Failed to list USB devices: {}", e);
                return None;
            }
        };
        devices.iter().find(|device| {
            device
                .device_descriptor()
                .map(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
                .unwrap_or(false)
        })
    }
}

/// First bulk OUT endpoint as `(interface, endpoint address)`, preferring
/// vendor-specific interfaces
fn find_bulk_out(device: &Device<Context>) -> Option<(u8, u8)> {
    let config = device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))
        .ok()?;

    let mut fallback = None;
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            let endpoint = desc.endpoint_descriptors().find(|ep| {
                ep.direction() == Direction::Out && ep.transfer_type() == TransferType::Bulk
            });
            let Some(endpoint) = endpoint else { continue };
            let found = (desc.interface_number(), endpoint.address());
            if desc.class_code() == VENDOR_SPECIFIC_CLASS {
                return Some(found);
            }
            fallback.get_or_insert(found);
        }
    }
    fallback
}

impl DeviceBackend for UsbBulkBackend {
    fn is_present(&self, vendor_id: u16, product_id: u16) -> bool {
        self.find(vendor_id, product_id).is_some()
    }

    fn open(&self, profile: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError> {
        let device = self
            .find(profile.vendor_id, profile.product_id)
            .ok_or(DeviceError::DeviceNotFound {
                vendor_id: profile.vendor_id,
                product_id: profile.product_id,
            })?;

        let (interface, endpoint) = find_bulk_out(&device).ok_or_else(|| {
            DeviceError::ProtocolMismatch(format!("{} has no bulk OUT endpoint", profile.id()))
        })?;

        let denied = |e: rusb::Error| match e {
            rusb::Error::Access => DeviceError::PermissionDenied {
                vendor_id: profile.vendor_id,
                product_id: profile.product_id,
                reason: e.to_string(),
            },
            other => DeviceError::Backend(format!("{}: {}", profile.id(), other)),
        };

        let mut handle = device.open().map_err(denied)?;
        if handle.kernel_driver_active(interface).unwrap_or(false) {
            if let Err(e) = handle.detach_kernel_driver(interface) {
                log::debug!("Could not detach kernel driver from {}: {}", profile.id(), e);
            }
        }
        handle.claim_interface(interface).map_err(denied)?;
        log::debug!(
            "Claimed interface {} of {}, bulk OUT endpoint {:#04x}",
            interface,
            profile.id(),
            endpoint
        );

        Ok(Box::new(BulkSink {
            handle,
            interface,
            endpoint,
        }))
    }
}

struct BulkSink {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint: u8,
}

impl PacketSink for BulkSink {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), SinkError> {
        let written = self
            .handle
            .write_bulk(self.endpoint, packet, WRITE_TIMEOUT)
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

    fn close(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            log::debug!("Failed to release interface {}: {}", self.interface, e);
        }
    }
}
