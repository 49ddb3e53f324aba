//! Ordered packet delivery to an open panel

use std::sync::{Mutex, MutexGuard};

use crate::encoder::{EncodedFrame, FrameEncoder};
use crate::error::{DeviceError, SinkError};
use crate::profile::DeviceProfile;

/// Open handle that accepts whole packets
pub trait PacketSink: Send {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), SinkError>;

    /// Release the handle. Called at most once.
    fn close(&mut self) {}
}

/// USB stack abstraction: enumeration and opening
pub trait DeviceBackend: Send + Sync {
    fn is_present(&self, vendor_id: u16, product_id: u16) -> bool;

    /// Open the panel described by `profile`. Implementations report
    /// `PermissionDenied` when the handle cannot be opened and
    /// `ProtocolMismatch` when the device does not match the profile framing.
    fn open(&self, profile: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError>;
}

/// Single-writer transport over an opened [`PacketSink`]
pub struct DeviceTransport {
    device: String,
    sink: Mutex<Option<Box<dyn PacketSink>>>,
    end_of_stream: Option<EncodedFrame>,
}

impl DeviceTransport {
    pub fn open(backend: &dyn DeviceBackend, profile: &DeviceProfile) -> Result<Self, DeviceError> {
        if !backend.is_present(profile.vendor_id, profile.product_id) {
            return Err(DeviceError::DeviceNotFound {
                vendor_id: profile.vendor_id,
                product_id: profile.product_id,
            });
        }
        let sink = backend.open(profile)?;
        log::info!("Opened {} ({}) over {}", profile.name, profile.id(), profile.transport);
        Ok(Self::from_sink(profile, sink))
    }

    /// Wrap an already opened sink
    pub fn from_sink(profile: &DeviceProfile, sink: Box<dyn PacketSink>) -> Self {
        let end_of_stream = FrameEncoder::new(profile.clone())
            .ok()
            .and_then(|encoder| encoder.end_of_stream());
        Self {
            device: format!("{} ({})", profile.name, profile.id()),
            sink: Mutex::new(Some(sink)),
            end_of_stream,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn PacketSink>>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write every packet of `frame` in order.
    ///
    /// Stops at the first failing packet; later packets are never attempted.
    pub fn send(&self, frame: &EncodedFrame) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(DeviceError::TransportClosed)?;
        for (index, packet) in frame.packets().iter().enumerate() {
            sink.write_packet(packet)
                .map_err(|e| DeviceError::TransportWriteFailed {
                    index,
                    reason: e.to_string(),
                })?;
        }
        log::trace!("Sent {} packets to {}", frame.len(), self.device);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Send the end-of-stream marker (if any) and release the device.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let Some(mut sink) = self.lock().take() else {
            return;
        };
        if let Some(eos) = &self.end_of_stream {
            for packet in eos.packets() {
                if let Err(e) = sink.write_packet(packet) {
                    log::debug!("End of stream to {} failed: {}", self.device, e);
                    break;
                }
            }
        }
        sink.close();
        log::info!("Closed {}", self.device);
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;
    use std::sync::{Arc, Mutex};

    /// Records packets; fails the write at `fail_at` if set
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub written: Arc<Mutex<Vec<Vec<u8>>>>,
        pub attempts: Arc<Mutex<usize>>,
        pub closed: Arc<Mutex<usize>>,
        pub fail_at: Option<usize>,
    }

    impl PacketSink for RecordingSink {
        fn write_packet(&mut self, packet: &[u8]) -> Result<(), SinkError> {
            let mut attempts = self.attempts.lock().unwrap();
            let index = *attempts;
            *attempts += 1;
            if Some(index) == self.fail_at {
                return Err(SinkError::new("pipe error"));
            }
            self.written.lock().unwrap().push(packet.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    fn profile() -> DeviceProfile {
        DeviceRegistry::builtin().lookup(0x0418, 0x5304).unwrap().clone()
    }

    fn bulk_profile() -> DeviceProfile {
        DeviceRegistry::builtin().lookup(0x87AD, 0x70DB).unwrap().clone()
    }

    fn five_packets() -> EncodedFrame {
        EncodedFrame::new((0u8..5).map(|i| vec![i; 4]).collect())
    }

    #[test]
    fn test_failure_at_packet_three_stops_the_frame() {
        let sink = RecordingSink {
            fail_at: Some(3),
            ..Default::default()
        };
        let transport = DeviceTransport::from_sink(&profile(), Box::new(sink.clone()));

        match transport.send(&five_packets()) {
            Err(DeviceError::TransportWriteFailed { index, .. }) => assert_eq!(index, 3),
            other => panic!("unexpected {:?}", other),
        }
        let written = sink.written.lock().unwrap();
        assert_eq!(*written, vec![vec![0u8; 4], vec![1; 4], vec![2; 4]]);
        // Packet 4 was never attempted
        assert_eq!(*sink.attempts.lock().unwrap(), 4);
    }

    #[test]
    fn test_packets_written_in_order() {
        let sink = RecordingSink::default();
        let transport = DeviceTransport::from_sink(&profile(), Box::new(sink.clone()));
        transport.send(&five_packets()).unwrap();
        assert_eq!(*sink.written.lock().unwrap(), five_packets().packets());
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_sends() {
        let sink = RecordingSink::default();
        let transport = DeviceTransport::from_sink(&profile(), Box::new(sink.clone()));
        transport.close();
        transport.close();
        drop(transport);
        assert_eq!(*sink.closed.lock().unwrap(), 1);
        // HID panels have no end-of-stream marker
        assert!(sink.written.lock().unwrap().is_empty());

        let transport = DeviceTransport::from_sink(&profile(), Box::new(RecordingSink::default()));
        transport.close();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.send(&five_packets()),
            Err(DeviceError::TransportClosed)
        ));
    }

    #[test]
    fn test_bulk_close_sends_end_of_stream() {
        let sink = RecordingSink::default();
        let transport = DeviceTransport::from_sink(&bulk_profile(), Box::new(sink.clone()));
        transport.close();
        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(&written[0][0..4], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&written[0][0x3C..0x40], &[0, 0, 0, 0]);
        assert!(written[1].is_empty());
    }

    struct Absent;

    impl DeviceBackend for Absent {
        fn is_present(&self, _: u16, _: u16) -> bool {
            false
        }

        fn open(&self, _: &DeviceProfile) -> Result<Box<dyn PacketSink>, DeviceError> {
            unreachable!("open must not be called for an absent device")
        }
    }

    #[test]
    fn test_open_absent_device() {
        assert!(matches!(
            DeviceTransport::open(&Absent, &profile()),
            Err(DeviceError::DeviceNotFound {
                vendor_id: 0x0418,
                product_id: 0x5304
            })
        ));
    }
}
