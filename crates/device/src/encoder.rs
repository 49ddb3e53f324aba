//! Frame to packet stream encoding

use lcd_sens_types::Frame;

use crate::error::DeviceError;
use crate::profile::{DeviceProfile, HeaderMode};

/// Ordered packets making up one frame on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedFrame {
    packets: Vec<Vec<u8>>,
}

impl EncodedFrame {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets }
    }

    pub fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Encoder bound to one validated profile
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    profile: DeviceProfile,
}

impl FrameEncoder {
    pub fn new(profile: DeviceProfile) -> Result<Self, DeviceError> {
        profile.validate()?;
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn encode(&self, frame: &Frame) -> Result<EncodedFrame, DeviceError> {
        let p = &self.profile;
        if frame.dimensions() != p.dimensions() {
            return Err(DeviceError::ConfigMismatch {
                expected: p.dimensions(),
                actual: frame.dimensions(),
            });
        }

        let mut stream = Vec::with_capacity(p.chunked_len());
        if p.header_mode == HeaderMode::Inline {
            stream.extend_from_slice(&p.header);
        }
        p.encoding.encode(frame, &mut stream);

        let mut packets = Vec::with_capacity(p.packets_per_frame());
        if p.header_mode == HeaderMode::Separate {
            packets.push(self.packet(&p.header, false));
        }
        for chunk in stream.chunks(p.transfer_size) {
            packets.push(self.packet(chunk, true));
        }
        if p.commit_marker {
            packets.push(Vec::new());
        }

        log::trace!(
            "Encoded {}x{} frame for {} into {} packets",
            frame.width(),
            frame.height(),
            p.name,
            packets.len()
        );
        Ok(EncodedFrame::new(packets))
    }

    /// Packet carrying the end-of-stream header, if the profile has one
    pub fn end_of_stream(&self) -> Option<EncodedFrame> {
        let header = self.profile.end_of_stream.as_ref()?;
        let mut packets = vec![self.packet(header, false)];
        if self.profile.commit_marker {
            packets.push(Vec::new());
        }
        Some(EncodedFrame::new(packets))
    }

    /// Report-id prefixed packet; `pad` fills up to `transfer_size` with zeros
    fn packet(&self, payload: &[u8], pad: bool) -> Vec<u8> {
        let p = &self.profile;
        let mut packet = Vec::with_capacity(p.packet_len());
        if let Some(id) = p.report_id {
            packet.push(id);
        }
        packet.extend_from_slice(payload);
        if pad && payload.len() < p.transfer_size {
            packet.resize(packet.len() + p.transfer_size - payload.len(), 0);
        }
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;

    fn encoder_for(vid: u16, pid: u16) -> FrameEncoder {
        let profile = DeviceRegistry::builtin()
            .lookup(vid, pid)
            .cloned()
            .expect("builtin profile");
        FrameEncoder::new(profile).unwrap()
    }

    #[test]
    fn test_square_hid_panel_framing() {
        let encoder = encoder_for(0x0418, 0x5304);
        let encoded = encoder.encode(&Frame::new(480, 480)).unwrap();

        // 8 header bytes + 480*480*2 pixel bytes in 512 byte chunks
        assert_eq!(encoded.len(), 901);
        assert!(encoded.packets().iter().all(|p| p.len() == 513));
        assert!(encoded.packets().iter().all(|p| p[0] == 0x00));
        assert_eq!(
            &encoded.packets()[0][..9],
            &[0x00, 0x69, 0x88, 0xE0, 0x01, 0xE0, 0x01, 0x00, 0x00]
        );

        // Final chunk holds 8 stream bytes, then zero padding
        let stream_len = 8 + 480 * 480 * 2;
        assert_eq!(stream_len % 512, 8);
        let last = encoded.packets().last().unwrap();
        assert!(last[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wide_hid_panel_header() {
        let encoder = encoder_for(0x0416, 0x5302);
        let encoded = encoder.encode(&Frame::new(320, 240)).unwrap();
        assert_eq!(encoded.len(), (22 + 320 * 240 * 2usize).div_ceil(512));

        let expected_header: [u8; 22] = [
            0xDA, 0xDB, 0xDC, 0xDD, // magic
            0x02, 0x00, 0x01, 0x00, // 2, 1
            0x40, 0x01, 0xF0, 0x00, // 320, 240
            0x02, 0x00, 0x00, 0x00, // 2, 0
            0x00, 0x58, 0x02, 0x00, // 153600
            0x00, 0x00, // 0
        ];
        assert_eq!(&encoded.packets()[0][1..23], &expected_header);
    }

    #[test]
    fn test_first_pixels_follow_header() {
        let encoder = encoder_for(0x0418, 0x5304);
        let mut frame = Frame::new(480, 480);
        // Bottom-left pixel is the first one on the wire
        frame.set_pixel(0, 479, [255, 0, 0, 255]);
        frame.set_pixel(0, 478, [0, 0, 255, 255]);
        let encoded = encoder.encode(&frame).unwrap();
        assert_eq!(&encoded.packets()[0][9..13], &[0x00, 0xF8, 0x1F, 0x00]);
    }

    #[test]
    fn test_bulk_panel_framing() {
        let encoder = encoder_for(0x87AD, 0x70DB);
        let encoded = encoder.encode(&Frame::filled(320, 320, [255, 255, 255, 255])).unwrap();

        // Header, 400 payload chunks, zero-length commit
        assert_eq!(encoded.len(), 402);
        let header = &encoded.packets()[0];
        assert_eq!(header.len(), 64);
        assert_eq!(&header[0..4], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&header[4..8], &3u32.to_le_bytes());
        assert_eq!(&header[8..12], &320u32.to_le_bytes());
        assert_eq!(&header[12..16], &320u32.to_le_bytes());
        assert_eq!(&header[0x38..0x3C], &2u32.to_le_bytes());
        assert_eq!(&header[0x3C..0x40], &204_800u32.to_le_bytes());
        assert!(header[16..0x38].iter().all(|&b| b == 0));

        assert!(encoded.packets()[1..401].iter().all(|p| p.len() == 512));
        assert!(encoded.packets()[1].iter().all(|&b| b == 0xFF));
        assert!(encoded.packets()[401].is_empty());
    }

    #[test]
    fn test_bulk_end_of_stream() {
        let encoder = encoder_for(0x87AD, 0x70DB);
        let eos = encoder.end_of_stream().unwrap();
        assert_eq!(eos.len(), 2);
        assert_eq!(&eos.packets()[0][0x3C..0x40], &[0, 0, 0, 0]);
        assert!(eos.packets()[1].is_empty());

        assert!(encoder_for(0x0418, 0x5304).end_of_stream().is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let encoder = encoder_for(0x0416, 0x5302);
        match encoder.encode(&Frame::new(240, 320)) {
            Err(DeviceError::ConfigMismatch { expected, actual }) => {
                assert_eq!(expected, (320, 240));
                assert_eq!(actual, (240, 320));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_every_builtin_profile_matches_packet_math() {
        for profile in DeviceRegistry::builtin().profiles() {
            let encoder = FrameEncoder::new(profile.clone()).unwrap();
            let (w, h) = profile.dimensions();
            let encoded = encoder.encode(&Frame::new(w, h)).unwrap();
            assert_eq!(encoded.len(), profile.packets_per_frame(), "{}", profile.name);
        }
    }
}
