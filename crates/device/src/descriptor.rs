//! Minimal HID report descriptor parser
//!
//! Only the items needed to size output reports are interpreted: Report
//! Size, Report Count, Report ID, Push/Pop and the Output main item.

use std::collections::BTreeMap;

const TYPE_MAIN: u8 = 0;
const TYPE_GLOBAL: u8 = 1;

const MAIN_OUTPUT: u8 = 0x9;

const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

const LONG_ITEM: u8 = 0xFE;

#[derive(Debug, Clone, Copy, Default)]
struct GlobalState {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Output report lengths in bytes, keyed by report id (0 when the
/// descriptor declares no ids). The report id byte is not counted.
pub fn output_report_lengths(descriptor: &[u8]) -> BTreeMap<u8, usize> {
    let mut bits: BTreeMap<u8, u64> = BTreeMap::new();
    let mut state = GlobalState::default();
    let mut stack = Vec::new();
    let mut i = 0;

    while i < descriptor.len() {
        let prefix = descriptor[i];
        if prefix == LONG_ITEM {
            // bDataSize, bLongItemTag, data
            let size = descriptor.get(i + 1).copied().unwrap_or(0) as usize;
            i += 3 + size;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let kind = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;
        let Some(data) = descriptor.get(i + 1..i + 1 + size) else {
            log::debug!("Truncated HID descriptor item at offset {}", i);
            break;
        };
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        match (kind, tag) {
            (TYPE_GLOBAL, GLOBAL_REPORT_SIZE) => state.report_size = value,
            (TYPE_GLOBAL, GLOBAL_REPORT_COUNT) => state.report_count = value,
            (TYPE_GLOBAL, GLOBAL_REPORT_ID) => state.report_id = value as u8,
            (TYPE_GLOBAL, GLOBAL_PUSH) => stack.push(state),
            (TYPE_GLOBAL, GLOBAL_POP) => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            (TYPE_MAIN, MAIN_OUTPUT) => {
                *bits.entry(state.report_id).or_default() +=
                    state.report_size as u64 * state.report_count as u64;
            }
            _ => {}
        }
        i += 1 + size;
    }

    bits.into_iter()
        .map(|(id, b)| (id, b.div_ceil(8) as usize))
        .collect()
}

/// Output report length for `report_id`, if the descriptor declares one
pub fn output_report_len(descriptor: &[u8], report_id: u8) -> Option<usize> {
    output_report_lengths(descriptor).get(&report_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Vendor page descriptor with 512 byte input and output reports
    const PANEL_DESCRIPTOR: &[u8] = &[
        0x06, 0x00, 0xFF, // Usage Page (Vendor 0xFF00)
        0x09, 0x01, // Usage (1)
        0xA1, 0x01, // Collection (Application)
        0x15, 0x00, // Logical Minimum (0)
        0x26, 0xFF, 0x00, // Logical Maximum (255)
        0x75, 0x08, // Report Size (8)
        0x96, 0x00, 0x02, // Report Count (512)
        0x09, 0x01, // Usage (1)
        0x81, 0x02, // Input (Data, Var, Abs)
        0x96, 0x00, 0x02, // Report Count (512)
        0x09, 0x01, // Usage (1)
        0x91, 0x02, // Output (Data, Var, Abs)
        0xC0, // End Collection
    ];

    #[test]
    fn test_single_output_report() {
        let lengths = output_report_lengths(PANEL_DESCRIPTOR);
        assert_eq!(lengths.len(), 1);
        assert_eq!(output_report_len(PANEL_DESCRIPTOR, 0), Some(512));
        assert_eq!(output_report_len(PANEL_DESCRIPTOR, 1), None);
    }

    #[test]
    fn test_report_ids_and_bit_fields() {
        let descriptor = [
            0x85, 0x01, // Report ID (1)
            0x75, 0x01, // Report Size (1)
            0x95, 0x05, // Report Count (5)
            0x91, 0x02, // Output
            0x75, 0x03, // Report Size (3)
            0x95, 0x01, // Report Count (1)
            0x91, 0x01, // Output (padding)
            0x85, 0x02, // Report ID (2)
            0x75, 0x08, // Report Size (8)
            0x95, 0x40, // Report Count (64)
            0x91, 0x02, // Output
        ];
        let lengths = output_report_lengths(&descriptor);
        assert_eq!(lengths.get(&1), Some(&1));
        assert_eq!(lengths.get(&2), Some(&64));
    }

    #[test]
    fn test_push_pop_restores_globals() {
        let descriptor = [
            0x75, 0x08, // Report Size (8)
            0x95, 0x04, // Report Count (4)
            0xA4, // Push
            0x95, 0x10, // Report Count (16)
            0xB4, // Pop
            0x91, 0x02, // Output: 4 bytes
        ];
        assert_eq!(output_report_len(&descriptor, 0), Some(4));
    }

    #[test]
    fn test_truncated_descriptor_is_tolerated() {
        let descriptor = [0x75, 0x08, 0x96, 0x00];
        assert!(output_report_lengths(&descriptor).is_empty());
    }
}
