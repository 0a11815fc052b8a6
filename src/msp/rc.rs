//! # RC Channel Payloads
//!
//! Serialization of channel overrides for `SET_RAW_RC` and decoding of the
//! `RC` reply.

use std::collections::BTreeMap;

/// Number of channel slots sent with `SET_RAW_RC`
pub const RC_OVERRIDE_SLOTS: usize = 18;

/// Value sent for channels that are not overridden
pub const RC_UNSET_VALUE: u16 = 1759;

/// Maximum number of channel values decoded from an `RC` reply
pub const RC_MAX_DECODED_CHANNELS: usize = 16;

/// Fixed channel frame for `SET_RAW_RC`; slot `i` is channel `i + 1`
pub type TransmitBuffer = [u16; RC_OVERRIDE_SLOTS];

/// Channel overrides keyed by 1-based channel number
///
/// Built once from user input and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOverrides {
    values: BTreeMap<usize, u16>,
}

impl ChannelOverrides {
    /// Create an empty override map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set channel `channel` (1-based) to `value`
    ///
    /// Returns `false` if the channel is outside the transmitted slots.
    pub fn insert(&mut self, channel: usize, value: u16) -> bool {
        if !(1..=RC_OVERRIDE_SLOTS).contains(&channel) {
            return false;
        }
        self.values.insert(channel, value);
        true
    }

    /// Override for a channel, if any
    pub fn get(&self, channel: usize) -> Option<u16> {
        self.values.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate `(channel, value)` pairs in channel order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.values.iter().map(|(&c, &v)| (c, v))
    }

    /// Expand to the full transmit buffer, unset channels at [`RC_UNSET_VALUE`]
    pub fn transmit_buffer(&self) -> TransmitBuffer {
        let mut buffer = [RC_UNSET_VALUE; RC_OVERRIDE_SLOTS];
        for (channel, value) in self.iter() {
            buffer[channel - 1] = value;
        }
        buffer
    }
}

/// Serialize a transmit buffer as little-endian 16-bit values (36 bytes)
pub fn encode_transmit_buffer(buffer: &TransmitBuffer) -> Vec<u8> {
    buffer.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Decode an `RC` reply into signed channel values
///
/// One value per two bytes, at most [`RC_MAX_DECODED_CHANNELS`]; a trailing odd
/// byte is ignored.
pub fn decode_channels(payload: &[u8]) -> Vec<i16> {
    payload
        .chunks_exact(2)
        .take(RC_MAX_DECODED_CHANNELS)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_serialization() {
        let mut overrides = ChannelOverrides::new();
        assert!(overrides.insert(5, 1200));

        let payload = encode_transmit_buffer(&overrides.transmit_buffer());
        assert_eq!(payload.len(), RC_OVERRIDE_SLOTS * 2);

        for slot in 0..RC_OVERRIDE_SLOTS {
            let value = u16::from_le_bytes([payload[slot * 2], payload[slot * 2 + 1]]);
            if slot == 4 {
                assert_eq!(value, 1200, "channel 5 should carry the override");
            } else {
                assert_eq!(value, RC_UNSET_VALUE, "slot {} should be unset", slot);
            }
        }
        assert_eq!(&payload[8..10], &[0xB0, 0x04]);
    }

    #[test]
    fn test_empty_overrides_are_all_unset() {
        let overrides = ChannelOverrides::new();
        assert!(overrides.is_empty());
        assert_eq!(overrides.transmit_buffer(), [RC_UNSET_VALUE; RC_OVERRIDE_SLOTS]);
    }

    #[test]
    fn test_insert_rejects_out_of_range_channels() {
        let mut overrides = ChannelOverrides::new();
        assert!(!overrides.insert(0, 1500));
        assert!(!overrides.insert(19, 1500));
        assert!(overrides.insert(1, 1000));
        assert!(overrides.insert(18, 2000));
        assert_eq!(overrides.len(), 2);

        let buffer = overrides.transmit_buffer();
        assert_eq!(buffer[0], 1000);
        assert_eq!(buffer[17], 2000);
    }

    #[test]
    fn test_later_insert_replaces_value() {
        let mut overrides = ChannelOverrides::new();
        overrides.insert(3, 1100);
        overrides.insert(3, 1900);
        assert_eq!(overrides.get(3), Some(1900));
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn test_decode_channels() {
        let payload = [0xDC, 0x05, 0xE8, 0x03, 0xFF, 0xFF];
        assert_eq!(decode_channels(&payload), vec![1500, 1000, -1]);
    }

    #[test]
    fn test_decode_channels_caps_and_ignores_odd_byte() {
        let payload = vec![0x10u8; 40];
        let channels = decode_channels(&payload);
        assert_eq!(channels.len(), RC_MAX_DECODED_CHANNELS);
        assert!(channels.iter().all(|&v| v == 0x1010));

        assert_eq!(decode_channels(&[0x01, 0x00, 0x07]), vec![1]);
        assert!(decode_channels(&[]).is_empty());
    }
}
