//! # Frame Checksums
//!
//! MSPv1 frames carry an XOR checksum, MSPv2 frames carry CRC-8-DVB-S2.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00, MSB first, no reflection

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Precomputed CRC8 lookup table for fast calculation
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Fold one byte into a running CRC8-DVB-S2 value
///
/// Used by the frame parser, which sees bytes one at a time.
#[inline]
pub fn crc8_dvb_s2_update(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Calculate CRC8-DVB-S2 checksum over a byte slice
///
/// # Arguments
///
/// * `data` - MSPv2 checksummed region (flags + command + length + payload)
///
/// # Examples
///
/// ```
/// use msp_override::msp::crc::crc8_dvb_s2;
///
/// assert_eq!(crc8_dvb_s2(b"123456789"), 0xBC);
/// ```
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| crc8_dvb_s2_update(crc, byte))
}

/// Calculate the MSPv1 XOR checksum (length + command + payload)
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &byte| acc ^ byte)
}

/// Calculate CRC8-DVB-S2 checksum using direct algorithm (slow, for verification)
#[cfg(test)]
fn crc8_dvb_s2_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8_dvb_s2(&[]), 0x00);
    }

    #[test]
    fn test_crc8_single_byte() {
        assert_eq!(crc8_dvb_s2(&[0x00]), 0x00);

        let data = [0xFF];
        let crc = crc8_dvb_s2(&data);
        assert_eq!(crc, crc8_dvb_s2_slow(&data));
        assert_ne!(crc, 0x00);
    }

    #[test]
    fn test_crc8_check_value() {
        // Catalogue check value for CRC-8/DVB-S2
        assert_eq!(crc8_dvb_s2(b"123456789"), 0xBC);
        assert_eq!(crc8_dvb_s2_slow(b"123456789"), 0xBC);
    }

    #[test]
    fn test_crc8_single_bit_inputs() {
        // A lone 0x01 shifts out as the polynomial itself
        assert_eq!(crc8_dvb_s2(&[0x01]), CRC8_POLY);
        assert_eq!(crc8_dvb_s2(&[0x80]), crc8_dvb_s2_slow(&[0x80]));
    }

    #[test]
    fn test_crc8_lookup_table_matches_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x00, 0x00, 0x20, 0x00, 0x00],
            vec![0x00; 24],
            vec![0xFF; 10],
            (0..=255u8).collect::<Vec<_>>(),
        ];

        for data in test_data.iter() {
            assert_eq!(
                crc8_dvb_s2(data),
                crc8_dvb_s2_slow(data),
                "CRC mismatch for data: {:?}",
                data
            );
        }
    }

    #[test]
    fn test_crc8_update_matches_slice() {
        let data = [0x00, 0x64, 0x00, 0x03, 0x00, 0x01, 0x02, 0x03];
        let running = data.iter().fold(0, |crc, &b| crc8_dvb_s2_update(crc, b));
        assert_eq!(running, crc8_dvb_s2(&data));
    }

    #[test]
    fn test_crc8_changes_with_data() {
        let crc1 = crc8_dvb_s2(&[0x00, 0x01, 0x00, 0x04]);
        let crc2 = crc8_dvb_s2(&[0x00, 0x01, 0x00, 0x05]);
        assert_ne!(crc1, crc2, "CRC should change when data changes");
    }

    #[test]
    fn test_xor_checksum() {
        assert_eq!(xor_checksum(&[]), 0);
        // API_VERSION request: length 0, command 1
        assert_eq!(xor_checksum(&[0x00, 0x01]), 0x01);
        assert_eq!(xor_checksum(&[0x03, 0x01, 0x00, 0x02, 0x04]), 0x03 ^ 0x01 ^ 0x02 ^ 0x04);
    }
}
