//! # MSP Frame Encoder
//!
//! Encodes a command and payload into an MSPv1 or MSPv2 wire frame.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::{crc8_dvb_s2, xor_checksum};
use super::protocol::*;
use crate::error::{MspError, Result};

/// MSPv1 overhead: `$M` + direction + length + command + checksum
const V1_OVERHEAD: usize = 6;

/// MSPv2 overhead: `$X` + direction + flags + command(2) + length(2) + checksum
const V2_OVERHEAD: usize = 9;

/// Offset of the first checksummed byte in both formats
const CHECKSUM_START: usize = 3;

/// Encode an MSPv1 frame
///
/// Layout: `$ M dir len cmd payload[len] checksum`, checksum = XOR of
/// `len, cmd, payload...`.
///
/// # Errors
///
/// Returns error if the command id is above 255 or the payload is longer than
/// 255 bytes.
pub fn encode_v1(direction: Direction, command: u16, payload: &[u8]) -> Result<Bytes> {
    if command > MSP_V1_MAX_COMMAND {
        return Err(MspError::Protocol(format!(
            "Command {} does not fit an MSPv1 frame",
            command
        )));
    }
    if payload.len() > MSP_V1_MAX_PAYLOAD_SIZE {
        return Err(MspError::PayloadTooLarge {
            version: 1,
            len: payload.len(),
            max: MSP_V1_MAX_PAYLOAD_SIZE,
        });
    }

    let mut frame = BytesMut::with_capacity(V1_OVERHEAD + payload.len());
    frame.put_u8(MSP_START_BYTE);
    frame.put_u8(MSP_V1_MARKER);
    frame.put_u8(direction.as_byte());
    frame.put_u8(payload.len() as u8);
    frame.put_u8(command as u8);
    frame.put_slice(payload);

    let checksum = xor_checksum(&frame[CHECKSUM_START..]);
    frame.put_u8(checksum);

    Ok(frame.freeze())
}

/// Encode an MSPv2 frame
///
/// Layout: `$ X dir flags cmd_lo cmd_hi len_lo len_hi payload[len] crc`, crc =
/// CRC-8/DVB-S2 over everything from the flags byte up to the end of the
/// payload. Flags are always zero.
///
/// # Errors
///
/// Returns error if the payload is longer than 65535 bytes.
pub fn encode_v2(direction: Direction, command: u16, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MSP_V2_MAX_PAYLOAD_SIZE {
        return Err(MspError::PayloadTooLarge {
            version: 2,
            len: payload.len(),
            max: MSP_V2_MAX_PAYLOAD_SIZE,
        });
    }

    let mut frame = BytesMut::with_capacity(V2_OVERHEAD + payload.len());
    frame.put_u8(MSP_START_BYTE);
    frame.put_u8(MSP_V2_MARKER);
    frame.put_u8(direction.as_byte());
    frame.put_u8(0); // flags
    frame.put_u16_le(command);
    frame.put_u16_le(payload.len() as u16);
    frame.put_slice(payload);

    let crc = crc8_dvb_s2(&frame[CHECKSUM_START..]);
    frame.put_u8(crc);

    Ok(frame.freeze())
}

/// Encode a frame in the given wire format
pub fn encode_frame(
    variant: ProtocolVariant,
    direction: Direction,
    command: u16,
    payload: &[u8],
) -> Result<Bytes> {
    match variant {
        ProtocolVariant::V1 => encode_v1(direction, command, payload),
        ProtocolVariant::V2 => encode_v2(direction, command, payload),
    }
}

/// Encode a host request, choosing the wire format for the session
///
/// MSPv2 is used when the session negotiated it or when the command id does
/// not fit in MSPv1.
///
/// # Examples
///
/// ```
/// use msp_override::msp::encoder::encode_request;
/// use msp_override::msp::protocol::command;
///
/// let frame = encode_request(command::API_VERSION, &[], false).unwrap();
/// assert_eq!(&frame[..], b"$M<\x00\x01\x01");
/// ```
pub fn encode_request(command: u16, payload: &[u8], uses_v2: bool) -> Result<Bytes> {
    encode_frame(
        ProtocolVariant::for_command(command, uses_v2),
        Direction::Request,
        command,
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_v1_empty_request() {
        let frame = encode_v1(Direction::Request, command::API_VERSION, &[]).unwrap();
        assert_eq!(&frame[..], &[b'$', b'M', b'<', 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_encode_v1_with_payload() {
        let payload = [0xDC, 0x05, 0xE8, 0x03];
        let frame = encode_v1(Direction::Request, command::SET_RAW_RC, &payload).unwrap();

        assert_eq!(frame.len(), V1_OVERHEAD + payload.len());
        assert_eq!(&frame[..3], b"$M<");
        assert_eq!(frame[3], 4); // length
        assert_eq!(frame[4], 200); // command
        assert_eq!(&frame[5..9], &payload);
        assert_eq!(frame[9], 4 ^ 200 ^ 0xDC ^ 0x05 ^ 0xE8 ^ 0x03);
    }

    #[test]
    fn test_encode_v1_rejects_large_command() {
        let result = encode_v1(Direction::Request, command::INAV_STATUS2, &[]);
        assert!(matches!(result, Err(MspError::Protocol(_))));
    }

    #[test]
    fn test_encode_v1_rejects_large_payload() {
        let payload = vec![0u8; 256];
        match encode_v1(Direction::Request, command::NAME, &payload) {
            Err(MspError::PayloadTooLarge { version, len, max }) => {
                assert_eq!(version, 1);
                assert_eq!(len, 256);
                assert_eq!(max, 255);
            }
            other => panic!("Expected PayloadTooLarge, got: {:?}", other),
        }

        // 255 bytes is the largest v1 payload
        assert!(encode_v1(Direction::Request, command::NAME, &payload[..255]).is_ok());
    }

    #[test]
    fn test_encode_v2_structure() {
        let payload = [0x11, 0x22, 0x33];
        let frame = encode_v2(Direction::Request, 0x1234, &payload).unwrap();

        assert_eq!(frame.len(), V2_OVERHEAD + payload.len());
        assert_eq!(&frame[..3], b"$X<");
        assert_eq!(frame[3], 0); // flags
        assert_eq!(&frame[4..6], &[0x34, 0x12]); // command LE
        assert_eq!(&frame[6..8], &[0x03, 0x00]); // length LE
        assert_eq!(&frame[8..11], &payload);
        assert_eq!(frame[11], crc8_dvb_s2(&frame[3..11]));
    }

    #[test]
    fn test_encode_v2_large_payload() {
        let payload = vec![0xA5u8; 1000];
        let frame = encode_v2(Direction::Response, command::NAME, &payload).unwrap();
        assert_eq!(&frame[6..8], &1000u16.to_le_bytes());
        assert_eq!(frame.len(), V2_OVERHEAD + 1000);

        let too_big = vec![0u8; MSP_V2_MAX_PAYLOAD_SIZE + 1];
        assert!(encode_v2(Direction::Request, command::NAME, &too_big).is_err());
    }

    #[test]
    fn test_encode_request_selects_variant() {
        let v1 = encode_request(command::RC, &[], false).unwrap();
        assert_eq!(v1[1], MSP_V1_MARKER);

        let v2 = encode_request(command::RC, &[], true).unwrap();
        assert_eq!(v2[1], MSP_V2_MARKER);

        // INAV_STATUS2 is above 255 and must go out as v2 on a v1 session
        let forced = encode_request(command::INAV_STATUS2, &[], false).unwrap();
        assert_eq!(forced[1], MSP_V2_MARKER);
        assert_eq!(&forced[4..6], &[0x00, 0x20]);
    }

    #[test]
    fn test_encode_frame_response_direction() {
        let frame = encode_frame(ProtocolVariant::V1, Direction::Response, command::NAME, b"x").unwrap();
        assert_eq!(frame[2], b'>');

        let frame = encode_frame(ProtocolVariant::V2, Direction::NoAck, command::NAME, b"x").unwrap();
        assert_eq!(frame[2], b'!');
    }

    #[test]
    fn test_different_payload_different_checksum() {
        let frame1 = encode_v2(Direction::Request, command::SET_RAW_RC, &[1, 2]).unwrap();
        let frame2 = encode_v2(Direction::Request, command::SET_RAW_RC, &[1, 3]).unwrap();
        assert_ne!(frame1[frame1.len() - 1], frame2[frame2.len() - 1]);
    }
}
