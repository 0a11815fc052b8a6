//! # MSP Protocol Constants and Types
//!
//! Core protocol definitions for MSP (MultiWii Serial Protocol) communication.

use bytes::Bytes;
use serde::Serialize;

/// Frame start byte (always `$`)
pub const MSP_START_BYTE: u8 = b'$';

/// Protocol marker for MSPv1 frames
pub const MSP_V1_MARKER: u8 = b'M';

/// Protocol marker for MSPv2 frames
pub const MSP_V2_MARKER: u8 = b'X';

/// Maximum MSPv1 payload size (8-bit length field)
pub const MSP_V1_MAX_PAYLOAD_SIZE: usize = 255;

/// Maximum MSPv2 payload size (16-bit length field)
pub const MSP_V2_MAX_PAYLOAD_SIZE: usize = 65_535;

/// Highest command id representable in an MSPv1 frame
pub const MSP_V1_MAX_COMMAND: u16 = 255;

/// Command ids used by the handshake and override loop.
pub mod command {
    pub const API_VERSION: u16 = 1;
    pub const FC_VARIANT: u16 = 2;
    pub const FC_VERSION: u16 = 3;
    pub const BOARD_INFO: u16 = 4;
    pub const BUILD_INFO: u16 = 5;
    pub const NAME: u16 = 10;
    pub const STATUS: u16 = 101;
    pub const RC: u16 = 105;
    pub const STATUS_EX: u16 = 150;
    pub const SET_RAW_RC: u16 = 200;
    pub const INAV_STATUS2: u16 = 0x2000;
}

/// Wire format of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolVariant {
    /// `$M` framing: 8-bit length and command, XOR checksum
    V1,
    /// `$X` framing: 16-bit length and command, CRC-8/DVB-S2 checksum
    V2,
}

impl ProtocolVariant {
    /// Pick the wire format for an outgoing command.
    ///
    /// Commands above 255 cannot be expressed in MSPv1 and always use MSPv2.
    pub fn for_command(command: u16, uses_v2: bool) -> Self {
        if uses_v2 || command > MSP_V1_MAX_COMMAND {
            ProtocolVariant::V2
        } else {
            ProtocolVariant::V1
        }
    }

    /// Header marker byte following `$`
    pub fn marker(self) -> u8 {
        match self {
            ProtocolVariant::V1 => MSP_V1_MARKER,
            ProtocolVariant::V2 => MSP_V2_MARKER,
        }
    }

    /// Largest payload the length field can carry
    pub fn max_payload(self) -> usize {
        match self {
            ProtocolVariant::V1 => MSP_V1_MAX_PAYLOAD_SIZE,
            ProtocolVariant::V2 => MSP_V2_MAX_PAYLOAD_SIZE,
        }
    }

    /// Protocol generation number, for messages
    pub fn version(self) -> u8 {
        match self {
            ProtocolVariant::V1 => 1,
            ProtocolVariant::V2 => 2,
        }
    }
}

/// Direction byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<` host to flight controller
    Request,
    /// `>` flight controller reply
    Response,
    /// `!` frame that expects no acknowledgement
    NoAck,
}

impl Direction {
    /// Wire byte for this direction
    pub fn as_byte(self) -> u8 {
        match self {
            Direction::Request => b'<',
            Direction::Response => b'>',
            Direction::NoAck => b'!',
        }
    }
}

/// A complete, checksum-validated MSP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Set when the direction byte was `>`
    pub is_response: bool,

    /// Wire format the frame arrived in
    pub variant: ProtocolVariant,

    /// Command id
    pub command: u16,

    /// Payload data; its length always equals the frame's length field
    pub payload: Bytes,
}

impl Frame {
    /// Payload length as carried in the length field
    pub fn length(&self) -> u16 {
        self.payload.len() as u16
    }
}
