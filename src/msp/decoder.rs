//! # MSP Frame Parser
//!
//! Byte-at-a-time state machine that reassembles MSPv1 and MSPv2 frames from an
//! arbitrarily chunked byte stream.
//!
//! ```text
//! WaitStart -> WaitType -+- 'M' -> WaitDirection(V1) -> WaitLen -> WaitCmd ---------------------------+
//!                        |                                                                            |
//!                        +- 'X' -> WaitDirection(V2) -> WaitFlags -> WaitCmdLo -> WaitCmdHi           |
//!                                                      -> WaitLenLo -> WaitLenHi ---------------------+
//!                                                                                                     v
//!                                                     [CollectPayload] -> WaitChecksum -> WaitStart
//! ```
//!
//! Parser state persists between calls, so a frame split across any number of
//! transport reads is reassembled exactly as if it had arrived in one piece.

use bytes::Bytes;

use super::crc::crc8_dvb_s2_update;
use super::protocol::*;

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Scanning for `$`
    WaitStart,
    /// Expecting `M` or `X`
    WaitType,
    /// Expecting `>` or `!`
    WaitDirection(ProtocolVariant),
    /// MSPv1 length byte
    WaitLen,
    /// MSPv1 command byte
    WaitCmd,
    /// MSPv2 flags byte
    WaitFlags,
    /// MSPv2 command, low byte
    WaitCmdLo,
    /// MSPv2 command, high byte
    WaitCmdHi,
    /// MSPv2 length, low byte
    WaitLenLo,
    /// MSPv2 length, high byte
    WaitLenHi,
    /// Payload bytes until `length` have been collected
    CollectPayload,
    /// Trailing checksum byte
    WaitChecksum,
}

/// Result of feeding one byte that completed a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Checksum matched; the frame is ready for the consumer
    Frame(Frame),

    /// Checksum did not match; the frame has been discarded
    ChecksumMismatch {
        variant: ProtocolVariant,
        command: u16,
        expected: u8,
        received: u8,
    },
}

/// MSP frame parser
///
/// # Examples
///
/// ```
/// use msp_override::msp::decoder::{FrameParser, ParseEvent};
///
/// let mut parser = FrameParser::new();
/// let events = parser.feed(b"$M>\x00\x01\x01");
/// assert!(matches!(events.as_slice(), [ParseEvent::Frame(f)] if f.command == 1));
/// ```
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParserState,
    variant: ProtocolVariant,
    is_response: bool,
    length: u16,
    command: u16,
    checksum: u8,
    payload: Vec<u8>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser waiting for the start of a frame
    pub fn new() -> Self {
        Self {
            state: ParserState::WaitStart,
            variant: ProtocolVariant::V1,
            is_response: false,
            length: 0,
            command: 0,
            checksum: 0,
            payload: Vec::new(),
        }
    }

    /// Whether the parser is between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::WaitStart
    }

    /// Feed a chunk of bytes, collecting every completed frame or checksum failure
    pub fn feed(&mut self, data: &[u8]) -> Vec<ParseEvent> {
        data.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    /// Feed a single byte
    ///
    /// Returns `Some` when the byte was a checksum byte, whether or not it matched.
    pub fn push(&mut self, byte: u8) -> Option<ParseEvent> {
        match self.state {
            ParserState::WaitStart => {
                if byte == MSP_START_BYTE {
                    self.begin_frame();
                    self.state = ParserState::WaitType;
                }
            }
            ParserState::WaitType => {
                self.state = match byte {
                    MSP_V1_MARKER => ParserState::WaitDirection(ProtocolVariant::V1),
                    MSP_V2_MARKER => ParserState::WaitDirection(ProtocolVariant::V2),
                    _ => ParserState::WaitStart,
                };
            }
            ParserState::WaitDirection(variant) => {
                let accepted = if byte == Direction::Response.as_byte() {
                    self.is_response = true;
                    true
                } else {
                    byte == Direction::NoAck.as_byte()
                };

                self.variant = variant;
                self.state = match (accepted, variant) {
                    (false, _) => ParserState::WaitStart,
                    (true, ProtocolVariant::V1) => ParserState::WaitLen,
                    (true, ProtocolVariant::V2) => ParserState::WaitFlags,
                };
            }
            ParserState::WaitLen => {
                self.length = byte as u16;
                self.checksum = byte;
                self.state = ParserState::WaitCmd;
            }
            ParserState::WaitCmd => {
                self.command = byte as u16;
                self.accumulate(byte);
                self.state = self.after_header();
            }
            ParserState::WaitFlags => {
                self.checksum = crc8_dvb_s2_update(0, byte);
                self.state = ParserState::WaitCmdLo;
            }
            ParserState::WaitCmdLo => {
                self.accumulate(byte);
                self.command = byte as u16;
                self.state = ParserState::WaitCmdHi;
            }
            ParserState::WaitCmdHi => {
                self.accumulate(byte);
                self.command |= (byte as u16) << 8;
                self.state = ParserState::WaitLenLo;
            }
            ParserState::WaitLenLo => {
                self.accumulate(byte);
                self.length = byte as u16;
                self.state = ParserState::WaitLenHi;
            }
            ParserState::WaitLenHi => {
                self.accumulate(byte);
                self.length |= (byte as u16) << 8;
                self.state = self.after_header();
            }
            ParserState::CollectPayload => {
                self.accumulate(byte);
                self.payload.push(byte);
                if self.payload.len() == self.length as usize {
                    self.state = ParserState::WaitChecksum;
                }
            }
            ParserState::WaitChecksum => {
                self.state = ParserState::WaitStart;
                return Some(self.finish(byte));
            }
        }

        None
    }

    fn begin_frame(&mut self) {
        self.is_response = false;
        self.length = 0;
        self.command = 0;
        self.checksum = 0;
        self.payload = Vec::new();
    }

    /// Next state once length and command are known; empty payloads skip collection
    fn after_header(&mut self) -> ParserState {
        if self.length == 0 {
            ParserState::WaitChecksum
        } else {
            self.payload = Vec::with_capacity(self.length as usize);
            ParserState::CollectPayload
        }
    }

    fn accumulate(&mut self, byte: u8) {
        self.checksum = match self.variant {
            ProtocolVariant::V1 => self.checksum ^ byte,
            ProtocolVariant::V2 => crc8_dvb_s2_update(self.checksum, byte),
        };
    }

    fn finish(&mut self, received: u8) -> ParseEvent {
        let payload = std::mem::take(&mut self.payload);

        if received != self.checksum {
            return ParseEvent::ChecksumMismatch {
                variant: self.variant,
                command: self.command,
                expected: self.checksum,
                received,
            };
        }

        ParseEvent::Frame(Frame {
            is_response: self.is_response,
            variant: self.variant,
            command: self.command,
            payload: Bytes::from(payload),
        })
    }
}
