//! # Status Queries
//!
//! Selection of the status command for a firmware and decoding of the armed
//! bit and arming-disable flags from its reply.

use std::fmt;

use serde::Serialize;

use super::protocol::command;
use crate::error::{MspError, Result};

/// API versions above this support `STATUS_EX`
pub const STATUS_EX_MIN_API_EXCLUSIVE: u16 = 0x0200;

/// Firmware from this version on supports `INAV_STATUS2`
pub const INAV_STATUS2_MIN_FC_VERSION: u32 = 0x01_08_01;

/// Armed-flag threshold below which arming flags are not worth showing
const ARMED_FLAGS_NOTEWORTHY_ABOVE: u32 = 12;

/// Status command flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCommand {
    /// Legacy `STATUS` (101)
    Status,
    /// `STATUS_EX` (150)
    StatusEx,
    /// `INAV_STATUS2` (0x2000), MSPv2 only
    InavStatus2,
}

impl StatusCommand {
    /// Choose the richest status command the controller understands
    ///
    /// # Examples
    ///
    /// ```
    /// use msp_override::msp::status::StatusCommand;
    ///
    /// assert_eq!(StatusCommand::select(0x0201, 0x010900), StatusCommand::InavStatus2);
    /// assert_eq!(StatusCommand::select(0x0100, 0x010900), StatusCommand::Status);
    /// ```
    pub fn select(api_version: u16, fc_version: u32) -> Self {
        if api_version > STATUS_EX_MIN_API_EXCLUSIVE {
            if fc_version >= INAV_STATUS2_MIN_FC_VERSION {
                StatusCommand::InavStatus2
            } else {
                StatusCommand::StatusEx
            }
        } else {
            StatusCommand::Status
        }
    }

    /// Command id on the wire
    pub fn command_id(self) -> u16 {
        match self {
            StatusCommand::Status => command::STATUS,
            StatusCommand::StatusEx => command::STATUS_EX,
            StatusCommand::InavStatus2 => command::INAV_STATUS2,
        }
    }

    /// Decode the armed bit and arming-disable flags from a reply payload
    ///
    /// Offsets (all little-endian):
    ///
    /// | Command | Status word | Arming flags |
    /// |---------|-------------|--------------|
    /// | `STATUS` | u32 @ 6 | u32 @ 9 |
    /// | `STATUS_EX` | u32 @ 6 | u16 @ 13 |
    /// | `INAV_STATUS2` | u64 @ 13 | u32 @ 9 |
    ///
    /// # Errors
    ///
    /// Returns error if the payload is too short for the command's layout.
    pub fn decode(self, payload: &[u8]) -> Result<StatusSnapshot> {
        let status_word = match self {
            StatusCommand::InavStatus2 => read_u64(payload, 13)?,
            StatusCommand::Status | StatusCommand::StatusEx => read_u32(payload, 6)? as u64,
        };

        let arm_disable_flags = match self {
            StatusCommand::StatusEx => read_u16(payload, 13)? as u32,
            StatusCommand::Status | StatusCommand::InavStatus2 => read_u32(payload, 9)?,
        };

        Ok(StatusSnapshot {
            armed: status_word & 1 == 1,
            arm_disable_flags,
            command: self,
        })
    }
}

/// Armed state derived from one status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub armed: bool,
    pub arm_disable_flags: u32,
    pub command: StatusCommand,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.armed {
            write!(f, "armed")?;
            if self.arm_disable_flags > ARMED_FLAGS_NOTEWORTHY_ABOVE {
                write!(f, " ({:x})", self.arm_disable_flags)?;
            }
            Ok(())
        } else if self.command == StatusCommand::Status {
            write!(f, "unarmed")
        } else {
            write!(f, "unarmed ({:x})", self.arm_disable_flags)
        }
    }
}

fn field<const N: usize>(payload: &[u8], offset: usize) -> Result<[u8; N]> {
    payload
        .get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            MspError::Protocol(format!(
                "Status reply too short: {} bytes, need {}",
                payload.len(),
                offset + N
            ))
        })
}

fn read_u16(payload: &[u8], offset: usize) -> Result<u16> {
    field(payload, offset).map(u16::from_le_bytes)
}

fn read_u32(payload: &[u8], offset: usize) -> Result<u32> {
    field(payload, offset).map(u32::from_le_bytes)
}

fn read_u64(payload: &[u8], offset: usize) -> Result<u64> {
    field(payload, offset).map(u64::from_le_bytes)
}
