//! # Identification Handshake
//!
//! Queries the flight controller's identity and protocol capabilities.
//!
//! The sequence is fixed: API_VERSION, FC_VARIANT, FC_VERSION, BUILD_INFO,
//! BOARD_INFO, NAME. API_VERSION is always asked in MSPv1; its answer decides
//! whether the rest of the session uses MSPv2.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use super::MspClient;
use crate::error::{MspError, Result};
use crate::msp::protocol::command;
use crate::msp::status::StatusCommand;

/// API major version whose firmware speaks MSPv2
pub const MSPV2_API_MAJOR: u16 = 2;

/// Offset of the git revision in a BUILD_INFO reply (after date and time)
const BUILD_INFO_GITREV_OFFSET: usize = 19;

/// Offset of the board name in a long BOARD_INFO reply
const BOARD_INFO_NAME_OFFSET: usize = 9;

/// Length of the short identifiers in FC_VARIANT and BOARD_INFO
const IDENTIFIER_LEN: usize = 4;

/// Order in which identity is queried
pub const HANDSHAKE_SEQUENCE: [u16; 6] = [
    command::API_VERSION,
    command::FC_VARIANT,
    command::FC_VERSION,
    command::BUILD_INFO,
    command::BOARD_INFO,
    command::NAME,
];

/// Everything learned about the flight controller during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FcIdentity {
    /// `(major << 8) | minor`
    pub api_version: u16,

    /// Whether the session frames requests as MSPv2
    pub uses_v2: bool,

    /// `(major << 16) | (minor << 8) | patch`
    pub fc_version: u32,

    /// Firmware identifier, e.g. `INAV`
    pub variant: String,

    pub board: String,

    pub git_revision: String,

    /// Craft name; may be empty
    pub name: String,
}

impl FcIdentity {
    /// Status query this firmware understands
    pub fn status_command(&self) -> StatusCommand {
        StatusCommand::select(self.api_version, self.fc_version)
    }

    /// Firmware version as `major.minor.patch`
    pub fn version_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.fc_version >> 16,
            (self.fc_version >> 8) & 0xFF,
            self.fc_version & 0xFF
        )
    }

    /// API version as `major.minor`
    pub fn api_string(&self) -> String {
        format!("{}.{}", self.api_version >> 8, self.api_version & 0xFF)
    }

    /// Fold one handshake reply into the identity
    fn apply(&mut self, id: u16, payload: &[u8]) -> Result<()> {
        match id {
            command::API_VERSION => {
                self.api_version = parse_api_version(payload)?;
                self.uses_v2 = self.api_version >> 8 == MSPV2_API_MAJOR;
            }
            command::FC_VARIANT => self.variant = parse_identifier(payload),
            command::FC_VERSION => self.fc_version = parse_fc_version(payload)?,
            command::BUILD_INFO => self.git_revision = parse_git_revision(payload),
            command::BOARD_INFO => self.board = parse_board_name(payload),
            command::NAME => self.name = text(payload),
            other => debug!("Ignoring handshake reply for command {}", other),
        }
        Ok(())
    }
}

impl fmt::Display for FcIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{} {} ({}) API {}",
            self.variant,
            self.version_string(),
            self.board,
            self.git_revision,
            self.api_string()
        )
    }
}

impl MspClient {
    /// Run the identification handshake
    ///
    /// On success the client's framing is switched to match the API version
    /// and the identity summary is logged.
    ///
    /// # Errors
    ///
    /// Returns error on transport loss, or a [`MspError::Protocol`] error if
    /// a reply is too short to carry a required field.
    pub async fn handshake(&mut self) -> Result<FcIdentity> {
        let mut identity = FcIdentity::default();

        for id in HANDSHAKE_SEQUENCE {
            let frame = self.request(id, &[]).await?;
            identity.apply(id, &frame.payload)?;

            if id == command::API_VERSION {
                self.uses_v2 = identity.uses_v2;
                debug!(
                    "API {}: using MSPv{}",
                    identity.api_string(),
                    if self.uses_v2 { 2 } else { 1 }
                );
            }
        }

        info!("{}", identity);
        info!("Name: {}", identity.name);

        Ok(identity)
    }
}

/// `API_VERSION` reply: protocol version, then API major and minor
fn parse_api_version(payload: &[u8]) -> Result<u16> {
    match payload {
        [_, major, minor, ..] => Ok(u16::from_be_bytes([*major, *minor])),
        _ => Err(MspError::Protocol(format!(
            "API_VERSION reply too short: {} bytes",
            payload.len()
        ))),
    }
}

/// `FC_VERSION` reply: major, minor, patch
fn parse_fc_version(payload: &[u8]) -> Result<u32> {
    match payload {
        [major, minor, patch, ..] => Ok(u32::from_be_bytes([0, *major, *minor, *patch])),
        _ => Err(MspError::Protocol(format!(
            "FC_VERSION reply too short: {} bytes",
            payload.len()
        ))),
    }
}

fn parse_identifier(payload: &[u8]) -> String {
    text(&payload[..payload.len().min(IDENTIFIER_LEN)])
}

fn parse_git_revision(payload: &[u8]) -> String {
    payload
        .get(BUILD_INFO_GITREV_OFFSET..)
        .map(text)
        .unwrap_or_default()
}

fn parse_board_name(payload: &[u8]) -> String {
    match payload.get(BOARD_INFO_NAME_OFFSET..) {
        Some(name) => text(name),
        None => parse_identifier(payload),
    }
}

/// Firmware strings are ASCII, sometimes NUL padded
fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}
