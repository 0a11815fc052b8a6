//! # Override / Poll Loop
//!
//! Repeats forever, once per interval:
//! 1. `SET_RAW_RC` with the override frame (only when overrides exist)
//! 2. `RC` to read back the channel values the FC is using
//! 3. the status query selected during the handshake
//!
//! Each request consumes exactly one frame. A frame for a different command is
//! logged as unsolicited and not decoded.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::MspClient;
use crate::error::Result;
use crate::msp::protocol::{command, Frame};
use crate::msp::rc::{decode_channels, encode_transmit_buffer, ChannelOverrides, TransmitBuffer};
use crate::msp::status::{StatusCommand, StatusSnapshot};
use crate::telemetry::Reporter;

/// Default delay between poll cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Results of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Override frame sent this cycle, all 18 slots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<Vec<u16>>,

    /// Channel values reported by the FC (at most 16)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx: Option<Vec<i16>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
}

/// Drives the periodic override and telemetry exchange
#[derive(Debug)]
pub struct OverrideLoop {
    client: MspClient,
    transmit: Option<(TransmitBuffer, Vec<u8>)>,
    status_command: StatusCommand,
    interval: Duration,
}

impl OverrideLoop {
    /// Build a loop over an identified client
    ///
    /// The override frame is built once; overrides do not change afterwards.
    pub fn new(
        client: MspClient,
        overrides: &ChannelOverrides,
        status_command: StatusCommand,
        interval: Duration,
    ) -> Self {
        let transmit = if overrides.is_empty() {
            None
        } else {
            let buffer = overrides.transmit_buffer();
            Some((buffer, encode_transmit_buffer(&buffer)))
        };

        Self {
            client,
            transmit,
            status_command,
            interval,
        }
    }

    /// Run one request/reply cycle
    ///
    /// # Errors
    ///
    /// Only transport failures are returned; bad or unexpected replies are
    /// logged and leave the matching report field empty.
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        let mut report = PollReport::default();

        if let Some((buffer, payload)) = &self.transmit {
            self.client.send(command::SET_RAW_RC, payload).await?;
            let ack = self.client.receive().await?;
            check_reply(&ack, command::SET_RAW_RC);
            report.tx = Some(buffer.to_vec());
        }

        self.client.send(command::RC, &[]).await?;
        let frame = self.client.receive().await?;
        if check_reply(&frame, command::RC) {
            report.rx = Some(decode_channels(&frame.payload));
        }

        let status_id = self.status_command.command_id();
        self.client.send(status_id, &[]).await?;
        let frame = self.client.receive().await?;
        if check_reply(&frame, status_id) && frame.is_response {
            match self.status_command.decode(&frame.payload) {
                Ok(status) => report.status = Some(status),
                Err(e) => warn!("{}", e),
            }
        }

        Ok(report)
    }

    /// Poll until the transport fails, reporting every cycle
    ///
    /// Never returns `Ok`; the error is the reason the link was lost.
    pub async fn run(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        debug!(
            "Polling every {:?} with {:?} on {}",
            self.interval,
            self.status_command,
            self.client.description()
        );

        loop {
            let report = self.poll_once().await?;
            reporter.report(&report);
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Check that a reply answers the request it was read for
fn check_reply(frame: &Frame, expected: u16) -> bool {
    if frame.command == expected {
        return true;
    }
    warn!(
        "Unsolicited frame: command {} ({} bytes) while waiting for {}",
        frame.command,
        frame.payload.len(),
        expected
    );
    false
}
