//! # Background Frame Reader
//!
//! Pulls bytes from the transport, drives the frame parser and hands each
//! validated frame to the single consumer.

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::MspError;
use crate::msp::decoder::{FrameParser, ParseEvent};
use crate::msp::protocol::Frame;
use crate::transport::TransportRead;

/// Transport read buffer size
pub const READ_BUFFER_SIZE: usize = 1024;

/// Read frames until the transport fails or the consumer goes away
///
/// Frames are handed off one at a time in arrival order; with a capacity-1
/// channel the reader waits for the consumer to take each frame before the
/// next can be queued. Checksum failures are logged and dropped.
///
/// The transport is closed before returning. The returned error says why the
/// reader stopped; it never returns while the link is healthy.
pub async fn run_reader(mut reader: Box<dyn TransportRead>, frames: mpsc::Sender<Frame>) -> MspError {
    let mut parser = FrameParser::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    let error = 'read: loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break MspError::TransportClosed,
            Ok(n) => n,
            Err(e) => break MspError::TransportRead(e),
        };
        trace!("Read {} bytes from transport", n);

        for &byte in &buf[..n] {
            match parser.push(byte) {
                Some(ParseEvent::Frame(frame)) => {
                    debug!(
                        "Received MSPv{} frame: command {}, {} bytes",
                        frame.variant.version(),
                        frame.command,
                        frame.payload.len()
                    );
                    if frames.send(frame).await.is_err() {
                        break 'read MspError::ReaderStopped("frame consumer dropped".to_string());
                    }
                }
                Some(ParseEvent::ChecksumMismatch {
                    variant,
                    command,
                    expected,
                    received,
                }) => {
                    warn!(
                        "CRC error on MSPv{} command {}: expected 0x{:02X}, got 0x{:02X}",
                        variant.version(),
                        command,
                        expected,
                        received
                    );
                }
                None => {}
            }
        }
    };

    debug!("Frame reader stopping: {}", error);
    if let Err(e) = reader.close().await {
        debug!("Error closing transport: {}", e);
    }

    error
}
