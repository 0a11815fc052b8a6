//! # MSP Client
//!
//! Request/response session with a flight controller.
//!
//! This module handles:
//! - Spawning the background frame reader on the transport's read half
//! - Encoding and writing requests on the write half
//! - Receiving frames through the single-slot hand-off channel
//! - The identification handshake and the override/poll loop
//!
//! # Example
//!
//! ```no_run
//! use msp_override::client::MspClient;
//! use msp_override::transport::{self, DeviceDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let descriptor = DeviceDescriptor::parse("tcp://localhost:5761", 115_200)?;
//!     let mut client = MspClient::start(transport::open(&descriptor).await?);
//!     let identity = client.handshake().await?;
//!     println!("{}", identity);
//!     Ok(())
//! }
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::{MspError, Result};
use crate::msp::encoder::encode_request;
use crate::msp::protocol::Frame;
use crate::transport::{Transport, TransportWrite};

pub mod handshake;
pub mod override_loop;
pub mod reader;

pub use handshake::FcIdentity;
pub use override_loop::{OverrideLoop, PollReport};

/// Frames the reader may hold before it must wait for the consumer
pub const FRAME_CHANNEL_CAPACITY: usize = 1;

/// A live session with a flight controller
pub struct MspClient {
    writer: Box<dyn TransportWrite>,
    frames: mpsc::Receiver<Frame>,
    reader: Option<JoinHandle<MspError>>,
    uses_v2: bool,
    description: String,
}

impl std::fmt::Debug for MspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MspClient")
            .field("description", &self.description)
            .field("uses_v2", &self.uses_v2)
            .finish_non_exhaustive()
    }
}

impl MspClient {
    /// Take ownership of a transport and start the background reader
    ///
    /// Must be called within a tokio runtime. Requests are sent as MSPv1
    /// until the handshake reports an API version that supports MSPv2.
    pub fn start(transport: Transport) -> Self {
        let description = transport.description().to_string();
        let (reader, writer) = transport.into_parts();
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let handle = tokio::spawn(reader::run_reader(reader, tx));

        Self {
            writer,
            frames: rx,
            reader: Some(handle),
            uses_v2: false,
            description,
        }
    }

    /// Whether requests are framed as MSPv2
    pub fn uses_v2(&self) -> bool {
        self.uses_v2
    }

    /// Name of the underlying link
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Send a request with the negotiated framing
    ///
    /// # Errors
    ///
    /// Returns [`MspError::TransportWrite`] if the link rejects the write, or
    /// [`MspError::PayloadTooLarge`] if the payload does not fit the frame.
    pub async fn send(&mut self, command: u16, payload: &[u8]) -> Result<()> {
        let frame = encode_request(command, payload, self.uses_v2)?;
        trace!("Sending command {} ({} bytes on the wire)", command, frame.len());

        self.writer
            .write_all(&frame)
            .await
            .map_err(MspError::TransportWrite)?;
        self.writer.flush().await.map_err(MspError::TransportWrite)?;

        Ok(())
    }

    /// Wait for the next frame from the reader
    ///
    /// # Errors
    ///
    /// Once the reader has stopped, returns the error that stopped it
    /// (transport loss). Later calls report [`MspError::ReaderStopped`].
    pub async fn receive(&mut self) -> Result<Frame> {
        match self.frames.recv().await {
            Some(frame) => Ok(frame),
            None => Err(self.reader_failure().await),
        }
    }

    /// Send a request and wait for the reply carrying the same command id
    ///
    /// Frames for other commands are logged and discarded.
    pub async fn request(&mut self, command: u16, payload: &[u8]) -> Result<Frame> {
        self.send(command, payload).await?;

        loop {
            let frame = self.receive().await?;
            if frame.command == command {
                return Ok(frame);
            }
            warn!(
                "Unsolicited frame: command {} ({} bytes) while waiting for {}",
                frame.command,
                frame.payload.len(),
                command
            );
        }
    }

    async fn reader_failure(&mut self) -> MspError {
        match self.reader.take() {
            Some(handle) => match handle.await {
                Ok(error) => error,
                Err(e) => MspError::ReaderStopped(format!("frame reader task failed: {}", e)),
            },
            None => MspError::ReaderStopped("frame reader already stopped".to_string()),
        }
    }
}

impl Drop for MspClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use crate::msp::encoder::{encode_frame, encode_request};
    use crate::msp::protocol::{command, Direction, ProtocolVariant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

    /// Scripted flight controller on the far end of a duplex pipe
    pub struct FakeFc {
        read: ReadHalf<DuplexStream>,
        write: WriteHalf<DuplexStream>,
        pub variant: ProtocolVariant,
    }

    impl FakeFc {
        pub fn new(stream: DuplexStream) -> Self {
            let (read, write) = tokio::io::split(stream);
            Self {
                read,
                write,
                variant: ProtocolVariant::V1,
            }
        }

        /// Read exactly the bytes of the expected request
        pub async fn expect(&mut self, command: u16, payload: &[u8], uses_v2: bool) {
            let expected = encode_request(command, payload, uses_v2).unwrap();
            let mut actual = vec![0u8; expected.len()];
            self.read.read_exact(&mut actual).await.unwrap();
            assert_eq!(actual, expected.to_vec(), "request for command {}", command);
        }

        pub async fn reply(&mut self, command: u16, payload: &[u8]) {
            let frame = encode_frame(self.variant, Direction::Response, command, payload).unwrap();
            self.write.write_all(&frame).await.unwrap();
        }

        /// Answer the full handshake as an INAV 1.9.0 board with API 2.1
        pub async fn identify(&mut self) {
            self.expect(command::API_VERSION, &[], false).await;
            self.reply(command::API_VERSION, &[0, 2, 1]).await;
            self.variant = ProtocolVariant::V2;

            self.expect(command::FC_VARIANT, &[], true).await;
            self.reply(command::FC_VARIANT, b"INAV").await;

            self.expect(command::FC_VERSION, &[], true).await;
            self.reply(command::FC_VERSION, &[1, 9, 0]).await;

            self.expect(command::BUILD_INFO, &[], true).await;
            self.reply(command::BUILD_INFO, b"Jan 01 202012:00:00abcdef0").await;

            self.expect(command::BOARD_INFO, &[], true).await;
            self.reply(command::BOARD_INFO, b"MTKS\x00\x00\x00\x02\x0dMATEKF405")
                .await;

            self.expect(command::NAME, &[], true).await;
            self.reply(command::NAME, b"copter").await;
        }
    }
}
