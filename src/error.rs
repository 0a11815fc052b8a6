//! # Error Types
//!
//! Custom error types for MSP Override using `thiserror`.

use thiserror::Error;

/// Main error type for MSP Override
#[derive(Debug, Error)]
pub enum MspError {
    /// MSP protocol errors (malformed or unusable replies)
    #[error("MSP protocol error: {0}")]
    Protocol(String),

    /// Payload does not fit the length field of the selected wire format
    #[error("Payload of {len} bytes exceeds MSPv{version} limit of {max}")]
    PayloadTooLarge { version: u8, len: usize, max: usize },

    /// Reading from the transport failed
    #[error("Transport read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    /// The transport reported end of stream
    #[error("Transport closed by peer (end of stream)")]
    TransportClosed,

    /// Writing to the transport failed
    #[error("Transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    /// The background reader ended without reporting a transport error
    #[error("Frame reader stopped: {0}")]
    ReaderStopped(String),

    /// Device string or device construction errors
    #[error("Device error: {0}")]
    Device(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// None of the candidate serial devices exist
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MspError {
    /// Whether this error means the link to the flight controller is gone.
    ///
    /// Transport loss is terminal for the protocol engine; the binary exits
    /// with a distinguished status for this class.
    pub fn is_transport_loss(&self) -> bool {
        matches!(
            self,
            MspError::TransportRead(_)
                | MspError::TransportClosed
                | MspError::TransportWrite(_)
                | MspError::ReaderStopped(_)
        )
    }
}

/// Result type alias for MSP Override
pub type Result<T> = std::result::Result<T, MspError>;
