//! # Serial Transport
//!
//! Opens USB/UART serial links to a flight controller.
//!
//! This module handles:
//! - Opening the port as 8N1 with no flow control at the requested baud
//! - Auto-detecting a device from a list of common paths

use std::path::Path;

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use super::Transport;
use crate::error::{MspError, Result};

/// Default MSP baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (most flight controllers)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Find the first candidate device path that exists
///
/// # Errors
///
/// Returns [`MspError::SerialPortNotFound`] listing the paths tried.
pub fn detect_device<S: AsRef<str>>(paths: &[S]) -> Result<String> {
    for path in paths {
        let path = path.as_ref();
        debug!("Looking for serial device: {}", path);

        if Path::new(path).exists() {
            info!("Found serial device at {}", path);
            return Ok(path.to_string());
        }
    }

    Err(MspError::SerialPortNotFound(
        paths.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
    ))
}

/// Open a serial device as a transport
///
/// # Examples
///
/// ```no_run
/// use msp_override::transport::serial;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let transport = serial::open("/dev/ttyACM0", serial::DEFAULT_BAUD_RATE)?;
///     println!("Connected to: {}", transport.description());
///     Ok(())
/// }
/// ```
pub fn open(path: &str, baud_rate: u32) -> Result<Transport> {
    let port = open_port(path, baud_rate)?;
    info!("Opened serial device {} at {} baud", path, baud_rate);
    Ok(Transport::from_stream(port, format!("{}@{}", path, baud_rate)))
}

/// Open a specific serial port with MSP settings
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    if baud_rate == 0 {
        return Err(MspError::Serial(format!("Failed to open {}: baud rate is zero", path)));
    }

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| MspError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}
