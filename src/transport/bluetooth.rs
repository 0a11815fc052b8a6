//! # Bluetooth Transport
//!
//! RFCOMM serial-port-profile links (e.g. HC-05/HC-06 modules on a flight
//! controller UART). Linux only, through BlueZ.

use crate::error::{MspError, Result};

use super::Transport;

/// RFCOMM channel used by serial port profile modules
pub const RFCOMM_CHANNEL: u8 = 1;

/// Parse `xx:xx:xx:xx:xx:xx` into address bytes, most significant first
pub fn parse_bdaddr(address: &str) -> Result<[u8; 6]> {
    let mut bdaddr = [0u8; 6];
    let mut parts = address.split(':');

    for slot in bdaddr.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| MspError::Device(format!("invalid Bluetooth address {}", address)))?;
        *slot = u8::from_str_radix(part, 16)
            .map_err(|_| MspError::Device(format!("invalid Bluetooth address {}", address)))?;
    }

    if parts.next().is_some() {
        return Err(MspError::Device(format!("invalid Bluetooth address {}", address)));
    }

    Ok(bdaddr)
}

/// Connect to a Bluetooth device over RFCOMM
///
/// The stream is driven by the tokio reactor, so dropping the transport
/// releases the socket even while a read is pending.
#[cfg(target_os = "linux")]
pub async fn connect(address: &str) -> Result<Transport> {
    use bluer::rfcomm::{SocketAddr, Stream};
    use bluer::Address;
    use tracing::info;

    let target = SocketAddr::new(Address::new(parse_bdaddr(address)?), RFCOMM_CHANNEL);

    let stream = Stream::connect(target)
        .await
        .map_err(|e| MspError::Device(format!("Failed to connect to {}: {}", address, e)))?;
    info!("Connected to Bluetooth device {}", address);

    Ok(Transport::from_stream(stream, format!("bt://{}", address)))
}

/// Connect to a Bluetooth device over RFCOMM
#[cfg(not(target_os = "linux"))]
pub async fn connect(address: &str) -> Result<Transport> {
    parse_bdaddr(address)?;
    Err(MspError::Device(format!(
        "Bluetooth devices are not supported on this platform ({})",
        address
    )))
}
