//! # Network Transports
//!
//! TCP and UDP links, typically to a SITL simulator or a WiFi/serial bridge.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{DeviceDescriptor, IoReader, IoWriter, Transport, TransportRead, TransportWrite};
use crate::error::{MspError, Result};

/// Format `host:port`, bracketing IPv6 literals
fn socket_address(host: &str, port: u32) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Connect to a TCP endpoint
pub async fn connect_tcp(host: &str, port: u32) -> Result<Transport> {
    let address = socket_address(host, port);

    let stream = TcpStream::connect(&address)
        .await
        .map_err(|e| MspError::Device(format!("Failed to connect to tcp://{}: {}", address, e)))?;
    stream.set_nodelay(true)?;
    info!("Connected to tcp://{}", address);

    let (read_half, write_half) = stream.into_split();
    Ok(Transport::new(
        Box::new(IoReader::new(read_half)),
        Box::new(IoWriter::new(write_half)),
        format!("tcp://{}", address),
    ))
}

/// Open a UDP link
///
/// With a remote address the socket is connected to it. Without one the socket
/// listens on the local port and replies to whichever peer sent last; writes
/// wait until a peer has been heard from.
pub async fn open_udp(descriptor: &DeviceDescriptor) -> Result<Transport> {
    let (local, remote) = if descriptor.secondary_param != 0 {
        (
            Some(socket_address(&descriptor.primary_host, descriptor.primary_param)),
            Some(socket_address(&descriptor.secondary_host, descriptor.secondary_param)),
        )
    } else if descriptor.primary_host.is_empty() {
        (Some(socket_address("", descriptor.primary_param)), None)
    } else {
        (None, Some(socket_address(&descriptor.primary_host, descriptor.primary_param)))
    };

    let bind = match local.as_deref() {
        Some(local) if local.starts_with(':') => format!("0.0.0.0{}", local),
        Some(local) => local.to_string(),
        None => "0.0.0.0:0".to_string(),
    };

    let socket = UdpSocket::bind(&bind)
        .await
        .map_err(|e| MspError::Device(format!("Failed to bind udp {}: {}", bind, e)))?;

    if let Some(remote) = &remote {
        socket
            .connect(remote)
            .await
            .map_err(|e| MspError::Device(format!("Failed to connect to udp://{}: {}", remote, e)))?;
        info!("UDP {} connected to {}", bind, remote);
    } else {
        info!("UDP listening on {}", bind);
    }

    let socket = Arc::new(socket);
    let connected = remote.is_some();
    let (peer_tx, peer_rx) = watch::channel(None);

    Ok(Transport::new(
        Box::new(UdpReader {
            socket: Arc::clone(&socket),
            connected,
            peer: peer_tx,
        }),
        Box::new(UdpWriter {
            socket,
            connected,
            peer: peer_rx,
        }),
        descriptor.to_string(),
    ))
}

/// Read half of a UDP link
struct UdpReader {
    socket: Arc<UdpSocket>,
    connected: bool,
    peer: watch::Sender<Option<SocketAddr>>,
}

#[async_trait]
impl TransportRead for UdpReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.connected {
            return self.socket.recv(buf).await;
        }

        let (n, from) = self.socket.recv_from(buf).await?;
        self.peer.send_if_modified(|peer| {
            if *peer == Some(from) {
                return false;
            }
            info!("UDP peer is now {}", from);
            *peer = Some(from);
            true
        });
        Ok(n)
    }
}

/// Write half of a UDP link
struct UdpWriter {
    socket: Arc<UdpSocket>,
    connected: bool,
    peer: watch::Receiver<Option<SocketAddr>>,
}

#[async_trait]
impl TransportWrite for UdpWriter {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let sent = if self.connected {
            self.socket.send(data).await?
        } else {
            if self.peer.borrow().is_none() {
                debug!("Waiting for a UDP peer before sending");
            }
            let peer = *self
                .peer
                .wait_for(Option::is_some)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "UDP reader closed"))?;
            let peer = peer.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no UDP peer"))?;
            self.socket.send_to(data, peer).await?
        };

        if sent != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("UDP datagram truncated: {} of {} bytes", sent, data.len()),
            ));
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
