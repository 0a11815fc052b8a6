//! # Transport Module
//!
//! Byte-stream links to the flight controller.
//!
//! This module handles:
//! - The read/write/close contract the protocol engine depends on
//! - Device string parsing (serial path, TCP/UDP URL, Bluetooth address)
//! - Serial, TCP, UDP and Bluetooth RFCOMM transports
//!
//! The read and write halves are separate objects: the background frame
//! reader owns the read half, the client owns the write half.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

pub mod bluetooth;
pub mod device;
pub mod net;
pub mod serial;

pub use device::{DeviceDescriptor, DeviceKind};

/// Read half of a transport
#[async_trait]
pub trait TransportRead: Send {
    /// Read available bytes into `buf`; `Ok(0)` means end of stream
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the link; reads after `close` are not expected
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write half of a transport
#[async_trait]
pub trait TransportWrite: Send {
    /// Write all data to the link
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Adapter from a tokio `AsyncRead` to [`TransportRead`]
pub struct IoReader<R> {
    inner: R,
}

impl<R> IoReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> TransportRead for IoReader<R> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).await
    }
}

/// Adapter from a tokio `AsyncWrite` to [`TransportWrite`]
pub struct IoWriter<W> {
    inner: W,
}

impl<W> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportWrite for IoWriter<W> {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}

/// An open link to a flight controller
pub struct Transport {
    reader: Box<dyn TransportRead>,
    writer: Box<dyn TransportWrite>,
    description: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build a transport from separate halves
    pub fn new(
        reader: Box<dyn TransportRead>,
        writer: Box<dyn TransportWrite>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            writer,
            description: description.into(),
        }
    }

    /// Build a transport from any bidirectional tokio stream
    ///
    /// # Examples
    ///
    /// ```
    /// use msp_override::transport::Transport;
    ///
    /// let (ours, _theirs) = tokio::io::duplex(64);
    /// let transport = Transport::from_stream(ours, "loopback");
    /// assert_eq!(transport.description(), "loopback");
    /// ```
    pub fn from_stream<S>(stream: S, description: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::new(
            Box::new(IoReader::new(read_half)),
            Box::new(IoWriter::new(write_half)),
            description,
        )
    }

    /// Human-readable name of the link, e.g. `/dev/ttyACM0@115200`
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Split into the read and write halves
    pub fn into_parts(self) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>) {
        (self.reader, self.writer)
    }
}

/// Turn a configured device string into a descriptor
///
/// An empty string selects the first existing serial port among
/// `fallback_paths`, opened at `baud_rate`.
///
/// # Errors
///
/// Returns error if the device string is invalid or no fallback port exists.
pub fn resolve_device<S: AsRef<str>>(
    device: &str,
    baud_rate: u32,
    fallback_paths: &[S],
) -> Result<DeviceDescriptor> {
    if device.trim().is_empty() {
        let path = serial::detect_device(fallback_paths)?;
        return Ok(DeviceDescriptor::serial(path, baud_rate));
    }
    DeviceDescriptor::parse(device, baud_rate)
}

/// Open the transport a device descriptor names
///
/// # Errors
///
/// Returns error if the device cannot be opened, resolved or connected.
pub async fn open(descriptor: &DeviceDescriptor) -> Result<Transport> {
    match descriptor.kind {
        DeviceKind::Serial => serial::open(&descriptor.primary_host, descriptor.primary_param),
        DeviceKind::Tcp => net::connect_tcp(&descriptor.primary_host, descriptor.primary_param).await,
        DeviceKind::Udp => net::open_udp(descriptor).await,
        DeviceKind::Bluetooth => bluetooth::connect(&descriptor.primary_host).await,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_stream_round_trip() {
        let (ours, theirs) = tokio::io::duplex(64);
        let (mut reader, mut writer) = Transport::from_stream(ours, "duplex").into_parts();
        let (mut their_read, mut their_write) = tokio::io::split(theirs);

        writer.write_all(b"$M<\x00\x01\x01").await.unwrap();
        writer.flush().await.unwrap();
        let mut received = [0u8; 6];
        their_read.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"$M<\x00\x01\x01");

        their_write.write_all(b"reply").await.unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"reply");
    }

    #[tokio::test]
    async fn test_end_of_stream_reads_zero() {
        let (ours, theirs) = tokio::io::duplex(64);
        let (mut reader, _writer) = Transport::from_stream(ours, "duplex").into_parts();
        drop(theirs);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert!(reader.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_reader_chunks() {
        let mock = tokio_test::io::Builder::new()
            .read(b"$M>")
            .read(b"\x00\x01\x01")
            .build();
        let mut reader = IoReader::new(mock);

        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_writer_records_and_fails() {
        let mock = mocks::MockWriter::new();
        let mut writer: Box<dyn TransportWrite> = Box::new(mock.clone());

        writer.write_all(&[1, 2, 3]).await.unwrap();
        assert_eq!(mock.get_written_data(), vec![vec![1, 2, 3]]);

        mock.set_write_error(io::ErrorKind::BrokenPipe);
        let err = writer.write_all(&[4]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_resolve_explicit_device() {
        let descriptor = resolve_device("tcp://localhost:5761", 115_200, &["/dev/ttyACM0"]).unwrap();
        assert_eq!(descriptor.kind, DeviceKind::Tcp);
        assert_eq!(descriptor.primary_param, 5761);
    }

    #[test]
    fn test_resolve_empty_device_uses_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ttyACM9");
        std::fs::write(&fake, b"").unwrap();
        let fake = fake.to_string_lossy().to_string();

        let descriptor = resolve_device("", 57_600, &["/dev/nonexistent0".to_string(), fake.clone()]).unwrap();
        assert_eq!(descriptor.kind, DeviceKind::Serial);
        assert_eq!(descriptor.primary_host, fake);
        assert_eq!(descriptor.primary_param, 57_600);
    }

    #[test]
    fn test_resolve_empty_device_without_ports() {
        assert!(matches!(
            resolve_device("", 115_200, &["/dev/nonexistent0"]),
            Err(crate::error::MspError::SerialPortNotFound(_))
        ));
    }

    #[test]
    fn test_transport_debug_shows_description() {
        let (ours, _theirs) = tokio::io::duplex(8);
        let transport = Transport::from_stream(ours, "tcp://fc:5761");
        let debug = format!("{:?}", transport);
        assert!(debug.contains("tcp://fc:5761"));
    }
}
