//! # Device Strings
//!
//! Parses the `-d` device argument into a [`DeviceDescriptor`].
//!
//! | Form | Kind |
//! |------|------|
//! | `/dev/ttyACM0`, `/dev/ttyUSB0@57600`, `COM3` | Serial (`path[@baud]`) |
//! | `tcp://host:port` | TCP |
//! | `udp://host:port` | UDP to a remote |
//! | `udp://:port` | UDP listening on a local port |
//! | `udp://localhost:lport/rhost:rport` | UDP with local bind and remote |
//! | `udp://rhost:rport?bind=lport` | UDP with local bind and remote |
//! | `01:23:45:67:89:AB` | Bluetooth RFCOMM |

use std::fmt;

use crate::error::{MspError, Result};

/// Kind of link a device string names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Serial,
    Tcp,
    Udp,
    Bluetooth,
}

/// Parsed device string
///
/// For serial devices `primary_param` is the baud rate; for network devices the
/// params are ports, 0 meaning "not given". UDP uses the primary pair as the
/// local bind address when a secondary (remote) pair is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub primary_host: String,
    pub primary_param: u32,
    pub secondary_host: String,
    pub secondary_param: u32,
}

impl DeviceDescriptor {
    /// Descriptor for a serial device
    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            kind: DeviceKind::Serial,
            primary_host: path.into(),
            primary_param: baud_rate,
            secondary_host: String::new(),
            secondary_param: 0,
        }
    }

    fn network(kind: DeviceKind, primary: (String, u32), secondary: (String, u32)) -> Self {
        Self {
            kind,
            primary_host: primary.0,
            primary_param: primary.1,
            secondary_host: secondary.0,
            secondary_param: secondary.1,
        }
    }

    /// Parse a device string
    ///
    /// `default_baud` applies to serial devices given without `@baud`.
    ///
    /// # Errors
    ///
    /// Returns error for empty strings, unknown URL schemes, malformed ports or
    /// baud rates, and network devices without a usable address.
    ///
    /// # Examples
    ///
    /// ```
    /// use msp_override::transport::{DeviceDescriptor, DeviceKind};
    ///
    /// let dd = DeviceDescriptor::parse("tcp://localhost:5761", 115_200).unwrap();
    /// assert_eq!(dd.kind, DeviceKind::Tcp);
    /// assert_eq!(dd.primary_host, "localhost");
    /// assert_eq!(dd.primary_param, 5761);
    /// ```
    pub fn parse(spec: &str, default_baud: u32) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(MspError::Device("empty device string".to_string()));
        }

        if is_bluetooth_address(spec) {
            return Ok(Self::network(
                DeviceKind::Bluetooth,
                (spec.to_string(), 0),
                (String::new(), 0),
            ));
        }

        let Some((scheme, rest)) = spec.split_once("://") else {
            return parse_serial(spec, default_baud);
        };

        let kind = match scheme.to_ascii_lowercase().as_str() {
            "tcp" => DeviceKind::Tcp,
            "udp" => DeviceKind::Udp,
            other => {
                return Err(MspError::Device(format!(
                    "unsupported device scheme '{}' in {}",
                    other, spec
                )))
            }
        };

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));

        let descriptor = if let Some(query) = query {
            // `?bind=port`: the authority is the remote, bind is the local port
            let bind = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("bind="))
                .map(parse_port)
                .transpose()?
                .unwrap_or(0);
            Self::network(kind, (String::new(), bind), split_host(authority)?)
        } else if !path.is_empty() {
            Self::network(kind, split_host(authority)?, split_host(path)?)
        } else {
            Self::network(kind, split_host(authority)?, (String::new(), 0))
        };

        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        match self.kind {
            DeviceKind::Tcp if self.primary_host.is_empty() || self.primary_param == 0 => Err(
                MspError::Device(format!("TCP device needs host and port: {}", self)),
            ),
            DeviceKind::Udp if self.primary_param == 0 && self.secondary_param == 0 => Err(
                MspError::Device(format!("UDP device needs a port: {}", self)),
            ),
            _ => Ok(()),
        }
    }

    /// Whether a UDP descriptor names a remote peer up front
    pub fn has_remote(&self) -> bool {
        match self.kind {
            DeviceKind::Udp => self.secondary_param != 0 || !self.primary_host.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Serial => write!(f, "{}@{}", self.primary_host, self.primary_param),
            DeviceKind::Bluetooth => write!(f, "bt://{}", self.primary_host),
            DeviceKind::Tcp => write!(f, "tcp://{}:{}", self.primary_host, self.primary_param),
            DeviceKind::Udp if self.secondary_param != 0 => write!(
                f,
                "udp://{}:{}/{}:{}",
                self.primary_host, self.primary_param, self.secondary_host, self.secondary_param
            ),
            DeviceKind::Udp => write!(f, "udp://{}:{}", self.primary_host, self.primary_param),
        }
    }
}

fn parse_serial(spec: &str, default_baud: u32) -> Result<DeviceDescriptor> {
    let (path, baud) = match spec.split_once('@') {
        Some((path, baud)) => {
            let baud = baud
                .parse::<u32>()
                .map_err(|_| MspError::Device(format!("invalid baud rate '{}' in {}", baud, spec)))?;
            (path, baud)
        }
        None => (spec, default_baud),
    };

    if path.is_empty() {
        return Err(MspError::Device(format!("missing serial device path in {}", spec)));
    }

    Ok(DeviceDescriptor::serial(path, baud))
}

fn parse_port(port: &str) -> Result<u32> {
    port.parse::<u16>()
        .map(u32::from)
        .map_err(|_| MspError::Device(format!("invalid port '{}'", port)))
}

/// Split `host:port`, `[v6]:port`, `:port` or a bare host
fn split_host(authority: &str) -> Result<(String, u32)> {
    if authority.is_empty() {
        return Ok((String::new(), 0));
    }

    if let Some(v6) = authority.strip_prefix('[') {
        return match v6.split_once("]:") {
            Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
            None => Ok((v6.trim_end_matches(']').to_string(), 0)),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((authority.to_string(), 0)),
    }
}

/// `xx:xx:xx:xx:xx:xx` with hex digit pairs
pub fn is_bluetooth_address(spec: &str) -> bool {
    let bytes = spec.as_bytes();
    bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == b':'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_default_baud() {
        let dd = DeviceDescriptor::parse("/dev/ttyACM0", 115_200).unwrap();
        assert_eq!(dd, DeviceDescriptor::serial("/dev/ttyACM0", 115_200));
        assert_eq!(dd.to_string(), "/dev/ttyACM0@115200");
    }

    #[test]
    fn test_serial_explicit_baud() {
        let dd = DeviceDescriptor::parse("/dev/ttyUSB0@57600", 115_200).unwrap();
        assert_eq!(dd.kind, DeviceKind::Serial);
        assert_eq!(dd.primary_host, "/dev/ttyUSB0");
        assert_eq!(dd.primary_param, 57_600);

        let com = DeviceDescriptor::parse("COM3", 9600).unwrap();
        assert_eq!(com.primary_host, "COM3");
        assert_eq!(com.primary_param, 9600);
    }

    #[test]
    fn test_serial_bad_baud() {
        assert!(DeviceDescriptor::parse("/dev/ttyUSB0@fast", 115_200).is_err());
        assert!(DeviceDescriptor::parse("@115200", 115_200).is_err());
    }

    #[test]
    fn test_empty_is_error() {
        assert!(DeviceDescriptor::parse("", 115_200).is_err());
        assert!(DeviceDescriptor::parse("   ", 115_200).is_err());
    }

    #[test]
    fn test_bluetooth_address() {
        let dd = DeviceDescriptor::parse("00:1A:7d:DA:71:13", 115_200).unwrap();
        assert_eq!(dd.kind, DeviceKind::Bluetooth);
        assert_eq!(dd.primary_host, "00:1A:7d:DA:71:13");

        assert!(!is_bluetooth_address("00:1A:7D:DA:71"));
        assert!(!is_bluetooth_address("00-1A-7D-DA-71-13"));
        assert!(!is_bluetooth_address("0G:1A:7D:DA:71:13"));
    }

    #[test]
    fn test_tcp() {
        let dd = DeviceDescriptor::parse("tcp://192.168.4.1:5761", 115_200).unwrap();
        assert_eq!(dd.kind, DeviceKind::Tcp);
        assert_eq!(dd.primary_host, "192.168.4.1");
        assert_eq!(dd.primary_param, 5761);
        assert_eq!(dd.to_string(), "tcp://192.168.4.1:5761");

        let v6 = DeviceDescriptor::parse("tcp://[::1]:5761", 115_200).unwrap();
        assert_eq!(v6.primary_host, "::1");
        assert_eq!(v6.primary_param, 5761);
    }

    #[test]
    fn test_tcp_requires_port() {
        assert!(DeviceDescriptor::parse("tcp://localhost", 115_200).is_err());
        assert!(DeviceDescriptor::parse("tcp://localhost:notaport", 115_200).is_err());
        assert!(DeviceDescriptor::parse("tcp://:5761", 115_200).is_err());
    }

    #[test]
    fn test_udp_remote() {
        let dd = DeviceDescriptor::parse("udp://fc.local:14014", 115_200).unwrap();
        assert_eq!(dd.kind, DeviceKind::Udp);
        assert_eq!(dd.primary_host, "fc.local");
        assert_eq!(dd.primary_param, 14014);
        assert_eq!(dd.secondary_param, 0);
        assert!(dd.has_remote());
    }

    #[test]
    fn test_udp_listen() {
        let dd = DeviceDescriptor::parse("udp://:14014", 115_200).unwrap();
        assert_eq!(dd.primary_host, "");
        assert_eq!(dd.primary_param, 14014);
        assert!(!dd.has_remote());
    }

    #[test]
    fn test_udp_local_and_remote_path() {
        let dd = DeviceDescriptor::parse("udp://localhost:14015/fc.local:14014", 115_200).unwrap();
        assert_eq!(dd.primary_host, "localhost");
        assert_eq!(dd.primary_param, 14015);
        assert_eq!(dd.secondary_host, "fc.local");
        assert_eq!(dd.secondary_param, 14014);
        assert!(dd.has_remote());
        assert_eq!(dd.to_string(), "udp://localhost:14015/fc.local:14014");
    }

    #[test]
    fn test_udp_bind_query() {
        let dd = DeviceDescriptor::parse("udp://fc.local:14014?bind=14015", 115_200).unwrap();
        assert_eq!(dd.primary_host, "");
        assert_eq!(dd.primary_param, 14015);
        assert_eq!(dd.secondary_host, "fc.local");
        assert_eq!(dd.secondary_param, 14014);

        assert!(DeviceDescriptor::parse("udp://fc.local:14014?bind=x", 115_200).is_err());
    }

    #[test]
    fn test_udp_requires_port() {
        assert!(DeviceDescriptor::parse("udp://fc.local", 115_200).is_err());
    }

    #[test]
    fn test_unknown_scheme() {
        match DeviceDescriptor::parse("ws://fc.local:80", 115_200) {
            Err(MspError::Device(msg)) => assert!(msg.contains("unsupported")),
            other => panic!("Expected Device error, got: {:?}", other),
        }
    }
}
