//! Live hosts found by a scan and the two ports they are probed on.

use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

/// The two TCP ports a target device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DevicePort {
    /// The payload listener.  A host is only "live" if this port answers.
    Primary,
    /// A secondary service port, probed only once the primary answered.
    Secondary,
}

impl DevicePort {
    /// Primary payload port number.
    pub const PRIMARY_PORT: u16 = 9026;
    /// Secondary service port number.
    pub const SECONDARY_PORT: u16 = 9021;

    /// Returns the TCP port number for this variant.
    pub fn number(self) -> u16 {
        match self {
            DevicePort::Primary => Self::PRIMARY_PORT,
            DevicePort::Secondary => Self::SECONDARY_PORT,
        }
    }
}

impl Serialize for DevicePort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.number())
    }
}

/// A host whose primary port accepted a TCP connection.
///
/// The port list always starts with [`DevicePort::Primary`]; the constructor
/// is the only way to build one, so a `LiveHost` without the primary port
/// cannot exist.
///
/// # Serde representation
///
/// ```json
/// {"ip":"192.168.1.50","ports":[9026,9021]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveHost {
    ip: Ipv4Addr,
    ports: Vec<DevicePort>,
}

impl LiveHost {
    /// Builds a live host.  `secondary_open` records whether the secondary
    /// probe succeeded as well.
    pub fn new(ip: Ipv4Addr, secondary_open: bool) -> Self {
        let mut ports = vec![DevicePort::Primary];
        if secondary_open {
            ports.push(DevicePort::Secondary);
        }
        Self { ip, ports }
    }

    /// The host address.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Open ports, primary first.  Never empty.
    pub fn open_ports(&self) -> &[DevicePort] {
        &self.ports
    }

    /// Returns `true` if `port` answered.
    pub fn has_port(&self, port: DevicePort) -> bool {
        self.ports.contains(&port)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
