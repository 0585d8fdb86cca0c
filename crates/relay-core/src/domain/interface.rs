//! Local IPv4 interfaces and the rule that picks the one to scan from.
//!
//! The interface list is produced fresh on every discovery call by the
//! infrastructure layer (see `relay-server`'s `PnetInterfaceSource`); this
//! module only describes the data and the selection rule so that the rule can
//! be tested against arbitrary interface sets.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while choosing the interface to scan from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterfaceSelectionError {
    /// The host has no non-loopback IPv4 interface at all.
    #[error("No network interfaces found")]
    NoInterfaces,

    /// A specific interface was requested but is not present.
    #[error("network interface '{0}' not found")]
    InterfaceNotFound(String),
}

/// One non-loopback IPv4 address bound to a local network interface.
///
/// An interface with several IPv4 addresses shows up as several entries that
/// share the same `name`.
///
/// # Serde representation
///
/// ```json
/// {"interface":"eth0","ip":"192.168.1.20","netmask":"255.255.255.0"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInterface {
    /// OS name of the interface (`eth0`, `en0`, `Ethernet 2`, ...).
    #[serde(rename = "interface")]
    pub name: String,
    /// The IPv4 address assigned to the interface.
    #[serde(rename = "ip")]
    pub ipv4: Ipv4Addr,
    /// The network mask of that address.
    pub netmask: Ipv4Addr,
}

impl LocalInterface {
    /// Convenience constructor used by the infrastructure layer and tests.
    pub fn new(name: impl Into<String>, ipv4: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            ipv4,
            netmask,
        }
    }

    /// Returns `true` for APIPA / link-local addresses (169.254.0.0/16).
    ///
    /// Such an address means DHCP failed on that link, so it is a poor
    /// choice for finding devices.
    pub fn is_link_local(&self) -> bool {
        self.ipv4.is_link_local()
    }
}

/// Selects the interface to scan from.
///
/// - With `name`, the first entry whose `name` matches exactly is returned.
/// - Without `name`, the first entry that is not link-local is preferred,
///   falling back to the first entry overall.
///
/// # Errors
///
/// - [`InterfaceSelectionError::NoInterfaces`] when `interfaces` is empty.
/// - [`InterfaceSelectionError::InterfaceNotFound`] when `name` matches
///   nothing.
///
/// # Example
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use relay_core::{select_interface, LocalInterface};
///
/// let mask = Ipv4Addr::new(255, 255, 0, 0);
/// let ifaces = vec![
///     LocalInterface::new("eth1", Ipv4Addr::new(169, 254, 3, 7), mask),
///     LocalInterface::new("eth0", Ipv4Addr::new(192, 168, 1, 20), mask),
/// ];
/// assert_eq!(select_interface(&ifaces, None).unwrap().name, "eth0");
/// ```
pub fn select_interface<'a>(
    interfaces: &'a [LocalInterface],
    name: Option<&str>,
) -> Result<&'a LocalInterface, InterfaceSelectionError> {
    let first = interfaces
        .first()
        .ok_or(InterfaceSelectionError::NoInterfaces)?;

    match name {
        Some(wanted) => interfaces
            .iter()
            .find(|iface| iface.name == wanted)
            .ok_or_else(|| InterfaceSelectionError::InterfaceNotFound(wanted.to_string())),
        None => Ok(interfaces
            .iter()
            .find(|iface| !iface.is_link_local())
            .unwrap_or(first)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
