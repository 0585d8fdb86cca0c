//! The /24 scan target derived from the selected interface.
//!
//! # Known limitation
//!
//! The prefix is always the first three octets of the interface address,
//! whatever the real netmask says.  A /16 home network is therefore only
//! scanned in the /24 slice that contains this machine, and a /25 is
//! over-scanned.  Devices the relay is built for sit on ordinary /24 home
//! networks, so the netmask is reported but not used.

use std::fmt;
use std::net::Ipv4Addr;

use crate::domain::interface::LocalInterface;

/// First host number probed in the /24 (`prefix.1`).
pub const FIRST_HOST: u8 = 1;

/// Last host number probed in the /24 (`prefix.254`).
pub const LAST_HOST: u8 = 254;

/// The network slice one scan sweeps.
///
/// Built once per scan from the selected interface and never mutated during
/// the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTarget {
    prefix: [u8; 3],
    excluded: Ipv4Addr,
}

impl ScanTarget {
    /// Derives the target from `iface`: its first three octets become the
    /// prefix and its own address is excluded from the sweep.
    pub fn from_interface(iface: &LocalInterface) -> Self {
        let [a, b, c, _] = iface.ipv4.octets();
        Self {
            prefix: [a, b, c],
            excluded: iface.ipv4,
        }
    }

    /// The three prefix octets.
    pub fn prefix(&self) -> [u8; 3] {
        self.prefix
    }

    /// The local address that is never probed.
    pub fn excluded(&self) -> Ipv4Addr {
        self.excluded
    }

    /// Every candidate address `prefix.1 ..= prefix.254`, in ascending order,
    /// minus the excluded local address.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::net::Ipv4Addr;
    /// use relay_core::{LocalInterface, ScanTarget};
    ///
    /// let iface = LocalInterface::new(
    ///     "eth0",
    ///     Ipv4Addr::new(192, 168, 1, 20),
    ///     Ipv4Addr::new(255, 255, 255, 0),
    /// );
    /// let candidates = ScanTarget::from_interface(&iface).candidates();
    /// assert_eq!(candidates.len(), 253);
    /// assert!(!candidates.contains(&Ipv4Addr::new(192, 168, 1, 20)));
    /// ```
    pub fn candidates(&self) -> Vec<Ipv4Addr> {
        let [a, b, c] = self.prefix;
        (FIRST_HOST..=LAST_HOST)
            .map(|d| Ipv4Addr::new(a, b, c, d))
            .filter(|ip| *ip != self.excluded)
            .collect()
    }
}

impl fmt::Display for ScanTarget {
    /// Renders the target the way it is logged: `192.168.1.x`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.prefix;
        write!(f, "{a}.{b}.{c}.x")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
