//! Local interface enumeration backed by `pnet`.

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use relay_core::LocalInterface;
use tracing::debug;

use crate::application::scanner::InterfaceSource;

/// Lists the host's interfaces through `pnet::datalink`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PnetInterfaceSource;

impl InterfaceSource for PnetInterfaceSource {
    fn interfaces(&self) -> Vec<LocalInterface> {
        let found = ipv4_interfaces(&datalink::interfaces());
        debug!("found {} IPv4 interface address(es)", found.len());
        found
    }
}

/// One [`LocalInterface`] per non-loopback IPv4 address, in OS order.
///
/// An interface with several IPv4 addresses yields several entries.
pub fn ipv4_interfaces(interfaces: &[NetworkInterface]) -> Vec<LocalInterface> {
    interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .flat_map(|iface| {
            iface.ips.iter().filter_map(move |net| match net {
                IpNetwork::V4(v4) if !v4.ip().is_loopback() => {
                    Some(LocalInterface::new(iface.name.clone(), v4.ip(), v4.mask()))
                }
                _ => None,
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
