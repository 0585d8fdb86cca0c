//! TCP reachability probe used by the subnet scanner.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpSocket;
use tracing::trace;

use crate::application::scanner::PortProber;

/// Probes a port with a real TCP connect.
///
/// Nagle is disabled before connecting, and the socket is dropped (closed) on
/// every path, so a sweep of hundreds of probes never accumulates open
/// descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProber;

#[async_trait]
impl PortProber for TcpPortProber {
    async fn probe(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        let addr = SocketAddr::from((ip, port));

        let socket = match TcpSocket::new_v4() {
            Ok(socket) => socket,
            Err(e) => {
                trace!("probe {addr}: socket creation failed: {e}");
                return false;
            }
        };
        if let Err(e) = socket.set_nodelay(true) {
            trace!("probe {addr}: set_nodelay failed: {e}");
        }

        match tokio::time::timeout(timeout, socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                trace!("probe {addr}: {e}");
                false
            }
            Err(_) => {
                trace!("probe {addr}: timed out after {timeout:?}");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_open_port_returns_true() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Act
        let open = TcpPortProber
            .probe(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
            .await;

        // Assert
        assert!(open);
    }

    #[tokio::test]
    async fn test_probe_closed_port_returns_false() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let open = TcpPortProber
            .probe(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
            .await;

        assert!(!open);
    }

    #[tokio::test]
    async fn test_probe_unroutable_address_resolves_within_timeout() {
        // TEST-NET-1 is reserved and never answers; the probe must still
        // come back promptly with `false`.
        let started = std::time::Instant::now();

        let open = TcpPortProber
            .probe(Ipv4Addr::new(192, 0, 2, 1), 9026, Duration::from_millis(100))
            .await;

        assert!(!open);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
