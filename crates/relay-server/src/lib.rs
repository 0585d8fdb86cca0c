//! relay-server library crate.
//!
//! Finds devices on the local /24 and pushes payloads to them, streaming
//! progress to every attached observer.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (JSON over WebSocket)          payload-relay scan / send
//!         ↕                                        ↕
//! [relay-server]
//!   ├── domain/           RelayConfig, browser JSON messages
//!   ├── application/      EventBroadcaster, SubnetScanner, DeliverySession,
//!   │                     RelayService
//!   └── infrastructure/
//!         ├── interfaces/ pnet interface lister
//!         ├── probe/      TCP connect probe
//!         ├── uploads/    predefined payloads and staged uploads
//!         ├── config_file/ TOML loading
//!         └── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         ↕
//! Device (TCP 9026 / 9021)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` owns the trait seams (`InterfaceSource`, `PortProber`);
//!   the delivery session is generic over any `AsyncRead + AsyncWrite`.
//! - `infrastructure` implements the seams and owns the sockets and files.

/// Domain layer: configuration and wire messages (no I/O).
pub mod domain;

/// Application layer: scanning, delivery and event fan-out.
pub mod application;

/// Infrastructure layer: OS interfaces, sockets, files and the WebSocket server.
pub mod infrastructure;

use std::sync::Arc;

use application::{EventBroadcaster, RelayService, SubnetScanner};
use domain::RelayConfig;
use infrastructure::{PayloadStore, PnetInterfaceSource, TcpPortProber};

/// Wires the production collaborators into a [`RelayService`].
pub fn build_service(config: &RelayConfig, events: Arc<EventBroadcaster>) -> RelayService {
    let scanner = SubnetScanner::new(
        Arc::new(PnetInterfaceSource),
        Arc::new(TcpPortProber),
        Arc::clone(&events),
        &config.scan,
    );
    RelayService::new(
        scanner,
        PayloadStore::from_config(&config.server),
        events,
        config.delivery.clone(),
    )
}
