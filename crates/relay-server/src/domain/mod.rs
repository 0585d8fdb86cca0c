//! Domain layer for relay-server.
//!
//! Pure types with no I/O: the runtime configuration and the JSON messages
//! of the browser-facing protocol.  Device-level types (interfaces, hosts,
//! delivery requests, events) live in `relay-core`.

pub mod config;
pub mod messages;

pub use config::{DeliveryConfig, RelayConfig, ScanConfig, ServerConfig};
pub use messages::{BrowserRequest, PortField, RelayReply};
