//! Infrastructure layer for relay-server.
//!
//! All I/O lives here: interface enumeration through `pnet`, TCP probes,
//! payload files on disk, the TOML config file and the browser-facing
//! WebSocket server.

pub mod config_file;
pub mod interfaces;
pub mod probe;
pub mod uploads;
pub mod ws_server;

pub use config_file::{load_config, parse_config, ConfigError};
pub use interfaces::PnetInterfaceSource;
pub use probe::TcpPortProber;
pub use uploads::{PayloadError, PayloadStore, StagedPayload};
pub use ws_server::{run_server, serve};
