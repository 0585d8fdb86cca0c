//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.  It
//! is deserialized from an optional TOML file; every field has a default so a
//! missing file or a partial file both work:
//!
//! ```toml
//! log_level = "info"
//!
//! [server]
//! bind_addr = "0.0.0.0:3000"
//! uploads_dir = "uploads"
//! payloads_dir = "payloads"
//!
//! [scan]
//! batch_size = 50
//! probe_timeout_ms = 100
//!
//! [delivery]
//! session_timeout_ms = 30000
//! frame_delay_ms = 100
//! ```
//!
//! The two device ports are protocol constants (see
//! [`relay_core::DevicePort`]) and deliberately not configurable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Front-end listener and file locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Where uploaded payloads are staged for the length of one delivery.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    /// Where predefined payloads are looked up by name.
    #[serde(default = "default_payloads_dir")]
    pub payloads_dir: PathBuf,
}

/// Subnet sweep tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    /// Candidates probed concurrently per batch.  Must be non-zero.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-probe connect timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Delivery session timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Session deadline in milliseconds, measured from the connect attempt.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// Pause between the size header and the payload, in milliseconds.
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
}

impl ScanConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl DeliveryConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_payloads_dir() -> PathBuf {
    PathBuf::from("payloads")
}
fn default_batch_size() -> usize {
    50
}
fn default_probe_timeout_ms() -> u64 {
    100
}
fn default_session_timeout_ms() -> u64 {
    30_000
}
fn default_frame_delay_ms() -> u64 {
    100
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            scan: ScanConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            uploads_dir: default_uploads_dir(),
            payloads_dir: default_payloads_dir(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            frame_delay_ms: default_frame_delay_ms(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        // Arrange / Act
        let cfg = RelayConfig::default();

        // Assert
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.server.bind_addr.port(), 3000);
        assert_eq!(cfg.scan.batch_size, 50);
        assert_eq!(cfg.scan.probe_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.delivery.session_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.delivery.frame_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[scan]
batch_size = 10

[server]
payloads_dir = "/srv/payloads"
"#;

        // Act
        let cfg: RelayConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.scan.batch_size, 10);
        assert_eq!(cfg.scan.probe_timeout_ms, 100);
        assert_eq!(cfg.server.payloads_dir, PathBuf::from("/srv/payloads"));
        assert_eq!(cfg.server.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.delivery, DeliveryConfig::default());
    }

    #[test]
    fn test_serializes_and_deserializes_round_trip() {
        let mut cfg = RelayConfig::default();
        cfg.delivery.session_timeout_ms = 5_000;
        cfg.server.bind_addr = "127.0.0.1:8080".parse().unwrap();

        let text = toml::to_string_pretty(&cfg).unwrap();
        let restored: RelayConfig = toml::from_str(&text).unwrap();

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_invalid_bind_addr_is_a_parse_error() {
        let result: Result<RelayConfig, _> = toml::from_str("[server]\nbind_addr = \"nope\"");
        assert!(result.is_err());
    }
}
