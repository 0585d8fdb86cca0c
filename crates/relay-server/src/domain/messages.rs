//! JSON message types for the browser-facing WebSocket protocol.
//!
//! Every message is a JSON object with a `"type"` field naming the variant:
//!
//! ```text
//! Browser → Relay:  {"type":"Scan","interface":null}
//!                   {"type":"Deliver","ipAddress":"192.168.1.50","port":"9026","fileName":"umtx.lua"}
//! Relay → Browser:  {"type":"ScanResult","localIPs":[..],"activeHosts":[..]}
//!                   {"type":"DeliveryResult","success":true,"response":"..","logs":[..]}
//!                   {"type":"Rejected","status":400,"error":".."}
//! ```
//!
//! Delivery events are sent on the same socket as they happen, using the
//! lower-case tags of [`relay_core::DeliveryEvent`] (`status`, `data`, ...),
//! so they never collide with the capitalised reply tags above.
//!
//! Field names follow the camelCase the web front end already uses.  Request
//! fields are all optional at the serde level; missing values are reported
//! as validation failures by the service instead of as JSON errors.

use relay_core::{LiveHost, LocalInterface};
use serde::{Deserialize, Serialize};

// ── Browser → Relay ───────────────────────────────────────────────────────────

/// Requests a browser can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrowserRequest {
    /// Sweep the local /24 for devices.
    Scan {
        /// Interface to scan from; `None` picks one automatically.
        #[serde(default)]
        interface: Option<String>,
    },

    /// Push a payload to a device.
    ///
    /// Exactly one of `file_name` (predefined payload) or `upload_name`
    /// (bytes follow in the next binary frame) is expected.
    Deliver {
        #[serde(rename = "ipAddress", default)]
        ip_address: Option<String>,
        #[serde(default)]
        port: Option<PortField>,
        #[serde(rename = "fileName", default)]
        file_name: Option<String>,
        #[serde(rename = "uploadName", default)]
        upload_name: Option<String>,
    },
}

/// A port as sent by a form (`"9026"`) or by a script (`9026`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(u64),
    Text(String),
}

impl PortField {
    /// Returns the port if it is an integer in `1..=65535`.
    pub fn parse(&self) -> Option<u16> {
        let value = match self {
            PortField::Number(n) => *n,
            PortField::Text(s) => s.trim().parse::<u64>().ok()?,
        };
        u16::try_from(value).ok().filter(|p| *p != 0)
    }
}

impl std::fmt::Display for PortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortField::Number(n) => write!(f, "{n}"),
            PortField::Text(s) => f.write_str(s),
        }
    }
}

// ── Relay → Browser ───────────────────────────────────────────────────────────

/// Replies the relay sends to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum RelayReply {
    /// Result of a [`BrowserRequest::Scan`].
    ScanResult {
        #[serde(rename = "localIPs")]
        local_ips: Vec<LocalInterface>,
        #[serde(rename = "activeHosts")]
        active_hosts: Vec<LiveHost>,
    },

    /// Final result of a [`BrowserRequest::Deliver`].
    DeliveryResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        logs: Vec<String>,
    },

    /// The request was refused before any work started.
    Rejected { status: u16, error: String },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
