//! Delivery requests and the protocol profile a payload's file name selects.
//!
//! The device speaks two dialects on the same port:
//!
//! - **Raw** – executables and raw binaries (`*.elf`, `*.bin`) are written
//!   as-is and the connection is closed right after.
//! - **Framed** – everything else (scripts) is preceded by an 8-byte
//!   little-endian size header, and the connection is left open for the
//!   device to act on it.
//!
//! Two framed payload names carry an extra expectation that changes how the
//! session timeout is reported, but not what goes over the wire.

use std::net::SocketAddr;

/// Name suffixes that select the raw (unframed) dialect.  Case-sensitive.
pub const RAW_EXTENSIONS: [&str; 2] = [".elf", ".bin"];

/// Framed payload after which the device is expected to answer.
pub const RESPONSE_PAYLOAD_NAME: &str = "umtx.lua";

/// Framed payload after which the device is expected to stop responding.
pub const CRASH_PAYLOAD_NAME: &str = "elf_loader.lua";

/// What the relay expects the device to do once a framed payload is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Nothing specific is known; the device may answer, close, or go quiet.
    Unspecified,
    /// The device should send data back.
    Response,
    /// The device should crash or become unreachable; silence is success.
    RemoteCrash,
}

/// How a payload is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadProfile {
    /// Written without a header; the socket is closed after the write.
    Raw,
    /// Preceded by the size header; the socket stays open afterwards.
    Framed(Expectation),
}

impl PayloadProfile {
    /// Classifies a payload by its file name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relay_core::{Expectation, PayloadProfile};
    ///
    /// assert_eq!(PayloadProfile::for_name("loader.elf"), PayloadProfile::Raw);
    /// assert_eq!(
    ///     PayloadProfile::for_name("ELF_LOADER.lua"),
    ///     PayloadProfile::Framed(Expectation::RemoteCrash)
    /// );
    /// ```
    pub fn for_name(name: &str) -> Self {
        if RAW_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return PayloadProfile::Raw;
        }

        let expectation = if name.eq_ignore_ascii_case(CRASH_PAYLOAD_NAME) {
            Expectation::RemoteCrash
        } else if name.eq_ignore_ascii_case(RESPONSE_PAYLOAD_NAME) {
            Expectation::Response
        } else {
            Expectation::Unspecified
        };
        PayloadProfile::Framed(expectation)
    }

    /// Returns `true` if the size header is sent before the payload.
    pub fn is_framed(self) -> bool {
        matches!(self, PayloadProfile::Framed(_))
    }
}

/// Everything one delivery needs.  Built once per delivery and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Device address and port.
    pub target: SocketAddr,
    /// File name of the payload; selects the [`PayloadProfile`].
    pub payload_name: String,
    /// The payload bytes.
    pub payload: Vec<u8>,
}

impl DeliveryRequest {
    pub fn new(target: SocketAddr, payload_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            target,
            payload_name: payload_name.into(),
            payload,
        }
    }

    /// The protocol profile selected by `payload_name`.
    pub fn profile(&self) -> PayloadProfile {
        PayloadProfile::for_name(&self.payload_name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
