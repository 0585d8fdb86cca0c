//! Progress events streamed to observers while a scan or delivery runs.
//!
//! Events are serialized as internally tagged JSON with lower-case tags:
//!
//! ```json
//! {"type":"status","message":"Size header sent successfully"}
//! {"type":"data","message":"ok","hex":"6f6b","length":2}
//! ```

use serde::Serialize;

use super::capture::hex_compact;

/// One entry in a delivery's ordered timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeliveryEvent {
    /// A state transition or progress note.
    Status { message: String },

    /// A chunk received from the device.
    Data {
        /// The chunk decoded as lossy UTF-8.
        message: String,
        /// The chunk as compact lower-case hex.
        hex: String,
        /// Chunk length in bytes.
        length: usize,
        /// The raw chunk.  Not part of the wire form; `hex` carries it.
        #[serde(skip)]
        bytes: Vec<u8>,
    },

    /// A failure.  Published before the failed result is returned.
    Error { message: String },

    /// A terminal success that is worth announcing on its own.
    Success { message: String },
}

impl DeliveryEvent {
    pub fn status(message: impl Into<String>) -> Self {
        DeliveryEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        DeliveryEvent::Error {
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        DeliveryEvent::Success {
            message: message.into(),
        }
    }

    /// Builds a data event from a received chunk.
    pub fn data(chunk: &[u8]) -> Self {
        DeliveryEvent::Data {
            message: String::from_utf8_lossy(chunk).into_owned(),
            hex: hex_compact(chunk),
            length: chunk.len(),
            bytes: chunk.to_vec(),
        }
    }

    /// The human-readable message every variant carries.
    pub fn message(&self) -> &str {
        match self {
            DeliveryEvent::Status { message }
            | DeliveryEvent::Data { message, .. }
            | DeliveryEvent::Error { message }
            | DeliveryEvent::Success { message } => message,
        }
    }

    /// Lower-case tag, as written in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryEvent::Status { .. } => "status",
            DeliveryEvent::Data { .. } => "data",
            DeliveryEvent::Error { .. } => "error",
            DeliveryEvent::Success { .. } => "success",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DeliveryEvent::Error { .. })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
