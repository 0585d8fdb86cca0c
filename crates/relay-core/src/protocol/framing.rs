//! Size-header framing for script payloads.
//!
//! Wire format:
//! ```text
//! [payload_len:4][reserved:4][payload:N]
//! ```
//! Header size: 8 bytes, little-endian.  The reserved half is the high word
//! of a 64-bit length and is always zero, so payloads are limited to
//! `u32::MAX` bytes.
//!
//! The sender writes the header, pauses briefly so the device can parse it,
//! then writes the payload.  The pause lives in the delivery session; this
//! module only produces and checks the eight header bytes.

use thiserror::Error;

/// Total size of the size header in bytes.
pub const SIZE_HEADER_LEN: usize = 8;

/// Errors that can occur while encoding or decoding a size header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The payload does not fit in the 32-bit length field.
    #[error("payload of {0} bytes exceeds the 32-bit frame length field")]
    PayloadTooLarge(usize),

    /// Fewer than [`SIZE_HEADER_LEN`] bytes were available.
    #[error("insufficient data: need {SIZE_HEADER_LEN} bytes, got {available}")]
    InsufficientData { available: usize },

    /// The reserved high word was not zero.
    #[error("reserved header bytes are non-zero: 0x{0:08X}")]
    ReservedNonZero(u32),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes the 8-byte size header for a payload of `payload_len` bytes.
///
/// # Errors
///
/// Returns [`FramingError::PayloadTooLarge`] if `payload_len` exceeds
/// `u32::MAX`.
///
/// # Examples
///
/// ```rust
/// use relay_core::encode_size_header;
///
/// let header = encode_size_header(64).unwrap();
/// assert_eq!(header, [0x40, 0, 0, 0, 0, 0, 0, 0]);
/// ```
pub fn encode_size_header(payload_len: usize) -> Result<[u8; SIZE_HEADER_LEN], FramingError> {
    let len = u32::try_from(payload_len).map_err(|_| FramingError::PayloadTooLarge(payload_len))?;

    let mut header = [0u8; SIZE_HEADER_LEN];
    header[..4].copy_from_slice(&len.to_le_bytes());
    // header[4..8] stays zero: reserved high word
    Ok(header)
}

/// Decodes a size header from the beginning of `bytes` and returns the
/// payload length it announces.
///
/// This is the receiving side of [`encode_size_header`]; the relay itself only
/// sends, but the decoder lets tests and fake devices check the wire.
///
/// # Errors
///
/// - [`FramingError::InsufficientData`] if `bytes` is shorter than 8 bytes.
/// - [`FramingError::ReservedNonZero`] if bytes 4..8 are not zero.
///
/// # Examples
///
/// ```rust
/// use relay_core::{decode_size_header, encode_size_header};
///
/// let header = encode_size_header(1234).unwrap();
/// assert_eq!(decode_size_header(&header).unwrap(), 1234);
/// ```
pub fn decode_size_header(bytes: &[u8]) -> Result<u32, FramingError> {
    if bytes.len() < SIZE_HEADER_LEN {
        return Err(FramingError::InsufficientData {
            available: bytes.len(),
        });
    }

    let reserved = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if reserved != 0 {
        return Err(FramingError::ReservedNonZero(reserved));
    }

    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
