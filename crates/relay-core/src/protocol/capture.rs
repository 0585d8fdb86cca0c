//! Hex and printable-ASCII rendering of captured bytes.
//!
//! Whatever the device sends back is logged twice: once as hex, once as
//! ASCII with non-printable bytes replaced by `.`.  Both renderings are cut
//! at [`DISPLAY_LIMIT`] characters so a large capture does not flood the log.

use std::fmt::Write as _;

/// Maximum number of characters of a rendering kept in a log line.
pub const DISPLAY_LIMIT: usize = 100;

/// Lower-case hex without separators: `[0x40, 0x0a]` → `"400a"`.
pub fn hex_compact(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing into a String cannot fail.
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Lower-case hex with one space between bytes: `[0x40, 0x0a]` → `"40 0a"`.
pub fn hex_spaced(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Printable ASCII (0x20..=0x7E) kept as-is, everything else rendered as `.`.
///
/// The bytes are decoded as UTF-8 first (invalid sequences become U+FFFD), so
/// a multibyte character yields one `.` per UTF-16 unit, not one per byte.
pub fn ascii_preview(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for c in String::from_utf8_lossy(bytes).chars() {
        if (' '..='~').contains(&c) {
            out.push(c);
        } else {
            out.extend(std::iter::repeat('.').take(c.len_utf16()));
        }
    }
    out
}

/// Cuts `text` to `limit` characters and appends `...` if anything was cut.
pub fn truncate_display(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
