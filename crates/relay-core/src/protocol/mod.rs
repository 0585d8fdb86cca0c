//! Protocol module: the wire framing, the delivery event stream and capture
//! formatting.

pub mod capture;
pub mod events;
pub mod framing;

pub use capture::{ascii_preview, hex_compact, hex_spaced, truncate_display, DISPLAY_LIMIT};
pub use events::DeliveryEvent;
pub use framing::{decode_size_header, encode_size_header, FramingError, SIZE_HEADER_LEN};
