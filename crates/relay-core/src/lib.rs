//! # relay-core
//!
//! Shared library for payload-relay containing the device domain model, the
//! size-header framing codec and the delivery event type.
//!
//! This crate has zero dependencies on sockets, async runtimes or the OS.
//! Everything here can be unit-tested without a network.
//!
//! # Architecture overview
//!
//! payload-relay finds devices on the local /24 network that listen on two
//! well-known TCP ports, then pushes a payload file to one of them and streams
//! the progress to any attached observer.  This crate defines:
//!
//! - **`domain`** – What the relay reasons about: local interfaces, the /24
//!   scan target derived from one of them, live hosts, and the delivery
//!   request together with the protocol profile its file name selects.
//!
//! - **`protocol`** – How bytes travel to the device: the 8-byte little-endian
//!   size header that precedes framed payloads, the [`DeliveryEvent`] stream
//!   observers receive, and the hex/ASCII capture formatting used to log
//!   whatever the device sends back.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::LiveHost` instead of `relay_core::domain::host::LiveHost`.
pub use domain::delivery::{DeliveryRequest, Expectation, PayloadProfile};
pub use domain::host::{DevicePort, LiveHost};
pub use domain::interface::{select_interface, InterfaceSelectionError, LocalInterface};
pub use domain::target::ScanTarget;
pub use protocol::events::DeliveryEvent;
pub use protocol::framing::{decode_size_header, encode_size_header, FramingError};
