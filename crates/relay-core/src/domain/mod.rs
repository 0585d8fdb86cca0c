//! Domain entities for payload-relay.
//!
//! Pure data and rules with no I/O: nothing in here opens a socket, reads a
//! file or sleeps.  Outer layers (the scanner, the delivery session, the
//! WebSocket front end) depend on these types, never the other way round.

/// Delivery requests and the protocol profile a payload name selects.
pub mod delivery;

/// Live hosts and the two device ports they are probed on.
pub mod host;

/// Local IPv4 interfaces and the interface-selection rule.
pub mod interface;

/// The /24 scan target derived from a selected interface.
pub mod target;
