//! Application layer for relay-server.
//!
//! Knows *what* a scan and a delivery do; the infrastructure layer supplies
//! sockets, interface enumeration and files through the seams declared here.
//!
//! # Responsibilities
//!
//! - Fanning progress events out to observers (`broadcaster`)
//! - Sweeping the local /24 in bounded batches (`scanner`)
//! - Driving one TCP delivery session to a single result (`delivery`)
//! - Validating triggers and resolving payloads (`relay_service`)

pub mod broadcaster;
pub mod delivery;
pub mod relay_service;
pub mod scanner;

pub use broadcaster::{EventBroadcaster, Subscription};
pub use delivery::{DeliveryOutcome, DeliveryResult, DeliverySession, SessionError, SessionState, Timeline};
pub use relay_service::{delivery_reply, DeliveryTrigger, RelayService, TriggerError, Upload};
pub use scanner::{InterfaceSource, PortProber, ScanReport, SubnetScanner};
