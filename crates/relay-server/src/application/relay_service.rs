//! RelayService: the two boundary operations, scan and deliver.
//!
//! The service validates a trigger, resolves the payload (a predefined file
//! or a staged upload), reads it, runs a [`DeliverySession`], and removes the
//! staged upload once the session has finalized.  Validation failures never
//! touch the network.
//!
//! Front ends (the WebSocket server, the CLI) go through this type only.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use relay_core::{DeliveryEvent, DeliveryRequest, InterfaceSelectionError};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::broadcaster::EventBroadcaster;
use crate::application::delivery::{DeliveryResult, DeliverySession, Timeline};
use crate::application::scanner::{ScanReport, SubnetScanner};
use crate::domain::config::DeliveryConfig;
use crate::domain::messages::{BrowserRequest, PortField, RelayReply};
use crate::infrastructure::uploads::{
    is_bare_file_name, read_payload, PayloadError, PayloadStore, StagedPayload,
};

const MISSING_TARGET: &str = "Missing required fields (IP address or port)";
const MISSING_PAYLOAD: &str = "No file specified (neither uploaded nor predefined)";

/// Failures that reject a trigger before any work is done.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The request is missing a field or has an unusable value.
    #[error("{0}")]
    Validation(String),

    /// A predefined payload was named but does not exist.
    #[error("Predefined file {0} not found")]
    PredefinedNotFound(String),

    /// No usable network interface for a scan.
    #[error(transparent)]
    Discovery(#[from] InterfaceSelectionError),

    /// The uploaded payload could not be written to disk.
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] PayloadError),
}

impl TriggerError {
    /// HTTP-style status code reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            TriggerError::Validation(_) | TriggerError::PredefinedNotFound(_) => 400,
            TriggerError::Discovery(_) | TriggerError::Staging(_) => 500,
        }
    }
}

/// An uploaded payload: the file name it was uploaded under and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The raw, unvalidated fields of a delivery trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryTrigger {
    pub ip_address: Option<String>,
    pub port: Option<PortField>,
    /// Name of a predefined payload.
    pub file_name: Option<String>,
    /// Uploaded payload; takes precedence over `file_name`.
    pub upload: Option<Upload>,
}

enum ResolvedPayload {
    Predefined { name: String, path: PathBuf },
    Staged { name: String, staged: StagedPayload },
}

/// Entry point for scans and deliveries.
pub struct RelayService {
    scanner: SubnetScanner,
    store: PayloadStore,
    events: Arc<EventBroadcaster>,
    delivery: DeliveryConfig,
}

impl RelayService {
    pub fn new(
        scanner: SubnetScanner,
        store: PayloadStore,
        events: Arc<EventBroadcaster>,
        delivery: DeliveryConfig,
    ) -> Self {
        Self {
            scanner,
            store,
            events,
            delivery,
        }
    }

    pub fn events(&self) -> &Arc<EventBroadcaster> {
        &self.events
    }

    /// Sweeps the local network.
    ///
    /// # Errors
    ///
    /// [`TriggerError::Discovery`] if no usable interface exists.
    pub async fn handle_scan(&self, interface: Option<&str>) -> Result<ScanReport, TriggerError> {
        Ok(self.scanner.scan(interface).await?)
    }

    /// Validates `trigger` and runs one delivery.
    ///
    /// A payload that cannot be read produces a failed [`DeliveryResult`],
    /// not an error, so the caller still receives the timeline.
    ///
    /// # Errors
    ///
    /// - [`TriggerError::Validation`] for a missing or malformed target, or
    ///   when no payload is given.
    /// - [`TriggerError::PredefinedNotFound`] for an unknown payload name.
    /// - [`TriggerError::Staging`] if an upload cannot be written.
    pub async fn handle_delivery(&self, trigger: DeliveryTrigger) -> Result<DeliveryResult, TriggerError> {
        let target = validate_target(trigger.ip_address.as_deref(), trigger.port.as_ref())?;
        let resolved = self.resolve_payload(trigger.upload, trigger.file_name).await?;

        let (name, path, staged) = match resolved {
            ResolvedPayload::Predefined { name, path } => (name, path, None),
            ResolvedPayload::Staged { name, staged } => {
                (name, staged.path().to_path_buf(), Some(staged))
            }
        };
        info!("delivering {name} to {target}");

        let mut timeline = Timeline::new(Arc::clone(&self.events));
        timeline.emit(DeliveryEvent::status(format!(
            "Starting process for file: {name}"
        )));
        timeline.note(format!("Target: {target}"));

        let mut result = match read_payload(&path).await {
            Ok(payload) => {
                timeline.emit(DeliveryEvent::status(format!(
                    "File read successfully, content size: {} bytes",
                    payload.len()
                )));
                let request = DeliveryRequest::new(target, name, payload);
                DeliverySession::new(request, &self.delivery, timeline)
                    .run()
                    .await
            }
            Err(e) => {
                timeline.emit(DeliveryEvent::error(format!("Error reading file: {e}")));
                DeliveryResult::failed_before_connect(timeline, "Error reading file".to_string())
            }
        };

        if let Some(staged) = staged {
            match staged.remove().await {
                Ok(()) => result.logs.push("Temporary file deleted".to_string()),
                Err(e) => warn!("could not delete staged upload: {e}"),
            }
        }

        Ok(result)
    }

    /// Handles one browser request and builds the reply.
    ///
    /// `upload` carries the bytes of the binary frame that followed a
    /// `Deliver` request with an `uploadName`.
    pub async fn handle_request(&self, request: BrowserRequest, upload: Option<Vec<u8>>) -> RelayReply {
        match request {
            BrowserRequest::Scan { interface } => match self.handle_scan(interface.as_deref()).await {
                Ok(report) => RelayReply::ScanResult {
                    local_ips: report.local_interfaces,
                    active_hosts: report.live_hosts,
                },
                Err(e) => rejected(&e),
            },
            BrowserRequest::Deliver {
                ip_address,
                port,
                file_name,
                upload_name,
            } => {
                let trigger = DeliveryTrigger {
                    ip_address,
                    port,
                    file_name,
                    upload: upload_name
                        .zip(upload)
                        .map(|(name, bytes)| Upload { name, bytes }),
                };
                match self.handle_delivery(trigger).await {
                    Ok(result) => delivery_reply(&result),
                    Err(e) => rejected(&e),
                }
            }
        }
    }

    async fn resolve_payload(
        &self,
        upload: Option<Upload>,
        file_name: Option<String>,
    ) -> Result<ResolvedPayload, TriggerError> {
        if let Some(upload) = upload {
            check_file_name(&upload.name)?;
            let staged = self
                .store
                .stage_upload(&upload.name, &upload.bytes)
                .await
                .map_err(TriggerError::Staging)?;
            return Ok(ResolvedPayload::Staged {
                name: upload.name,
                staged,
            });
        }

        let name = match file_name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(TriggerError::Validation(MISSING_PAYLOAD.to_string())),
        };
        check_file_name(&name)?;
        match self.store.predefined(&name).await {
            Some(path) => Ok(ResolvedPayload::Predefined { name, path }),
            None => Err(TriggerError::PredefinedNotFound(name)),
        }
    }
}

/// Builds the reply for a finished delivery.
pub fn delivery_reply(result: &DeliveryResult) -> RelayReply {
    RelayReply::DeliveryResult {
        success: result.success(),
        response: result.response_text(),
        error: result.error().map(str::to_string),
        logs: result.logs.clone(),
    }
}

fn rejected(error: &TriggerError) -> RelayReply {
    RelayReply::Rejected {
        status: error.status_code(),
        error: error.to_string(),
    }
}

/// Parses the target address.  Both fields are required.
fn validate_target(ip: Option<&str>, port: Option<&PortField>) -> Result<SocketAddr, TriggerError> {
    let (ip, port) = match (ip.map(str::trim), port) {
        (Some(ip), Some(port)) if !ip.is_empty() => (ip, port),
        _ => return Err(TriggerError::Validation(MISSING_TARGET.to_string())),
    };
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| TriggerError::Validation(format!("Invalid IP address: {ip}")))?;
    let port = port
        .parse()
        .ok_or_else(|| TriggerError::Validation(format!("Invalid port: {port}")))?;
    Ok(SocketAddr::new(ip, port))
}

fn check_file_name(name: &str) -> Result<(), TriggerError> {
    if is_bare_file_name(name) {
        Ok(())
    } else {
        Err(TriggerError::Validation(format!("Invalid file name: {name}")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
