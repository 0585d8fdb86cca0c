//! WebSocket server: accept loop and per-connection session tasks.
//!
//! Each browser connection gets two tasks:
//!
//! - **writer**: the only task that writes to the socket.  It forwards the
//!   connection's broadcaster subscription ([`DeliveryEvent`]s) and the
//!   replies to its requests, all as JSON text frames.
//! - **requests**: reads `Scan` / `Deliver` requests and runs them through
//!   the [`RelayService`].
//!
//! Every event of a request is published before the request returns, so the
//! writer drains the subscription before it sends a reply.  A browser
//! therefore always sees a delivery's terminal event ahead of its result.
//!
//! An upload is sent as a `Deliver` text frame carrying `uploadName`,
//! followed by exactly one binary frame with the file bytes.
//!
//! The accept loop polls the shared `running` flag every 200 ms so Ctrl+C
//! stops it even when no browser is connecting.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::application::relay_service::RelayService;
use crate::domain::messages::{BrowserRequest, RelayReply};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves browsers until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    bind_addr: SocketAddr,
    service: Arc<RelayService>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;
    info!("payload relay listening on {bind_addr}");
    serve(listener, service, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    service: Arc<RelayService>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new browser connection from {peer_addr}");
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    handle_browser_session(stream, peer_addr, service).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_browser_session(stream: TcpStream, peer_addr: SocketAddr, service: Arc<RelayService>) {
    match run_session(stream, peer_addr, service).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: Arc<RelayService>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    info!("WebSocket session established: {peer_addr}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let session_id = peer_addr.to_string();

    let mut subscription = service.events().subscribe();
    let subscription_id = subscription.id();

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<RelayReply>();

    // ── Task A: events and replies → browser ──────────────────────────────────
    let writer_session = session_id.clone();
    let mut writer_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    if !send_json(&mut ws_tx, &event, &writer_session).await {
                        break;
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(reply) = reply else { break };
                    let mut open = true;
                    while let Some(event) = subscription.try_recv() {
                        open = send_json(&mut ws_tx, &event, &writer_session).await;
                        if !open {
                            break;
                        }
                    }
                    if !open || !send_json(&mut ws_tx, &reply, &writer_session).await {
                        break;
                    }
                }
            }
        }
    });

    // ── Task B: browser requests ──────────────────────────────────────────────
    let requests_session = session_id.clone();
    let requests_service = Arc::clone(&service);
    let mut requests_task = tokio::spawn(async move {
        let mut pending_upload: Option<BrowserRequest> = None;
        loop {
            let ws_msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {requests_session}: browser WebSocket closed normally");
                    break;
                }
                Some(Err(e)) => {
                    warn!("session {requests_session}: browser WebSocket error: {e}");
                    break;
                }
                None => {
                    debug!("session {requests_session}: browser stream ended");
                    break;
                }
            };

            let reply = match ws_msg {
                WsMessage::Text(json_str) => {
                    let request: BrowserRequest = match serde_json::from_str(&json_str) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("session {requests_session}: invalid JSON from browser: {e}");
                            let reply = RelayReply::Rejected {
                                status: 400,
                                error: format!("Invalid request: {e}"),
                            };
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                            continue;
                        }
                    };
                    debug!(
                        "session {requests_session}: request {}",
                        request_type_name(&request)
                    );
                    if expects_upload(&request) {
                        if pending_upload.replace(request).is_some() {
                            warn!("session {requests_session}: upload request replaced before its data arrived");
                        }
                        continue;
                    }
                    requests_service.handle_request(request, None).await
                }

                WsMessage::Binary(bytes) => match pending_upload.take() {
                    Some(request) => {
                        debug!(
                            "session {requests_session}: upload data ({} bytes)",
                            bytes.len()
                        );
                        requests_service.handle_request(request, Some(bytes)).await
                    }
                    None => {
                        warn!("session {requests_session}: binary frame without an upload request (ignored)");
                        continue;
                    }
                },

                WsMessage::Ping(data) => {
                    debug!("session {requests_session}: WebSocket ping ({} bytes)", data.len());
                    continue;
                }
                WsMessage::Pong(_) => continue,
                WsMessage::Close(_) => {
                    debug!("session {requests_session}: WebSocket Close frame received");
                    break;
                }
                WsMessage::Frame(_) => continue,
            };

            if reply_tx.send(reply).is_err() {
                debug!("session {requests_session}: writer gone, dropping reply");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer_task => {
            debug!("session {session_id}: writer ended");
        }
        _ = &mut requests_task => {
            debug!("session {session_id}: request reader ended");
        }
    }

    service.events().unsubscribe(subscription_id);
    writer_task.abort();
    requests_task.abort();
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Serializes `value` and sends it as a text frame.  Returns `false` once the
/// browser is gone.
async fn send_json<T: Serialize>(sink: &mut WsSink, value: &T, session_id: &str) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("session {session_id}: JSON serialization error: {e}");
            return true;
        }
    };
    if sink.send(WsMessage::Text(json)).await.is_err() {
        debug!("session {session_id}: WebSocket send failed (browser disconnected)");
        return false;
    }
    true
}

/// A `Deliver` with an `uploadName` waits for the following binary frame.
fn expects_upload(request: &BrowserRequest) -> bool {
    matches!(
        request,
        BrowserRequest::Deliver {
            upload_name: Some(_),
            ..
        }
    )
}

fn request_type_name(request: &BrowserRequest) -> &'static str {
    match request {
        BrowserRequest::Scan { .. } => "Scan",
        BrowserRequest::Deliver { .. } => "Deliver",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_with_upload_name_waits_for_data() {
        let request: BrowserRequest = serde_json::from_str(
            r#"{"type":"Deliver","ipAddress":"192.168.1.50","port":9026,"uploadName":"a.lua"}"#,
        )
        .unwrap();
        assert!(expects_upload(&request));
    }

    #[test]
    fn test_predefined_deliver_does_not_wait_for_data() {
        let request: BrowserRequest = serde_json::from_str(
            r#"{"type":"Deliver","ipAddress":"192.168.1.50","port":9026,"fileName":"a.lua"}"#,
        )
        .unwrap();
        assert!(!expects_upload(&request));
        assert_eq!(request_type_name(&request), "Deliver");
    }

    #[test]
    fn test_scan_type_name() {
        let request = BrowserRequest::Scan { interface: None };
        assert!(!expects_upload(&request));
        assert_eq!(request_type_name(&request), "Scan");
    }
}
