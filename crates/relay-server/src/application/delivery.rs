//! DeliverySession: pushes one payload to one device over one TCP connection.
//!
//! # State machine
//!
//! ```text
//! CONNECTING ─► CONNECTED ─┬─(raw)────────────────► SENDING ─► CLOSED
//!                          └─(framed)─► FRAMING_WAIT ─► SENDING ─► OPEN_AWAITING_CLOSE ─┬─► CLOSED (remote close)
//!                                                                                       └─► CLOSED (deadline, success)
//! any non-terminal state ─► ERRORED
//! ```
//!
//! One deadline covers the whole session, starting when the connect attempt
//! begins.  If it expires while the connection is open and the payload has
//! been sent, that is the expected outcome for a device that acts on the
//! payload without answering, and the session succeeds.  If it expires any
//! earlier the session fails.
//!
//! Every transition is recorded in a [`Timeline`]: the typed event list, the
//! textual log returned to the caller, and the live [`EventBroadcaster`] feed.
//!
//! Finalization consumes the session, so a result is produced exactly once and
//! the socket is dropped exactly once, whichever terminal state is reached.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use relay_core::protocol::capture::{ascii_preview, hex_compact, hex_spaced, truncate_display};
use relay_core::protocol::DISPLAY_LIMIT;
use relay_core::{encode_size_header, DeliveryEvent, DeliveryRequest, Expectation, FramingError, PayloadProfile};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::debug;

use crate::application::broadcaster::EventBroadcaster;
use crate::domain::config::DeliveryConfig;

/// Response text reported when a crash-signal payload timed out as expected.
pub const CRASH_TRIGGERED_RESPONSE: &str = "Payload delivered - remote crash triggered successfully";

/// Response text reported when any other framed payload timed out.
pub const AWAITING_ACTION_RESPONSE: &str = "Payload sent - waiting for expected remote action";

const READ_CHUNK: usize = 8 * 1024;

// ── States and errors ─────────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    FramingWait,
    Sending,
    OpenAwaitingClose,
    Closed,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "CONNECTING",
            SessionState::Connected => "CONNECTED",
            SessionState::FramingWait => "FRAMING_WAIT",
            SessionState::Sending => "SENDING",
            SessionState::OpenAwaitingClose => "OPEN_AWAITING_CLOSE",
            SessionState::Closed => "CLOSED",
            SessionState::Errored => "ERRORED",
        };
        f.write_str(name)
    }
}

/// Which write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    SizeHeader,
    Payload,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStage::SizeHeader => f.write_str("size header"),
            WriteStage::Payload => f.write_str("file data"),
        }
    }
}

/// Reasons a session ends in [`SessionState::Errored`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connect(#[source] io::Error),

    #[error("Error sending {stage}: {source}")]
    Write {
        stage: WriteStage,
        #[source]
        source: io::Error,
    },

    #[error("Connection error: {0}")]
    Read(#[source] io::Error),

    #[error("Connection timed out in state {state}")]
    TimedOut { state: SessionState },

    #[error("Cannot frame payload: {0}")]
    Framing(#[from] FramingError),
}

// ── Results ───────────────────────────────────────────────────────────────────

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The device closed the connection after the payload was sent.
    RemoteClosed,
    /// A raw payload was written and the connection closed by the relay.
    RawSent,
    /// The deadline expired after a crash-signal payload.
    CrashTriggered,
    /// The deadline expired after any other framed payload.
    AwaitingRemoteAction,
    /// The delivery failed; carries the error message.
    Failed(String),
}

/// The single result of one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub outcome: DeliveryOutcome,
    pub final_state: SessionState,
    /// Every byte the device sent back.
    pub response: Vec<u8>,
    /// The ordered event timeline.
    pub events: Vec<DeliveryEvent>,
    /// The ordered textual log: event messages plus capture and diagnostic lines.
    pub logs: Vec<String>,
}

impl DeliveryResult {
    /// Builds a failed result for a delivery that never reached the socket.
    pub fn failed_before_connect(timeline: Timeline, error: String) -> Self {
        let (events, logs) = timeline.into_parts();
        Self {
            outcome: DeliveryOutcome::Failed(error),
            final_state: SessionState::Errored,
            response: Vec::new(),
            events,
            logs,
        }
    }

    pub fn success(&self) -> bool {
        !matches!(self.outcome, DeliveryOutcome::Failed(_))
    }

    /// Text reported to the caller as the delivery response.
    ///
    /// `None` for failed deliveries.
    pub fn response_text(&self) -> Option<String> {
        match self.outcome {
            DeliveryOutcome::RemoteClosed | DeliveryOutcome::RawSent => {
                Some(String::from_utf8_lossy(&self.response).into_owned())
            }
            DeliveryOutcome::CrashTriggered => Some(CRASH_TRIGGERED_RESPONSE.to_string()),
            DeliveryOutcome::AwaitingRemoteAction => Some(AWAITING_ACTION_RESPONSE.to_string()),
            DeliveryOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            DeliveryOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

// ── Timeline ──────────────────────────────────────────────────────────────────

/// Ordered record of a delivery: typed events, text log, live broadcast.
pub struct Timeline {
    broadcaster: Arc<EventBroadcaster>,
    events: Vec<DeliveryEvent>,
    logs: Vec<String>,
}

impl Timeline {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            broadcaster,
            events: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Records `event`, appends its message to the log, and publishes it.
    ///
    /// Data events are not copied into the log; [`DeliverySession`] writes
    /// dedicated capture lines for them instead.
    pub fn emit(&mut self, event: DeliveryEvent) {
        if !matches!(event, DeliveryEvent::Data { .. }) {
            self.logs.push(event.message().to_string());
        }
        self.broadcaster.publish(&event);
        self.events.push(event);
    }

    /// Appends a line to the text log only.
    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("{line}");
        self.logs.push(line);
    }

    pub fn events(&self) -> &[DeliveryEvent] {
        &self.events
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn into_parts(self) -> (Vec<DeliveryEvent>, Vec<String>) {
        (self.events, self.logs)
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One delivery attempt.  See the module docs for the state machine.
pub struct DeliverySession {
    request: DeliveryRequest,
    profile: PayloadProfile,
    state: SessionState,
    response: Vec<u8>,
    timeline: Timeline,
    session_timeout: Duration,
    frame_delay: Duration,
}

impl DeliverySession {
    pub fn new(request: DeliveryRequest, config: &DeliveryConfig, timeline: Timeline) -> Self {
        let profile = request.profile();
        Self {
            request,
            profile,
            state: SessionState::Connecting,
            response: Vec::new(),
            timeline,
            session_timeout: config.session_timeout(),
            frame_delay: config.frame_delay(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects to the device and runs the session to a terminal state.
    pub async fn run(mut self) -> DeliveryResult {
        let deadline = Instant::now() + self.session_timeout;
        let target = self.request.target;

        self.timeline.emit(DeliveryEvent::status(format!(
            "Attempting to connect to {target}..."
        )));
        self.timeline.emit(DeliveryEvent::status(format!(
            "Connection timeout set to {}ms",
            self.session_timeout.as_millis()
        )));

        let stream = match timeout_at(deadline, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.fail(SessionError::Connect(e)),
            Err(_) => {
                return self.fail(SessionError::TimedOut {
                    state: SessionState::Connecting,
                })
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on {target}: {e}");
        }

        self.drive_until(stream, deadline).await
    }

    /// Runs the session over an already-connected stream.
    ///
    /// The deadline starts now.  [`DeliverySession::run`] is the normal entry
    /// point; this exists so the protocol can be driven over any byte stream.
    pub async fn drive<S>(self, stream: S) -> DeliveryResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let deadline = Instant::now() + self.session_timeout;
        self.drive_until(stream, deadline).await
    }

    async fn drive_until<S>(mut self, mut stream: S, deadline: Instant) -> DeliveryResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let target = self.request.target;
        self.enter(SessionState::Connected);
        self.timeline.emit(DeliveryEvent::status(format!(
            "Successfully connected to {target}"
        )));
        self.timeline.emit(DeliveryEvent::status(format!(
            "File size: {} bytes",
            self.request.payload.len()
        )));

        let expectation = match self.profile {
            PayloadProfile::Raw => return self.send_raw(stream, deadline).await,
            PayloadProfile::Framed(expectation) => expectation,
        };

        // ── FRAMING_WAIT ──────────────────────────────────────────────────────
        let header = match encode_size_header(self.request.payload.len()) {
            Ok(header) => header,
            Err(e) => return self.fail(e.into()),
        };
        self.enter(SessionState::FramingWait);
        let header_hex = hex_compact(&header);
        self.timeline
            .note(format!("Size header (8 bytes, little-endian): {header_hex}"));
        self.timeline
            .emit(DeliveryEvent::status(format!("Size header: {header_hex}")));

        let written = self
            .write(&mut stream, &header, WriteStage::SizeHeader, deadline)
            .await;
        if let Err(e) = written {
            return self.fail(e);
        }
        self.timeline
            .emit(DeliveryEvent::status("Size header sent successfully"));

        // Give the device time to parse the header before the payload starts.
        if timeout_at(deadline, sleep(self.frame_delay)).await.is_err() {
            let state = self.state;
            return self.fail(SessionError::TimedOut { state });
        }

        // ── SENDING ───────────────────────────────────────────────────────────
        self.enter(SessionState::Sending);
        let written = self
            .write(&mut stream, &self.request.payload, WriteStage::Payload, deadline)
            .await;
        if let Err(e) = written {
            return self.fail(e);
        }
        self.timeline.emit(DeliveryEvent::status(format!(
            "File data sent successfully ({} bytes)",
            self.request.payload.len()
        )));

        // ── OPEN_AWAITING_CLOSE ───────────────────────────────────────────────
        self.enter(SessionState::OpenAwaitingClose);
        self.timeline.emit(DeliveryEvent::status(
            "Connection kept open, awaiting remote action",
        ));
        match expectation {
            Expectation::Response => {
                let name = self.request.payload_name.clone();
                self.timeline.emit(DeliveryEvent::status(format!(
                    "Waiting for response from {name}..."
                )));
            }
            Expectation::RemoteCrash => self.timeline.emit(DeliveryEvent::status(
                "Crash signal delivered; remote is expected to become unreachable",
            )),
            Expectation::Unspecified => {}
        }

        self.await_close(stream, expectation, deadline).await
    }

    async fn send_raw<S>(mut self, mut stream: S, deadline: Instant) -> DeliveryResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.enter(SessionState::Sending);
        self.timeline
            .emit(DeliveryEvent::status("Sending binary file data directly..."));

        let written = self
            .write(&mut stream, &self.request.payload, WriteStage::Payload, deadline)
            .await;
        if let Err(e) = written {
            return self.fail(e);
        }
        self.timeline.emit(DeliveryEvent::status(format!(
            "Binary file sent successfully ({} bytes)",
            self.request.payload.len()
        )));

        // Half-close; the relay does not wait for the device after a raw send.
        if let Ok(Err(e)) = timeout_at(deadline, stream.shutdown()).await {
            debug!("shutdown after raw send failed: {e}");
        }
        drop(stream);

        self.enter(SessionState::Closed);
        self.timeline.emit(DeliveryEvent::status("Connection closed"));
        self.finish(DeliveryOutcome::RawSent)
    }

    async fn await_close<S>(
        mut self,
        mut stream: S,
        expectation: Expectation,
        deadline: Instant,
    ) -> DeliveryResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match timeout_at(deadline, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    drop(stream);
                    self.enter(SessionState::Closed);
                    self.timeline.emit(DeliveryEvent::status("Connection closed"));
                    return self.finish(DeliveryOutcome::RemoteClosed);
                }
                Ok(Ok(n)) => self.record_chunk(&buf[..n]),
                Ok(Err(e)) => return self.fail(SessionError::Read(e)),
                Err(_) => {
                    drop(stream);
                    return self.deadline_reached(expectation);
                }
            }
        }
    }

    /// The deadline expired with the connection still open.
    fn deadline_reached(mut self, expectation: Expectation) -> DeliveryResult {
        let outcome = if expectation == Expectation::RemoteCrash {
            self.timeline
                .note("Connection timed out - remote crash confirmed");
            self.timeline.emit(DeliveryEvent::success(
                "Remote crash triggered - device stopped responding",
            ));
            DeliveryOutcome::CrashTriggered
        } else {
            self.timeline.emit(DeliveryEvent::status(
                "Connection timed out - waiting for expected remote action",
            ));
            DeliveryOutcome::AwaitingRemoteAction
        };
        self.timeline
            .note(format!("Connection state at timeout: {}", self.state));
        self.enter(SessionState::Closed);
        self.finish(outcome)
    }

    fn record_chunk(&mut self, chunk: &[u8]) {
        self.response.extend_from_slice(chunk);
        self.timeline
            .note(format!("Received data from device ({} bytes)", chunk.len()));
        self.timeline.note(format!(
            "RECEIVED [HEX]: {}",
            truncate_display(&hex_spaced(chunk), DISPLAY_LIMIT)
        ));
        self.timeline.note(format!(
            "RECEIVED [ASCII]: {}",
            truncate_display(&ascii_preview(chunk), DISPLAY_LIMIT)
        ));
        self.timeline.emit(DeliveryEvent::data(chunk));
    }

    async fn write<S>(
        &self,
        stream: &mut S,
        bytes: &[u8],
        stage: WriteStage,
        deadline: Instant,
    ) -> Result<(), SessionError>
    where
        S: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout_at(deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(SessionError::Write { stage, source }),
            Err(_) => Err(SessionError::TimedOut { state: self.state }),
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug!("session {}: {} -> {}", self.request.target, self.state, next);
        self.state = next;
    }

    fn fail(mut self, error: SessionError) -> DeliveryResult {
        let message = error.to_string();
        self.timeline.emit(DeliveryEvent::error(message.clone()));
        self.enter(SessionState::Errored);
        self.finish(DeliveryOutcome::Failed(message))
    }

    fn finish(self, outcome: DeliveryOutcome) -> DeliveryResult {
        debug!(
            "session {} finalized in {} ({:?})",
            self.request.target, self.state, outcome
        );
        let (events, logs) = self.timeline.into_parts();
        DeliveryResult {
            outcome,
            final_state: self.state,
            response: self.response,
            events,
            logs,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
