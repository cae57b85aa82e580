// Transport seam between the session logic and the socket.
//
// The persistent channel and the fallback poller only ever talk to a
// `Connector` and the reader/writer halves it hands out. The websocket
// implementation lives in `crate::websocket`; tests substitute an
// in-memory one.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::error::Error;
use crate::protocol::InboundFrame;

/// Timeouts and keepalive for one physical connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on the TCP connect alone. Default: 10s.
    pub connect_timeout: Duration,
    /// Bound on connect plus websocket upgrade. Default: 15s.
    pub handshake_timeout: Duration,
    /// Idle ceiling: the socket is considered dead when nothing at all
    /// (data or control) arrives for this long. Default: 60s.
    pub receive_timeout: Duration,
    /// Interval between keepalive pings. Default: 20s.
    pub heartbeat_interval: Duration,
    /// Bound on a single outbound frame. Default: 10s.
    pub write_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(15),
            receive_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(20),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// `ws://host:port/`
pub fn device_url(host: &str, port: u16) -> Result<Url, Error> {
    let url = Url::parse(&format!("ws://{host}:{port}/"))?;
    if url.host_str().is_none() {
        return Err(Error::InvalidEndpoint(format!("no host in {url}")));
    }
    Ok(url)
}

// ── Read results ─────────────────────────────────────────────────────

/// What a single read produced.
///
/// Timeouts, protocol errors and connection loss are distinct outcomes
/// rather than errors to unwind through, so the state machine can react
/// to each explicitly.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A decoded telemetry object.
    Frame(InboundFrame),
    /// A text frame whose body was not a JSON object.
    Malformed { reason: String },
    /// Ping, pong, or a frame type we ignore. Proves the socket is alive.
    Control,
    /// The peer closed the socket (close frame or end of stream).
    Closed { code: Option<u16>, reason: String },
    /// Nothing arrived before the idle deadline.
    TimedOut,
    /// Socket-level failure.
    Failed(Error),
}

impl ReadOutcome {
    /// Whether the message loop must end after this outcome.
    pub fn ends_loop(&self) -> bool {
        matches!(
            self,
            Self::Closed { .. } | Self::TimedOut | Self::Failed(_)
        )
    }

    /// Convert a loop-ending outcome into the error that drives backoff.
    pub fn into_error(self, receive_timeout: Duration) -> Option<Error> {
        match self {
            Self::Closed { code, reason } => Some(Error::WebSocketClosed {
                code: code.unwrap_or(1006),
                reason,
            }),
            Self::TimedOut => Some(Error::Timeout {
                timeout_secs: receive_timeout.as_secs(),
            }),
            Self::Failed(e) => Some(e),
            Self::Frame(_) | Self::Malformed { .. } | Self::Control => None,
        }
    }
}

// ── Seam traits ──────────────────────────────────────────────────────

/// Opens physical connections to a device.
pub trait Connector: Send + Sync + 'static {
    type Writer: FrameWriter;
    type Reader: FrameReader;

    /// Open a connection, honouring the connect and handshake bounds in
    /// `config`.
    fn connect(
        &self,
        url: &Url,
        config: &TransportConfig,
    ) -> impl Future<Output = Result<(Self::Writer, Self::Reader), Error>> + Send;
}

/// Inbound half of a connection.
pub trait FrameReader: Send + 'static {
    /// Wait for the next message. Must be cancel-safe: dropping the future
    /// before completion loses nothing.
    fn next_frame(&mut self) -> impl Future<Output = ReadOutcome> + Send;
}

/// Outbound half of a connection.
pub trait FrameWriter: Send + 'static {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), Error>> + Send;

    fn send_ping(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Read the next message, giving up at the absolute `deadline`.
///
/// Cancel-safe as long as the reader is: callers can race this against a
/// heartbeat tick and re-issue it with the same deadline.
pub async fn read_until<R: FrameReader>(reader: &mut R, deadline: Instant) -> ReadOutcome {
    tokio::select! {
        biased;
        outcome = reader.next_frame() => outcome,
        () = tokio::time::sleep_until(deadline) => ReadOutcome::TimedOut,
    }
}
