//! Plain websocket transport to the printer.
//!
//! The device listens for unencrypted websocket connections on its LAN
//! address. [`WsConnector`] dials it with bounded connect and upgrade
//! times and splits the stream into a [`WsWriter`] and a [`WsReader`].
//!
//! ```rust,ignore
//! use crealink_api::{Connector, FrameReader, TransportConfig, WsConnector, device_url};
//!
//! let url = device_url("192.168.1.50", 9999)?;
//! let (mut writer, mut reader) = WsConnector.connect(&url, &TransportConfig::default()).await?;
//! let outcome = reader.next_frame().await;
//! ```

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::error::Error;
use crate::protocol::decode_frame;
use crate::transport::{Connector, FrameReader, FrameWriter, ReadOutcome, TransportConfig};

type Socket = WebSocketStream<TcpStream>;

// ── WsConnector ──────────────────────────────────────────────────────

/// Dials `ws://` endpoints over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Writer = WsWriter;
    type Reader = WsReader;

    async fn connect(
        &self,
        url: &Url,
        config: &TransportConfig,
    ) -> Result<(WsWriter, WsReader), Error> {
        let socket = tokio::time::timeout(config.handshake_timeout, open(url, config))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: config.handshake_timeout.as_secs(),
            })??;

        tracing::debug!(url = %url, "websocket upgraded");

        let (sink, stream) = socket.split();
        Ok((
            WsWriter {
                sink,
                write_timeout: config.write_timeout,
            },
            WsReader { stream },
        ))
    }
}

async fn open(url: &Url, config: &TransportConfig) -> Result<Socket, Error> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidEndpoint(format!("no host in {url}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::InvalidEndpoint(format!("no port in {url}")))?;

    let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| Error::ConnectTimeout {
            timeout_secs: config.connect_timeout.as_secs(),
        })?
        .map_err(|e| Error::WebSocketConnect(format!("{host}:{port}: {e}")))?;

    // Telemetry frames are small and latency matters more than batching.
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "could not set TCP_NODELAY");
    }

    let (socket, _response) = tokio_tungstenite::client_async(url.as_str(), tcp)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    Ok(socket)
}

// ── WsWriter ─────────────────────────────────────────────────────────

/// Outbound half of a device websocket.
pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
    write_timeout: Duration,
}

impl WsWriter {
    async fn send(&mut self, message: Message) -> Result<(), Error> {
        tokio::time::timeout(self.write_timeout, self.sink.send(message))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.write_timeout.as_secs(),
            })?
            .map_err(|e| Error::WebSocket(e.to_string()))
    }
}

impl FrameWriter for WsWriter {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.send(Message::text(text)).await
    }

    async fn send_ping(&mut self) -> Result<(), Error> {
        self.send(Message::Ping(Default::default())).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self.sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(Error::WebSocket(e.to_string())),
        }
    }
}

// ── WsReader ─────────────────────────────────────────────────────────

/// Inbound half of a device websocket.
pub struct WsReader {
    stream: SplitStream<Socket>,
}

impl FrameReader for WsReader {
    async fn next_frame(&mut self) -> ReadOutcome {
        classify(self.stream.next().await)
    }
}

fn classify(item: Option<Result<Message, tungstenite::Error>>) -> ReadOutcome {
    match item {
        Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
            Ok(frame) => ReadOutcome::Frame(frame),
            Err(e) => ReadOutcome::Malformed {
                reason: e.to_string(),
            },
        },
        Some(Ok(Message::Close(frame))) => match frame {
            Some(cf) => ReadOutcome::Closed {
                code: Some(u16::from(cf.code)),
                reason: cf.reason.as_str().to_owned(),
            },
            None => ReadOutcome::Closed {
                code: None,
                reason: String::new(),
            },
        },
        // tungstenite answers pings itself; all of these prove liveness
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {
            ReadOutcome::Control
        }
        Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
        | None => ReadOutcome::Closed {
            code: None,
            reason: "stream ended".into(),
        },
        Some(Err(e)) => ReadOutcome::Failed(Error::WebSocket(e.to_string())),
    }
}
