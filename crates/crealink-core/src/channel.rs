// ── Persistent channel ──
//
// Owns one socket at a time and drives connect -> stream -> detect
// failure -> backoff -> reconnect until shutdown. Sole writer of the
// connection state; sole reader of the wire.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use crealink_api::protocol::GET_PRINT_STATUS;
use crealink_api::{
    Connector, ControlMessage, Error, FrameWriter, InboundFrame, OutboundFrame, ReadOutcome,
    TransportConfig, WsConnector, generate_token, read_until,
};
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backoff::{ReconnectConfig, ReconnectPolicy};
use crate::config::{Endpoint, SessionConfig};
use crate::error::CoreError;
use crate::model::annotate_frame;
use crate::snapshot::{FieldValue, SnapshotStore};
use crate::state::{ConnectionState, StateMachine};

/// Long-lived connection to one printer.
///
/// `start()` spawns the drive loop; `stop()` cancels it and waits for it
/// to finish. All other methods are cheap and may be called from any task.
pub struct PersistentChannel<C: Connector = WsConnector> {
    inner: Arc<ChannelInner<C>>,
    task: Mutex<Option<DriveTask>>,
}

struct DriveTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

struct ChannelInner<C: Connector> {
    connector: C,
    endpoint: Endpoint,
    url: Url,
    transport: TransportConfig,
    reconnect: ReconnectConfig,
    stale_threshold: Duration,
    state: StateMachine,
    store: Arc<SnapshotStore>,
    writer: Mutex<Option<C::Writer>>,
    /// Last decoded data frame (or connect time). Drives staleness only;
    /// pongs do not count.
    last_message: ArcSwap<Instant>,
}

impl PersistentChannel<WsConnector> {
    /// Websocket channel for `config.endpoint`.
    pub fn new(config: &SessionConfig, store: Arc<SnapshotStore>) -> Result<Self, CoreError> {
        Self::with_connector(WsConnector, config, store)
    }
}

impl<C: Connector> PersistentChannel<C> {
    pub fn with_connector(
        connector: C,
        config: &SessionConfig,
        store: Arc<SnapshotStore>,
    ) -> Result<Self, CoreError> {
        let url = config.endpoint.url()?;
        Ok(Self {
            inner: Arc::new(ChannelInner {
                connector,
                endpoint: config.endpoint.clone(),
                url,
                transport: config.transport.clone(),
                reconnect: config.reconnect.clone(),
                stale_threshold: config.stale_threshold,
                state: StateMachine::new(),
                store,
                writer: Mutex::new(None),
                last_message: ArcSwap::from_pointee(Instant::now()),
            }),
            task: Mutex::new(None),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Launch the drive loop. No-op if one is already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                tracing::debug!(url = %self.inner.url, "channel already running");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(Arc::clone(&self.inner), cancel.clone()));
        *task = Some(DriveTask { handle, cancel });
    }

    /// Cancel the drive loop, wait for it to exit, and close any open
    /// socket. Safe to call when never started.
    pub async fn stop(&self) {
        let task = self.task.lock().await.take();
        if let Some(DriveTask { handle, cancel }) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "drive loop ended abnormally");
            }
        }
        self.inner.close_writer().await;
        self.inner.state.transition(ConnectionState::Disconnected);
    }

    /// Whether a drive loop is alive. `false` after `stop()` and after the
    /// reconnect budget is exhausted.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    // ── Health ───────────────────────────────────────────────────────

    /// `Connected` and heard from within the staleness threshold. Pure read.
    pub fn is_healthy(&self) -> bool {
        self.inner.state.current() == ConnectionState::Connected && !self.inner.is_stale()
    }

    /// Like [`is_healthy`](Self::is_healthy), but also performs the
    /// `Connected -> Stale` transition when the threshold has passed.
    pub(crate) fn check_health(&self) -> bool {
        if self.inner.state.current() == ConnectionState::Connected && self.inner.is_stale() {
            // A frame may land between the check above and the move; the
            // guard re-reads the clock with the state held.
            if self.inner.state.transition_from_when(
                ConnectionState::Connected,
                ConnectionState::Stale,
                || self.inner.is_stale(),
            ) {
                tracing::warn!(
                    url = %self.inner.url,
                    silent_secs = self.inner.last_message_age().as_secs(),
                    "no data from printer, marking connection stale"
                );
            }
            return false;
        }
        self.is_healthy()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Time since the last data frame (or since connecting).
    pub fn last_message_age(&self) -> Duration {
        self.inner.last_message_age()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a named instruction with a fresh token. `false` without any
    /// write if not `Connected`, or if the write fails. Never retried.
    pub async fn send_command(&self, instruction: &str) -> bool {
        self.inner.send_command(instruction).await
    }

    /// Send a realtime control message as-is, without a token.
    pub async fn send_raw(&self, message: ControlMessage) -> bool {
        self.inner.send(OutboundFrame::from(message)).await
    }
}

// ── Drive loop ───────────────────────────────────────────────────────

/// Main loop: connect -> stream -> on error, backoff -> reconnect.
async fn drive<C: Connector>(inner: Arc<ChannelInner<C>>, cancel: CancellationToken) {
    let mut policy = ReconnectPolicy::new(inner.reconnect.clone());

    loop {
        let err = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            err = inner.run_connection(&mut policy) => err,
        };

        inner.close_writer().await;
        inner.state.transition(ConnectionState::Disconnected);
        if cancel.is_cancelled() {
            break;
        }
        tracing::warn!(url = %inner.url, error = %err, attempt = policy.attempts(), "printer connection lost");

        let Some(delay) = policy.next_delay() else {
            tracing::error!(
                url = %inner.url,
                max_attempts = policy.config().max_attempts,
                "reconnect attempts exhausted, giving up"
            );
            break;
        };

        inner.state.transition(ConnectionState::Reconnecting);
        tracing::info!(
            attempt = policy.attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    inner.close_writer().await;
    inner.state.transition(ConnectionState::Disconnected);
    tracing::debug!(url = %inner.url, "drive loop exiting");
}

impl<C: Connector> ChannelInner<C> {
    /// Connect and stream until the connection fails. Returns why.
    async fn run_connection(&self, policy: &mut ReconnectPolicy) -> Error {
        self.state.transition(ConnectionState::Connecting);
        tracing::info!(url = %self.url, "connecting to printer");

        let (writer, mut reader) = match self.connector.connect(&self.url, &self.transport).await {
            Ok(pair) => pair,
            Err(e) => return e,
        };

        policy.reset();
        self.touch();
        *self.writer.lock().await = Some(writer);
        self.state.transition(ConnectionState::Connected);

        if !self.send_command(GET_PRINT_STATUS).await {
            tracing::warn!("initial status request failed");
        }

        self.message_loop(&mut reader).await
    }

    /// Read frames until the socket closes, errors or goes idle. Pings the
    /// device on every heartbeat tick.
    async fn message_loop(&self, reader: &mut C::Reader) -> Error {
        let idle = self.transport.receive_timeout;
        let period = self.transport.heartbeat_interval;

        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = Instant::now() + idle;

        loop {
            tokio::select! {
                biased;
                outcome = read_until(reader, deadline) => match outcome {
                    ReadOutcome::Frame(frame) => {
                        deadline = Instant::now() + idle;
                        self.on_frame(frame);
                    }
                    ReadOutcome::Malformed { reason } => {
                        deadline = Instant::now() + idle;
                        tracing::warn!(%reason, "skipping malformed frame");
                    }
                    ReadOutcome::Control => {
                        deadline = Instant::now() + idle;
                        tracing::trace!("control frame");
                    }
                    ReadOutcome::Closed { code, reason } => {
                        tracing::info!(?code, %reason, "printer closed the connection");
                        return Error::WebSocketClosed {
                            code: code.unwrap_or(1006),
                            reason,
                        };
                    }
                    ReadOutcome::TimedOut => {
                        return Error::Timeout {
                            timeout_secs: idle.as_secs(),
                        };
                    }
                    ReadOutcome::Failed(e) => return e,
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = self.ping().await {
                        return e;
                    }
                }
            }
        }
    }

    /// Fusion step for one decoded frame.
    fn on_frame(&self, mut frame: InboundFrame) {
        self.touch();
        self.state
            .transition_from(ConnectionState::Stale, ConnectionState::Connected);

        if frame.is_empty() {
            tracing::trace!("empty frame");
            return;
        }
        annotate_frame(&mut frame, self.endpoint.port);
        self.store
            .apply(frame.into_iter().map(|(k, v)| (k, FieldValue::from(v))));
    }

    // ── Staleness clock ──────────────────────────────────────────────

    fn touch(&self) {
        self.last_message.store(Arc::new(Instant::now()));
    }

    fn last_message_age(&self) -> Duration {
        Instant::now().saturating_duration_since(**self.last_message.load())
    }

    fn is_stale(&self) -> bool {
        self.last_message_age() > self.stale_threshold
    }

    // ── Writes ───────────────────────────────────────────────────────

    async fn send_command(&self, instruction: &str) -> bool {
        let token = generate_token(self.endpoint.password.expose_secret());
        self.send(OutboundFrame::instruction(instruction, token)).await
    }

    async fn send(&self, frame: OutboundFrame) -> bool {
        let state = self.state.current();
        if state != ConnectionState::Connected {
            tracing::debug!(%state, "not connected, dropping command");
            return false;
        }

        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode command");
                return false;
            }
        };

        let write = async {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(w) => w.send_text(text).await,
                None => Err(Error::WebSocket("no open socket".into())),
            }
        };

        match tokio::time::timeout(self.transport.write_timeout, write).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "command write failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.transport.write_timeout.as_secs(),
                    "command write timed out"
                );
                false
            }
        }
    }

    async fn ping(&self) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        if let Some(w) = writer.as_mut() {
            tracing::trace!("heartbeat ping");
            tokio::time::timeout(self.transport.write_timeout, w.send_ping())
                .await
                .map_err(|_| Error::Timeout {
                    timeout_secs: self.transport.write_timeout.as_secs(),
                })??;
        }
        Ok(())
    }

    async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut w) = writer {
            match tokio::time::timeout(self.transport.write_timeout, w.close()).await {
                Ok(Ok(())) => tracing::debug!("socket closed"),
                Ok(Err(e)) => tracing::debug!(error = %e, "error while closing socket"),
                Err(_) => tracing::debug!("timed out closing socket"),
            }
        }
    }
}
