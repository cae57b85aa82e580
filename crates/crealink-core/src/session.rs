// ── Printer session ──
//
// The facade a presentation layer talks to. Wires one persistent channel,
// one fallback poller and one dispatcher around a shared snapshot store,
// and runs the periodic update driver.

use std::sync::Arc;

use crealink_api::{Connector, ControlMessage, WsConnector};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::PersistentChannel;
use crate::config::SessionConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::fallback::FallbackPoller;
use crate::model::{Axis, TemperatureZone};
use crate::snapshot::{ObserverId, Snapshot, SnapshotObserver, SnapshotStore, SnapshotStream};
use crate::state::ConnectionState;

/// One printer, end to end. Cheaply cloneable; clones share everything.
pub struct PrinterSession<C: Connector = WsConnector> {
    inner: Arc<SessionInner<C>>,
}

impl<C: Connector> Clone for PrinterSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<C: Connector> {
    config: SessionConfig,
    store: Arc<SnapshotStore>,
    channel: Arc<PersistentChannel<C>>,
    fallback: FallbackPoller<C>,
    dispatcher: CommandDispatcher<C>,
    last_update_success: watch::Sender<bool>,
    driver: Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl PrinterSession<WsConnector> {
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector + Clone> PrinterSession<C> {
    pub fn with_connector(connector: C, config: SessionConfig) -> Result<Self, CoreError> {
        let store = Arc::new(SnapshotStore::new());
        let channel = Arc::new(PersistentChannel::with_connector(
            connector.clone(),
            &config,
            Arc::clone(&store),
        )?);
        let fallback = FallbackPoller::with_connector(connector, &config)?;
        let (last_update_success, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                store,
                channel,
                fallback,
                dispatcher: CommandDispatcher::new(),
                last_update_success,
                driver: Mutex::new(None),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the persistent channel and the update driver. Each part is
    /// only launched if it is not already running, so calling this again
    /// after the channel gave up reconnecting starts a fresh drive loop.
    pub async fn start(&self) {
        let mut driver = self.inner.driver.lock().await;

        self.inner.channel.start().await;
        self.inner.dispatcher.attach(Arc::clone(&self.inner.channel));

        if driver.as_ref().is_some_and(|(handle, _)| !handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(update_driver(self.clone(), cancel.clone()));
        *driver = Some((handle, cancel));

        tracing::info!(
            host = %self.inner.config.endpoint.host,
            port = self.inner.config.endpoint.port,
            "printer session started"
        );
    }

    /// Stop the update driver and the channel, waiting for both to exit.
    pub async fn stop(&self) {
        let driver = self.inner.driver.lock().await.take();
        if let Some((handle, cancel)) = driver {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "update driver task failed");
            }
        }

        self.inner.dispatcher.detach();
        self.inner.channel.stop().await;
        tracing::debug!(host = %self.inner.config.endpoint.host, "printer session stopped");
    }

    // ── Update cycle ─────────────────────────────────────────────────

    /// One consumer-facing update. Returns the live snapshot when the
    /// channel is healthy, otherwise fetches one frame over a fresh
    /// connection and merges it.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, CoreError> {
        if self.inner.channel.check_health() {
            if let Some(snapshot) = self.inner.store.current() {
                return Ok(snapshot);
            }
        }

        tracing::debug!(
            state = %self.inner.channel.connection_state(),
            "channel not healthy, polling once"
        );
        self.inner.fallback.poll_into(&self.inner.store).await
    }

    /// Outcome of the most recent driver cycle.
    pub fn last_update_success(&self) -> watch::Receiver<bool> {
        self.inner.last_update_success.subscribe()
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn is_healthy(&self) -> bool {
        self.inner.channel.is_healthy()
    }

    /// Whether the channel is still trying. `false` once stopped or once
    /// the reconnect budget is spent.
    pub async fn is_running(&self) -> bool {
        self.inner.channel.is_running().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.channel.connection_state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.channel.subscribe_state()
    }

    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.store.current()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn register_observer(&self, observer: Arc<dyn SnapshotObserver>) -> ObserverId {
        self.inner.store.register_observer(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.inner.store.unregister_observer(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn send_instruction(&self, name: &str) -> bool {
        self.inner.dispatcher.send_instruction(name).await
    }

    pub async fn send_structured(&self, message: ControlMessage) -> bool {
        self.inner.dispatcher.send_structured(message).await
    }

    pub async fn send_temperature(&self, zone: TemperatureZone, celsius: u16) -> bool {
        self.inner.dispatcher.send_temperature(zone, celsius).await
    }

    pub async fn set_light(&self, on: bool) -> bool {
        self.inner.dispatcher.set_light(on).await
    }

    pub async fn set_fan(&self, on: bool) -> bool {
        self.inner.dispatcher.set_fan(on).await
    }

    pub async fn pause_print(&self) -> bool {
        self.inner.dispatcher.pause_print().await
    }

    pub async fn stop_print(&self) -> bool {
        self.inner.dispatcher.stop_print().await
    }

    pub async fn home(&self, axis: Option<Axis>) -> bool {
        self.inner.dispatcher.home(axis).await
    }

    pub async fn emergency_stop(&self) -> bool {
        self.inner.dispatcher.emergency_stop().await
    }
}

/// Calls `refresh()` every `update_interval` and publishes the outcome.
async fn update_driver<C: Connector + Clone>(session: PrinterSession<C>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(session.inner.config.update_interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ok = match session.refresh().await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "periodic update failed");
                        false
                    }
                };
                session.inner.last_update_success.send_replace(ok);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::test_support::{FakeConnector, session_config};

    fn session(connector: &FakeConnector) -> PrinterSession<FakeConnector> {
        PrinterSession::with_connector(connector.clone(), session_config(9999)).unwrap()
    }

    #[derive(Default)]
    struct Counter {
        seen: AtomicUsize,
    }

    impl SnapshotObserver for Counter {
        fn on_snapshot(&self, _snapshot: &Arc<Snapshot>) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_without_channel_polls_once() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        device.push(json!({ "nozzleTemp": 24, "model": "K1" }));
        let session = session(&connector);

        let snapshot = session.refresh().await.unwrap();
        assert_eq!(snapshot.text("model"), Some("K1"));
        assert_eq!(session.current_snapshot().unwrap().len(), 2);
        assert_eq!(connector.attempts(), 1);
        assert!(!session.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_surfaces_fallback_failure() {
        let connector = FakeConnector::new();
        let session = session(&connector);

        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, CoreError::UpdateFailed { .. }));
        assert!(session.current_snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_refresh_reuses_live_snapshot() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        let session = session(&connector);
        let mut updates = session.subscribe();

        session.start().await;
        device.push(json!({ "bedTemp0": 55 }));
        updates.changed().await.unwrap();

        let snapshot = session.refresh().await.unwrap();
        assert_eq!(snapshot.integer("bedTemp0"), Some(55));
        assert_eq!(connector.attempts(), 1);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn driver_publishes_update_outcome() {
        let connector = FakeConnector::new();
        let _live = connector.accept();
        let session = session(&connector);
        let mut outcome = session.last_update_success();

        session.start().await;
        session
            .subscribe_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        // Connected but no data yet: the first cycle polls, and the poll
        // is refused because nothing else is queued.
        outcome.changed().await.unwrap();
        assert!(!*outcome.borrow_and_update());

        let polled = connector.accept();
        polled.push(json!({ "state": 1 }));
        outcome.wait_for(|ok| *ok).await.unwrap();
        assert_eq!(session.current_snapshot().unwrap().integer("state"), Some(1));

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_every_mutation() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        let session = session(&connector);
        let counter = Arc::new(Counter::default());
        let id = session.register_observer(Arc::clone(&counter) as Arc<dyn SnapshotObserver>);
        let mut updates = session.subscribe();

        session.start().await;
        device.push(json!({ "a": 1 }));
        updates.changed().await.unwrap();
        device.push(json!({ "b": 2 }));
        updates.changed().await.unwrap();
        assert_eq!(counter.seen.load(Ordering::SeqCst), 2);

        assert!(session.unregister_observer(id));
        device.push(json!({ "c": 3 }));
        updates.changed().await.unwrap();
        assert_eq!(counter.seen.load(Ordering::SeqCst), 2);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn commands_follow_session_lifecycle() {
        let connector = FakeConnector::new();
        let mut device = connector.accept();
        let session = session(&connector);

        assert!(!session.pause_print().await);

        session.start().await;
        session
            .subscribe_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        device.next_text().await;

        assert!(session.set_fan(true).await);
        assert_eq!(device.next_text().await["params"]["fan"], 1);

        session.stop().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(!session.set_fan(false).await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_relaunches_channel_after_exhaustion() {
        let connector = FakeConnector::new();
        let session = session(&connector);

        session.start().await;
        while session.is_running().await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);

        let mut device = connector.accept();
        session.start().await;
        assert!(session.is_running().await);
        session
            .subscribe_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        assert_eq!(device.next_text().await["cmd"], "GET_PRINT_STATUS");
        assert!(session.pause_print().await);

        session.stop().await;
    }
}
