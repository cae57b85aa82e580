// ── Fallback poller ──
//
// One-shot connection used when the persistent channel is unhealthy:
// open, ask for status, take one frame, close. Shares nothing with the
// persistent channel except the snapshot store it merges into.

use std::sync::Arc;
use std::time::Duration;

use crealink_api::protocol::GET_PRINT_STATUS;
use crealink_api::{
    Connector, Error, FrameReader, FrameWriter, InboundFrame, OutboundFrame, ReadOutcome,
    TransportConfig, WsConnector, generate_token,
};
use secrecy::ExposeSecret;
use url::Url;

use crate::config::{Endpoint, SessionConfig};
use crate::error::CoreError;
use crate::model::annotate_frame;
use crate::snapshot::{FieldValue, Snapshot, SnapshotStore};

pub struct FallbackPoller<C: Connector = WsConnector> {
    connector: C,
    endpoint: Endpoint,
    url: Url,
    transport: TransportConfig,
    timeout: Duration,
}

impl FallbackPoller<WsConnector> {
    pub fn new(config: &SessionConfig) -> Result<Self, CoreError> {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector> FallbackPoller<C> {
    pub fn with_connector(connector: C, config: &SessionConfig) -> Result<Self, CoreError> {
        Ok(Self {
            connector,
            url: config.endpoint.url()?,
            endpoint: config.endpoint.clone(),
            transport: config.transport.clone(),
            timeout: config.fallback_timeout,
        })
    }

    /// Fetch one status frame, with model inference applied.
    ///
    /// Every failure (refused, timeout, malformed or empty response) is an
    /// [`CoreError::UpdateFailed`].
    pub async fn poll(&self) -> Result<InboundFrame, CoreError> {
        tracing::debug!(url = %self.url, "fallback poll");

        let mut frame = tokio::time::timeout(self.timeout, self.fetch())
            .await
            .map_err(|_| CoreError::UpdateFailed {
                reason: format!("no status from printer within {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| CoreError::UpdateFailed {
                reason: e.to_string(),
            })?;

        if frame.is_empty() {
            return Err(CoreError::UpdateFailed {
                reason: "printer returned an empty status".into(),
            });
        }

        annotate_frame(&mut frame, self.endpoint.port);
        Ok(frame)
    }

    /// [`poll`](Self::poll), then merge into `store` the same way streamed
    /// frames are merged.
    pub async fn poll_into(&self, store: &SnapshotStore) -> Result<Arc<Snapshot>, CoreError> {
        let frame = self.poll().await?;
        store
            .apply(frame.into_iter().map(|(k, v)| (k, FieldValue::from(v))))
            .ok_or_else(|| CoreError::UpdateFailed {
                reason: "printer returned an empty status".into(),
            })
    }

    async fn fetch(&self) -> Result<InboundFrame, Error> {
        let (mut writer, mut reader) = self.connector.connect(&self.url, &self.transport).await?;

        let result = exchange(
            &mut writer,
            &mut reader,
            &self.endpoint,
            self.transport.receive_timeout,
        )
        .await;

        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "error closing fallback socket");
        }
        result
    }
}

async fn exchange<W: FrameWriter, R: FrameReader>(
    writer: &mut W,
    reader: &mut R,
    endpoint: &Endpoint,
    receive_timeout: Duration,
) -> Result<InboundFrame, Error> {
    let token = generate_token(endpoint.password.expose_secret());
    writer
        .send_text(OutboundFrame::instruction(GET_PRINT_STATUS, token).encode()?)
        .await?;

    loop {
        match reader.next_frame().await {
            ReadOutcome::Frame(frame) => return Ok(frame),
            ReadOutcome::Control => {}
            ReadOutcome::Malformed { reason } => {
                return Err(Error::Deserialization {
                    message: reason,
                    body: String::new(),
                });
            }
            other => {
                return Err(other.into_error(receive_timeout).unwrap_or_else(|| {
                    Error::WebSocket("connection ended before a status frame".into())
                }));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::test_support::{FakeConnector, Sent, session_config};

    fn poller(connector: &FakeConnector, port: u16) -> FallbackPoller<FakeConnector> {
        FallbackPoller::with_connector(connector.clone(), &session_config(port)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_one_frame_and_closes() {
        let connector = FakeConnector::new();
        let mut device = connector.accept();
        device.push(json!({ "nozzleTemp": 25, "model": "K1C" }));

        let frame = poller(&connector, 9999).poll().await.unwrap();
        assert_eq!(frame["nozzleTemp"], 25);
        assert!(!frame.contains_key("detected_model"));

        let sent = device.drain();
        assert_eq!(
            sent.first().and_then(Sent::json),
            Some(json!({ "cmd": "GET_PRINT_STATUS", "token": "rEewAogVblw=" }))
        );
        assert_eq!(sent.last(), Some(&Sent::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn applies_model_inference() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        device.push(json!({ "state": 0 }));

        let frame = poller(&connector, 18188).poll().await.unwrap();
        assert_eq!(frame["detected_model"], "Halot Series (Resin)");
    }

    #[tokio::test(start_paused = true)]
    async fn merges_into_existing_snapshot() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        device.push(json!({ "bedTemp0": 60 }));

        let store = SnapshotStore::new();
        store.apply([("nozzleTemp".to_owned(), FieldValue::from(200_i64))]);

        let snapshot = poller(&connector, 80).poll_into(&store).await.unwrap();
        assert_eq!(snapshot.to_json(), json!({ "nozzleTemp": 200, "bedTemp0": 60 }));
        assert_eq!(store.version(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_is_update_failure() {
        let connector = FakeConnector::new();
        let store = SnapshotStore::new();

        let err = poller(&connector, 9999).poll_into(&store).await.unwrap_err();
        assert!(matches!(err, CoreError::UpdateFailed { .. }));
        assert!(store.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_after_fallback_bound() {
        let connector = FakeConnector::new();
        let _device = connector.accept();

        let started = Instant::now();
        let err = poller(&connector, 9999).poll().await.unwrap_err();
        assert!(matches!(err, CoreError::UpdateFailed { ref reason } if reason.contains("10s")));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_update_failure() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        device.push_malformed();

        let err = poller(&connector, 9999).poll().await.unwrap_err();
        assert!(matches!(err, CoreError::UpdateFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_is_update_failure() {
        let connector = FakeConnector::new();
        let device = connector.accept();
        device.push(json!({}));

        let err = poller(&connector, 9999).poll().await.unwrap_err();
        assert!(matches!(err, CoreError::UpdateFailed { .. }));
    }
}
