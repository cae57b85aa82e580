#![allow(clippy::unwrap_used)]
// End-to-end session tests against a loopback websocket printer.

use std::time::Duration;

use crealink_core::{
    ConnectionState, CoreError, Endpoint, PrinterSession, SessionConfig, TemperatureZone,
};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

/// A printer that answers every `GET_PRINT_STATUS` with `status` and
/// forwards every text frame it receives. Accepts any number of clients.
async fn fake_printer(status: Value) -> (u16, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let tx = tx.clone();
            let status = status.to_string();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    if value["cmd"] == "GET_PRINT_STATUS" {
                        let _ = ws.send(Message::text(status.clone())).await;
                    }
                    let _ = tx.send(value);
                }
            });
        }
    });

    (port, rx)
}

fn config(port: u16, password: &str) -> SessionConfig {
    SessionConfig::new(Endpoint::new(
        "127.0.0.1",
        port,
        SecretString::from(password.to_owned()),
    ))
}

async fn next_sent(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn live_session_streams_and_sends() {
    let (port, mut sent) = fake_printer(json!({
        "nozzleTemp": "25.1",
        "bedTemp0": "23.0",
        "model": "K1C",
    }))
    .await;
    let session = PrinterSession::new(config(port, "secret")).unwrap();
    let mut updates = session.subscribe();

    session.start().await;

    assert_eq!(
        next_sent(&mut sent).await,
        json!({ "cmd": "GET_PRINT_STATUS", "token": "4KIYoPUDGFs=" })
    );
    let snapshot = tokio::time::timeout(WAIT, updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.text("model"), Some("K1C"));
    assert!(!snapshot.contains_key("detected_model"));
    assert!(session.is_healthy());
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    assert!(session.send_temperature(TemperatureZone::Bed, 65).await);
    assert_eq!(
        next_sent(&mut sent).await,
        json!({ "method": "set", "params": { "bedTempControl": { "num": 0, "val": 65 } } })
    );

    assert!(session.pause_print().await);
    assert_eq!(
        next_sent(&mut sent).await,
        json!({ "cmd": "PRINT_PAUSE", "token": "4KIYoPUDGFs=" })
    );

    session.stop().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(!session.is_healthy());
    assert!(!session.stop_print().await);
}

#[tokio::test]
async fn refresh_falls_back_to_one_shot_poll() {
    let (port, mut sent) = fake_printer(json!({ "printProgress": 42, "state": 1 })).await;
    let session = PrinterSession::new(config(port, "")).unwrap();

    let snapshot = session.refresh().await.unwrap();
    assert_eq!(snapshot.integer("printProgress"), Some(42));
    assert_eq!(
        next_sent(&mut sent).await,
        json!({ "cmd": "GET_PRINT_STATUS", "token": "rEewAogVblw=" })
    );
    assert_eq!(session.store().version(), 1);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn refresh_against_dead_port_is_update_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let session = PrinterSession::new(config(port, "")).unwrap();

    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::UpdateFailed { .. }), "{err:?}");
    assert!(session.current_snapshot().is_none());
}
