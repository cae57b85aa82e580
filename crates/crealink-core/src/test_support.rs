// In-memory `Connector` for driving the channel under paused time.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crealink_api::{Connector, Error, FrameReader, FrameWriter, ReadOutcome, TransportConfig};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::config::{Endpoint, SessionConfig};

/// What the fake device saw from the client.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Text(String),
    Ping,
    Close,
}

impl Sent {
    pub(crate) fn json(&self) -> Option<Value> {
        match self {
            Self::Text(text) => serde_json::from_str(text).ok(),
            Self::Ping | Self::Close => None,
        }
    }
}

enum Plan {
    Refuse,
    Accept(FakeWriter, FakeReader),
}

/// Scripted connector: each `connect` consumes the next plan; with no plan
/// left the connection is refused.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    plans: Arc<Mutex<VecDeque<Plan>>>,
    attempts: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse(&self) {
        self.plans.lock().unwrap().push_back(Plan::Refuse);
    }

    /// Queue a connection that answers every ping with a pong.
    pub(crate) fn accept(&self) -> FakeDevice {
        self.queue_link(true)
    }

    /// Queue a connection that never answers pings.
    pub(crate) fn accept_silent(&self) -> FakeDevice {
        self.queue_link(false)
    }

    fn queue_link(&self, answer_pings: bool) -> FakeDevice {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer = FakeWriter {
            out: out_tx,
            pong: answer_pings.then(|| in_tx.clone()),
        };
        let reader = FakeReader { rx: in_rx };
        self.plans
            .lock()
            .unwrap()
            .push_back(Plan::Accept(writer, reader));
        FakeDevice {
            inbound: in_tx,
            outbound: out_rx,
        }
    }
}

impl Connector for FakeConnector {
    type Writer = FakeWriter;
    type Reader = FakeReader;

    async fn connect(
        &self,
        _url: &Url,
        _config: &TransportConfig,
    ) -> Result<(FakeWriter, FakeReader), Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let plan = self.plans.lock().unwrap().pop_front();
        match plan {
            Some(Plan::Accept(writer, reader)) => Ok((writer, reader)),
            Some(Plan::Refuse) | None => Err(Error::WebSocketConnect("connection refused".into())),
        }
    }
}

pub(crate) struct FakeWriter {
    out: mpsc::UnboundedSender<Sent>,
    pong: Option<mpsc::UnboundedSender<ReadOutcome>>,
}

impl FrameWriter for FakeWriter {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.out
            .send(Sent::Text(text))
            .map_err(|_| Error::WebSocket("device gone".into()))
    }

    async fn send_ping(&mut self) -> Result<(), Error> {
        let _ = self.out.send(Sent::Ping);
        if let Some(pong) = &self.pong {
            let _ = pong.send(ReadOutcome::Control);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error> {
        let _ = self.out.send(Sent::Close);
        Ok(())
    }
}

pub(crate) struct FakeReader {
    rx: mpsc::UnboundedReceiver<ReadOutcome>,
}

impl FrameReader for FakeReader {
    async fn next_frame(&mut self) -> ReadOutcome {
        match self.rx.recv().await {
            Some(outcome) => outcome,
            None => ReadOutcome::Closed {
                code: None,
                reason: "fake device dropped".into(),
            },
        }
    }
}

/// The device end of one accepted connection.
pub(crate) struct FakeDevice {
    inbound: mpsc::UnboundedSender<ReadOutcome>,
    pub(crate) outbound: mpsc::UnboundedReceiver<Sent>,
}

impl FakeDevice {
    /// Push a telemetry object to the client.
    pub(crate) fn push(&self, value: Value) {
        let Value::Object(frame) = value else {
            panic!("telemetry must be an object");
        };
        self.inbound.send(ReadOutcome::Frame(frame)).unwrap();
    }

    pub(crate) fn push_malformed(&self) {
        self.inbound
            .send(ReadOutcome::Malformed {
                reason: "not json".into(),
            })
            .unwrap();
    }

    pub(crate) fn close(&self) {
        self.inbound
            .send(ReadOutcome::Closed {
                code: Some(1001),
                reason: "going away".into(),
            })
            .unwrap();
    }

    /// Next text frame the client sent, skipping pings.
    pub(crate) async fn next_text(&mut self) -> Value {
        loop {
            match self.outbound.recv().await {
                Some(sent @ Sent::Text(_)) => return sent.json().unwrap(),
                Some(_) => {}
                None => panic!("client writer dropped"),
            }
        }
    }

    /// Everything sent so far, without waiting.
    pub(crate) fn drain(&mut self) -> Vec<Sent> {
        let mut out = Vec::new();
        while let Ok(sent) = self.outbound.try_recv() {
            out.push(sent);
        }
        out
    }
}

pub(crate) fn session_config(port: u16) -> SessionConfig {
    SessionConfig::new(Endpoint::new(
        "printer.test",
        port,
        SecretString::from(String::new()),
    ))
}
