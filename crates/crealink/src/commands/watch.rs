//! `crealink watch`: stay connected and stream what changes.
//!
//! Table/plain output prints one human-readable line per event; the
//! structured formats print one compact JSON object per line.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, SecondsFormat, Utc};
use serde_json::{Value, json};

use crealink_core::{ConnectionState, PrinterSession, SessionConfig, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, dim, paint_state};

pub async fn handle(
    args: &WatchArgs,
    config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let target = format!("{}:{}", config.endpoint.host, config.endpoint.port);
    let max_attempts = config.reconnect.max_attempts;
    let printer = Printer::new(global);

    let session = PrinterSession::new(config)?;
    let mut states = session.subscribe_state();
    let mut updates = session.subscribe();
    let mut previous: Option<Arc<Snapshot>> = None;

    session.start().await;
    printer.state(*states.borrow_and_update());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut liveness = tokio::time::interval(Duration::from_secs(1));

    let result = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                printer.state(*states.borrow_and_update());
            }
            snapshot = updates.changed(), if !args.states_only => {
                let Some(snapshot) = snapshot else { break Ok(()) };
                printer.update(previous.as_deref(), &snapshot);
                previous = Some(snapshot);
            }
            _ = liveness.tick() => {
                if !session.is_running().await {
                    break Err(CliError::ConnectionFailed {
                        target: target.clone(),
                        reason: format!("gave up after {max_attempts} reconnect attempts"),
                    });
                }
            }
        }
    };

    session.stop().await;
    result
}

/// Formats events for the selected output mode.
struct Printer {
    json: Option<bool>,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn new(global: &GlobalOpts) -> Self {
        let json = match global.output {
            OutputFormat::Table | OutputFormat::Plain => None,
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
                Some(global.output == OutputFormat::Json)
            }
        };
        Self {
            json,
            color: output::should_color(global.color),
            quiet: global.quiet,
        }
    }

    fn state(&self, state: ConnectionState) {
        let line = match self.json {
            Some(pretty) => event_json("state", json!({ "state": state.to_string() }), pretty),
            None => format!("{}  {}", self.timestamp(), paint_state(state, self.color)),
        };
        output::print_output(&line, self.quiet);
    }

    fn update(&self, previous: Option<&Snapshot>, snapshot: &Snapshot) {
        let changed = changed_fields(previous, snapshot);
        if changed.is_empty() {
            return;
        }
        let line = match self.json {
            Some(pretty) => event_json("update", json!({ "fields": changed }), pretty),
            None => {
                let fields = changed
                    .iter()
                    .map(|(k, v)| format!("{}={}", dim(k, self.color), plain_value(v)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}  {fields}", self.timestamp())
            }
        };
        output::print_output(&line, self.quiet);
    }

    fn timestamp(&self) -> String {
        dim(&Local::now().format("%H:%M:%S").to_string(), self.color)
    }
}

/// Fields that are new or different since `previous` (everything when
/// there is no previous snapshot).
fn changed_fields(previous: Option<&Snapshot>, snapshot: &Snapshot) -> BTreeMap<String, Value> {
    let keys: Vec<&str> = match previous {
        Some(prev) => prev.changed_keys(snapshot),
        None => snapshot.keys().collect(),
    };
    keys.into_iter()
        .filter_map(|k| snapshot.get(k).map(|v| (k.to_owned(), v.to_json())))
        .collect()
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn event_json(kind: &str, mut body: Value, pretty: bool) -> String {
    if let Value::Object(ref mut map) = body {
        map.insert("event".into(), Value::from(kind));
        map.insert(
            "time".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }
    output::render_json(&body, !pretty).unwrap_or_default()
}
