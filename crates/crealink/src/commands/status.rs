//! `crealink status`: one refresh cycle, then a summary.

use serde::Serialize;

use crealink_core::{PrinterSession, PrinterStatus, SessionConfig, Snapshot, Temperature};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, FieldRow};

#[derive(Serialize)]
struct StatusReport<'a> {
    status: &'a PrinterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a Snapshot>,
}

pub async fn handle(
    args: &StatusArgs,
    config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = PrinterSession::new(config)?;
    let snapshot = session.refresh().await?;
    let status = PrinterStatus::from_snapshot(&snapshot);

    let report = StatusReport {
        status: &status,
        fields: args.all.then_some(&*snapshot),
    };
    let out = output::render_single(global.output, &report, |r| {
        let mut rows = summary_rows(r.status);
        if let Some(fields) = r.fields {
            rows.extend(fields.iter().map(|(k, v)| FieldRow::new(k.as_str(), v.to_string())));
        }
        rows
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn summary_rows(status: &PrinterStatus) -> Vec<FieldRow> {
    vec![
        FieldRow::new("Model", status.model.as_str()),
        FieldRow::new("Firmware", or_dash(status.firmware.as_deref())),
        FieldRow::new("Hostname", or_dash(status.hostname.as_deref())),
        FieldRow::new("State", or_dash(status.state.as_deref())),
        FieldRow::new("File", or_dash(status.file_name.as_deref())),
        FieldRow::new(
            "Progress",
            status
                .progress
                .map_or_else(|| "-".into(), |p| format!("{p:.1}%")),
        ),
        FieldRow::new("Time left", or_dash(status.time_left.as_deref())),
        FieldRow::new("Nozzle", temperature(status.nozzle)),
        FieldRow::new("Bed", temperature(status.bed)),
        FieldRow::new("Light", switch(status.light)),
        FieldRow::new("Fan", switch(status.fan)),
        FieldRow::new(
            "Camera",
            if status.camera_available { "yes" } else { "no" },
        ),
    ]
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

fn temperature(t: Temperature) -> String {
    match (t.current, t.target) {
        (Some(current), Some(target)) => format!("{current:.1} °C -> {target:.0} °C"),
        (Some(current), None) => format!("{current:.1} °C"),
        (None, Some(target)) => format!("-> {target:.0} °C"),
        (None, None) => "-".into(),
    }
}

fn switch(state: Option<bool>) -> String {
    match state {
        Some(true) => "on".into(),
        Some(false) => "off".into(),
        None => "-".into(),
    }
}
