// ── Printer model helpers ──
//
// Derived views over the raw snapshot: model inference for frames that
// don't identify the printer, temperature zone limits, and a typed
// status summary that presentation code reads instead of raw keys.

use std::fmt::Write as _;
use std::ops::RangeInclusive;

use crealink_api::protocol::HOME_ALL;
use crealink_api::{ControlMessage, InboundFrame};
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::snapshot::Snapshot;

// ── Field names ──────────────────────────────────────────────────────

/// Authoritative model-identifying fields, in order of preference.
pub const MODEL_FIELDS: [&str; 2] = ["model", "printerModel"];

/// Best-effort model label added when neither authoritative field exists.
pub const DETECTED_MODEL: &str = "detected_model";

const FALLBACK_MODEL: &str = "Creality Printer";

// ── Model inference ──────────────────────────────────────────────────

/// Guess the printer family from the port it answers on.
///
/// Returns `None` when the frame already identifies the model or the port
/// is not one of the well-known ones.
pub fn infer_model(frame: &InboundFrame, port: u16) -> Option<&'static str> {
    if MODEL_FIELDS.iter().any(|key| frame.contains_key(*key)) {
        return None;
    }
    match port {
        9999 => Some("K1 Series (FDM)"),
        18188 => Some("Halot Series (Resin)"),
        _ => None,
    }
}

/// Add `detected_model` to `frame` if [`infer_model`] has a guess. Never
/// touches the authoritative fields.
pub fn annotate_frame(frame: &mut InboundFrame, port: u16) {
    if let Some(model) = infer_model(frame, port) {
        frame.insert(DETECTED_MODEL.to_owned(), Value::from(model));
    }
}

// ── Temperature zones ────────────────────────────────────────────────

/// A heater the realtime control vocabulary can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TemperatureZone {
    Nozzle,
    Bed,
}

impl TemperatureZone {
    /// Accepted target range in °C.
    pub fn limits(self) -> RangeInclusive<u16> {
        match self {
            Self::Nozzle => 0..=300,
            Self::Bed => 0..=150,
        }
    }

    /// Snapshot field holding the measured temperature.
    pub fn current_field(self) -> &'static str {
        match self {
            Self::Nozzle => "nozzleTemp",
            Self::Bed => "bedTemp0",
        }
    }

    /// Snapshot field holding the target temperature.
    pub fn target_field(self) -> &'static str {
        match self {
            Self::Nozzle => "targetNozzleTemp",
            Self::Bed => "targetBedTemp0",
        }
    }

    /// The control message that sets this zone's target.
    pub fn control_message(self, celsius: u16) -> ControlMessage {
        match self {
            Self::Nozzle => ControlMessage::nozzle_target(celsius),
            Self::Bed => ControlMessage::bed_target(celsius),
        }
    }
}

// ── Motion axes ──────────────────────────────────────────────────────

/// A single axis for homing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// G-code instruction that homes `axis`, or every axis when `None`.
pub fn home_instruction(axis: Option<Axis>) -> String {
    match axis {
        None => HOME_ALL.to_owned(),
        Some(Axis::X) => format!("{HOME_ALL} X"),
        Some(Axis::Y) => format!("{HOME_ALL} Y"),
        Some(Axis::Z) => format!("{HOME_ALL} Z"),
    }
}

// ── PrinterStatus ────────────────────────────────────────────────────

/// Current and target temperature of one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Temperature {
    pub current: Option<f64>,
    pub target: Option<f64>,
}

/// Typed summary of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterStatus {
    pub model: String,
    pub firmware: Option<String>,
    pub hostname: Option<String>,
    pub state: Option<String>,
    pub file_name: Option<String>,
    /// Percent complete.
    pub progress: Option<f64>,
    /// `H:MM:SS`, or `N day(s), H:MM:SS` for long jobs.
    pub time_left: Option<String>,
    pub nozzle: Temperature,
    pub bed: Temperature,
    pub light: Option<bool>,
    pub fan: Option<bool>,
    pub camera_available: bool,
}

impl PrinterStatus {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let model = MODEL_FIELDS
            .iter()
            .chain(std::iter::once(&DETECTED_MODEL))
            .find_map(|key| snapshot.text(key))
            .unwrap_or(FALLBACK_MODEL)
            .to_owned();

        let time_left = ["printLeftTime", "printRemainTime"]
            .iter()
            .find_map(|key| snapshot.integer(key))
            .map(|secs| format_duration(u64::try_from(secs).unwrap_or(0)));

        Self {
            model,
            firmware: snapshot.text("modelVersion").and_then(parse_firmware),
            hostname: snapshot.text("hostname").map(str::to_owned),
            state: snapshot.get("state").map(ToString::to_string),
            file_name: snapshot
                .text("printFileName")
                .or_else(|| snapshot.text("filename"))
                .map(str::to_owned),
            progress: progress(snapshot),
            time_left,
            nozzle: temperature(snapshot, TemperatureZone::Nozzle),
            bed: temperature(snapshot, TemperatureZone::Bed),
            light: snapshot.flag("lightSw"),
            fan: snapshot.flag("fan"),
            camera_available: snapshot.integer("video") == Some(1),
        }
    }
}

fn temperature(snapshot: &Snapshot, zone: TemperatureZone) -> Temperature {
    Temperature {
        current: snapshot.number(zone.current_field()),
        target: snapshot.number(zone.target_field()),
    }
}

/// `printProgress` when reported, else the layer ratio rounded to two
/// decimal places.
fn progress(snapshot: &Snapshot) -> Option<f64> {
    if let Some(p) = snapshot.number("printProgress") {
        return Some(p);
    }
    let current = snapshot.number("curSliceLayer")?;
    let total = snapshot.number("sliceLayerCount")?;
    if total <= 0.0 {
        return None;
    }
    Some((current / total * 10_000.0).round() / 100.0)
}

/// Pull the software version out of a `modelVersion` string such as
/// `printer hw ver:;printer sw ver:;DWIN hw ver:CR4CU220812S11;DWIN sw ver:1.3.3.46;`.
///
/// Prefers the display board (`DWIN sw ver:`), then any non-empty
/// `sw ver:`, then the raw string.
pub fn parse_firmware(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let version_after = |marker: &str| {
        raw.split(';')
            .filter_map(|part| part.split_once(marker).map(|(_, v)| v.trim()))
            .find(|v| !v.is_empty())
            .map(str::to_owned)
    };

    version_after("DWIN sw ver:")
        .or_else(|| version_after("sw ver:"))
        .or_else(|| Some(raw.to_owned()))
}

/// Seconds as `H:MM:SS`, with a day prefix past 24 hours.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if days > 0 {
        let plural = if days == 1 { "" } else { "s" };
        let _ = write!(out, "{days} day{plural}, ");
    }
    let _ = write!(out, "{hours}:{minutes:02}:{seconds:02}");
    out
}
