//! Wire frames exchanged with the printer.
//!
//! One JSON object per websocket text frame, in both directions:
//!
//! - instruction: `{"cmd": "GET_PRINT_STATUS", "token": "<token>"}`
//! - realtime control: `{"method": "set", "params": {"lightSw": 1}}` (no token)
//! - inbound telemetry: an arbitrary object of device fields

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Error;

// ── Instruction names ────────────────────────────────────────────────

/// Ask the device to push its full status.
pub const GET_PRINT_STATUS: &str = "GET_PRINT_STATUS";
/// Toggle pause/resume of the running job.
pub const PRINT_PAUSE: &str = "PRINT_PAUSE";
/// Abort the running job.
pub const PRINT_STOP: &str = "PRINT_STOP";
/// G-code: home all axes. K1-series firmware runs G-code sent as `cmd`.
pub const HOME_ALL: &str = "G28";
/// G-code: emergency stop. The firmware halts and needs a restart.
pub const EMERGENCY_STOP: &str = "M112";

/// A decoded inbound telemetry frame.
pub type InboundFrame = Map<String, Value>;

// ── ControlMessage ───────────────────────────────────────────────────

/// Structured realtime control message, sent verbatim without a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub method: String,
    pub params: Map<String, Value>,
}

impl ControlMessage {
    /// `{"method": "set", "params": params}`
    pub fn set(params: Map<String, Value>) -> Self {
        Self {
            method: "set".into(),
            params,
        }
    }

    /// Set a single device field.
    pub fn set_field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut params = Map::new();
        params.insert(field.into(), value.into());
        Self::set(params)
    }

    /// Nozzle target temperature in °C.
    pub fn nozzle_target(celsius: u16) -> Self {
        Self::set_field("nozzleTempControl", celsius)
    }

    /// Bed target temperature in °C. The bed takes a zone index alongside
    /// the value; single-zone beds use zone 0.
    pub fn bed_target(celsius: u16) -> Self {
        Self::set_field("bedTempControl", json!({ "num": 0, "val": celsius }))
    }

    pub fn light(on: bool) -> Self {
        Self::set_field("lightSw", u8::from(on))
    }

    pub fn fan(on: bool) -> Self {
        Self::set_field("fan", u8::from(on))
    }
}

// ── OutboundFrame ────────────────────────────────────────────────────

/// Every frame we ever write to the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    /// Named instruction, authenticated with a token.
    Instruction { cmd: String, token: String },
    /// Realtime control message.
    Control(ControlMessage),
}

impl OutboundFrame {
    pub fn instruction(cmd: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Instruction {
            cmd: cmd.into(),
            token: token.into(),
        }
    }

    /// Serialize to the text payload of a single websocket frame.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<ControlMessage> for OutboundFrame {
    fn from(msg: ControlMessage) -> Self {
        Self::Control(msg)
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode an inbound text frame. Anything other than a JSON object is a
/// protocol error; the caller decides whether that is fatal (it never is
/// for the streaming loop).
pub fn decode_frame(text: &str) -> Result<InboundFrame, Error> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Deserialization {
            message: format!("expected a JSON object, got {}", json_kind(&other)),
            body: text.to_owned(),
        }),
        Err(e) => Err(Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn instruction_frame_shape() {
        let frame = OutboundFrame::instruction(GET_PRINT_STATUS, "rEewAogVblw=");
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "cmd": "GET_PRINT_STATUS", "token": "rEewAogVblw=" })
        );
    }

    #[test]
    fn control_frame_has_no_token() {
        let frame = OutboundFrame::from(ControlMessage::light(true));
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "method": "set", "params": { "lightSw": 1 } }));
        assert!(value.get("token").is_none());
    }

    #[test]
    fn temperature_zones_use_distinct_shapes() {
        let nozzle = serde_json::to_value(ControlMessage::nozzle_target(210)).unwrap();
        let bed = serde_json::to_value(ControlMessage::bed_target(60)).unwrap();

        assert_eq!(
            nozzle,
            json!({ "method": "set", "params": { "nozzleTempControl": 210 } })
        );
        assert_eq!(
            bed,
            json!({ "method": "set", "params": { "bedTempControl": { "num": 0, "val": 60 } } })
        );
    }

    #[test]
    fn fan_off_is_zero() {
        let value = serde_json::to_value(ControlMessage::fan(false)).unwrap();
        assert_eq!(value["params"]["fan"], 0);
    }

    #[test]
    fn decode_object_frame() {
        let frame = decode_frame(r#"{"nozzleTemp": 200, "state": 1}"#).unwrap();
        assert_eq!(frame["nozzleTemp"], 200);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = decode_frame("[1, 2, 3]").unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_frame("ok").unwrap_err();
        assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "ok"));
    }
}
