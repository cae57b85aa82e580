// ── Typed snapshot values ──
//
// Printer telemetry is a flat bag of heterogeneous JSON fields. Numbers
// frequently arrive as strings ("201.52"), so the numeric accessors accept
// both.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// One telemetry value with an explicit kind tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Short name of the value kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric value, parsing numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integral value, parsing integral text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Switch value. The firmware reports switches as 0/1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            other => other.as_i64().map(|n| n != 0),
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Back to untyped JSON.
    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::Text(s) => Value::String(s),
            FieldValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FieldValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("-"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_text_reads_as_number() {
        let v = FieldValue::from("201.52");
        assert_eq!(v.kind(), "text");
        assert!((v.as_f64().unwrap() - 201.52).abs() < f64::EPSILON);
        assert_eq!(FieldValue::from(" 7 ").as_i64(), Some(7));
    }

    #[test]
    fn switches_read_as_bool() {
        assert_eq!(FieldValue::from(1_i64).as_bool(), Some(true));
        assert_eq!(FieldValue::from(0_i64).as_bool(), Some(false));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from("on").as_bool(), None);
    }

    #[test]
    fn nested_json_is_tagged() {
        let v = FieldValue::from(json!({ "num": 0, "val": [1, "a", null] }));
        let map = v.as_map().unwrap();
        assert_eq!(map["num"].kind(), "number");
        assert!(matches!(&map["val"], FieldValue::List(items) if items.len() == 3));
        assert_eq!(v.to_json(), json!({ "num": 0, "val": [1, "a", null] }));
    }

    #[test]
    fn untagged_serde_matches_plain_json() {
        let v: FieldValue = serde_json::from_value(json!({ "a": 1.5, "b": "x" })).unwrap();
        assert_eq!(v.kind(), "map");
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({ "a": 1.5, "b": "x" }));
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(FieldValue::Null.to_string(), "-");
        assert_eq!(FieldValue::from("K1").to_string(), "K1");
        assert_eq!(FieldValue::from(42_i64).to_string(), "42");
    }
}
