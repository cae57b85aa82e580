// ── Fused device snapshot ──
//
// The cumulative view of every telemetry field seen in a session, plus
// the store that owns it and the subscription types consumers use.

mod store;
mod value;

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::Serialize;
use serde_json::Value;

pub use store::{ObserverId, SnapshotObserver, SnapshotStore, SnapshotStream, SnapshotWatchStream};
pub use value::FieldValue;

/// Field name to typed value. Keys are unique; order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Text field. Null and non-text values read as absent.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Numeric field, accepting numeric text.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_f64)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_i64)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FieldValue::as_bool)
    }

    /// Overwrite or add every field in `update`. Existing keys that are
    /// absent from `update` are kept.
    pub fn merge(&mut self, update: impl IntoIterator<Item = (String, FieldValue)>) {
        self.fields.extend(update);
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Keys whose value differs between `self` and `newer`, including keys
    /// only present in `newer`.
    pub fn changed_keys<'a>(&self, newer: &'a Snapshot) -> Vec<&'a str> {
        newer
            .fields
            .iter()
            .filter(|(k, v)| self.fields.get(*k) != Some(*v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Back to an untyped JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, FieldValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<serde_json::Map<String, Value>> for Snapshot {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(k, v)| (k, FieldValue::from(v)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
