use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::AquaError;

/// One observation exactly as the store delivered it.
///
/// Nothing about the contents is guaranteed: any field may be missing,
/// `null`, blank, a string instead of a number, or physically implausible.
/// The optional `key` is the record's path segment in the store (the probes
/// write under `/r/<seconds-since-boot>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Path segment the record was stored under, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Field map.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Build a record from a field map.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self { key: None, fields }
    }

    /// Build a record stored under `key`.
    pub fn with_key(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: Some(key.into()),
            fields,
        }
    }

    /// Build a record from an arbitrary JSON value.
    ///
    /// Non-object values carry no usable fields and yield an empty record.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Self::default(),
        }
    }

    /// Split a store node keyed by path segment (`{"1712": {...}, "1713": {...}}`)
    /// into records, keeping each child's key.
    #[must_use]
    pub fn from_keyed_node(node: &Value) -> Vec<Self> {
        match node {
            Value::Object(children) => children
                .iter()
                .map(|(key, child)| match child {
                    Value::Object(fields) => Self::with_key(key.clone(), fields.clone()),
                    _ => Self::with_key(key.clone(), Map::new()),
                })
                .collect(),
            Value::Array(items) => items.iter().cloned().map(Self::from_value).collect(),
            _ => Vec::new(),
        }
    }

    /// Decode a whole store snapshot node.
    ///
    /// An absent node (`null`) is an empty store. Keyed objects and arrays are
    /// split as in [`from_keyed_node`](Self::from_keyed_node); anything else
    /// cannot hold records.
    ///
    /// # Errors
    /// Returns `MalformedSnapshot` for scalar nodes.
    pub fn try_from_snapshot(node: &Value) -> Result<Vec<Self>, AquaError> {
        match node {
            Value::Null => Ok(Vec::new()),
            Value::Object(_) | Value::Array(_) => Ok(Self::from_keyed_node(node)),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Err(
                AquaError::malformed_snapshot(format!("expected keyed records, got {node}")),
            ),
        }
    }

    /// Look up a raw field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// First field among `keys` that carries a non-empty value.
    ///
    /// `null` and blank strings count as absent.
    #[must_use]
    pub fn first_present<'a>(&'a self, keys: &[&str]) -> Option<(&'a str, &'a Value)> {
        keys.iter().find_map(|k| {
            self.fields
                .get_key_value(*k)
                .filter(|(_, v)| is_present(v))
                .map(|(name, v)| (name.as_str(), v))
        })
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}
