// Live readings domain model
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Wire sentinel the plant uses for a point whose read failed
const ERROR_SENTINEL: &str = "Error";

/// Last observed value of one data point
#[derive(Debug, Clone, PartialEq)]
pub enum LiveValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
    Error,
}

impl LiveValue {
    /// Convert a JSON scalar. Arrays and objects are not live values.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(LiveValue::Null),
            Value::Bool(b) => Some(LiveValue::Bool(b)),
            Value::Number(n) => n.as_f64().map(LiveValue::Number),
            Value::String(s) if s == ERROR_SENTINEL => Some(LiveValue::Error),
            Value::String(s) => Some(LiveValue::Text(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            LiveValue::Text(s) => Value::String(s.clone()),
            LiveValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            LiveValue::Bool(b) => Value::Bool(*b),
            LiveValue::Null => Value::Null,
            LiveValue::Error => Value::String(ERROR_SENTINEL.to_string()),
        }
    }
}

impl Serialize for LiveValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataFormatError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("value for '{0}' is not a scalar")]
    NonScalarValue(String),
}

/// Parse one inbound frame into identifier/value pairs
pub fn parse_frame(text: &str) -> Result<Vec<(String, LiveValue)>, DataFormatError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DataFormatError::InvalidJson(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(DataFormatError::NotAnObject);
    };

    map.into_iter()
        .map(|(id, raw)| match LiveValue::from_json(raw) {
            Some(v) => Ok((id, v)),
            None => Err(DataFormatError::NonScalarValue(id)),
        })
        .collect()
}

/// Encode an outbound command as a single-pair JSON object
pub fn encode_command(identifier: &str, value: &LiveValue) -> String {
    let mut map = Map::with_capacity(1);
    map.insert(identifier.to_string(), value.to_json());
    Value::Object(map).to_string()
}

/// Immutable snapshot of the latest value per data point.
///
/// Cloning is cheap. Merging produces a new snapshot when the current one
/// is shared, so readers holding a clone never see it change underneath them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveValueStore {
    values: Arc<HashMap<String, LiveValue>>,
}

impl LiveValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&LiveValue> {
        self.values.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shallow merge, last write wins per identifier
    pub fn merge<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, LiveValue)>,
    {
        let values = Arc::make_mut(&mut self.values);
        for (id, value) in pairs {
            values.insert(id, value);
        }
    }

    pub fn clear(&mut self) {
        self.values = Arc::new(HashMap::new());
    }

    /// True when both handles point at the same snapshot
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl Serialize for LiveValueStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.as_ref().serialize(serializer)
    }
}
