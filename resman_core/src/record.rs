//! Resource records and identifiers
//!
//! A [`ResourceRecord`] is an opaque JSON object owned by the server. Once
//! persisted it carries an `id`; a record created optimistically carries a
//! client-generated temporary id until the server assigns the real one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Field holding a record's identifier
pub const ID_FIELD: &str = "id";

/// Reserved string form of temporary ids inside records
pub const TEMP_ID_PREFIX: &str = "__tmp_";

/// Identifier of a resource record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum RecordId {
    /// Numeric server-assigned id
    Num(i64),
    /// String server-assigned id
    Str(String),
    /// Client-generated placeholder
    Temp(u64),
}

impl RecordId {
    /// Parse an id from its JSON form
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Num),
            Value::String(s) => Some(
                s.strip_prefix(TEMP_ID_PREFIX)
                    .and_then(|n| n.parse().ok())
                    .map(Self::Temp)
                    .unwrap_or_else(|| Self::Str(s.clone())),
            ),
            _ => None,
        }
    }

    /// JSON form of this id
    pub fn to_json(&self) -> Value {
        match self {
            Self::Num(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.as_str()),
            Self::Temp(n) => Value::from(format!("{TEMP_ID_PREFIX}{n}")),
        }
    }

    /// Whether this id was generated on the client
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Temp(n) => write!(f, "{TEMP_ID_PREFIX}{n}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Num(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        Self::Num(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::from_json(&Value::from(id)).unwrap_or_else(|| Self::Str(id.to_string()))
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self::from(id.as_str())
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        id.to_json()
    }
}

impl TryFrom<Value> for RecordId {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value).ok_or_else(|| format!("not a record id: {value}"))
    }
}

/// Issues temporary ids unique within one engine
///
/// Ids come from a monotonic counter, so concurrent creates never collide.
#[derive(Debug)]
pub struct TempIdGenerator {
    next: AtomicU64,
}

impl TempIdGenerator {
    /// Create a generator starting at 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Issue the next temporary id
    pub fn next_id(&self) -> RecordId {
        RecordId::Temp(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TempIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque, resource-type-specific payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord(Map<String, Value>);

impl ResourceRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value; only objects are records
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Identifier of this record, if it has one
    pub fn id(&self) -> Option<RecordId> {
        self.0.get(ID_FIELD).and_then(RecordId::from_json)
    }

    /// Whether this record is identified by `id`
    pub fn has_id(&self, id: &RecordId) -> bool {
        self.id().as_ref() == Some(id)
    }

    /// Replace the identifier
    pub fn set_id(&mut self, id: &RecordId) {
        self.0.insert(ID_FIELD.to_string(), id.to_json());
    }

    /// Builder-style [`set_id`](Self::set_id)
    pub fn with_id(mut self, id: &RecordId) -> Self {
        self.set_id(id);
        self
    }

    /// Read a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Write a field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Shallow-merge `patch` into this record; the id is never overwritten
    pub fn merge(&mut self, patch: &ResourceRecord) {
        for (field, value) in &patch.0 {
            if field != ID_FIELD {
                self.0.insert(field.clone(), value.clone());
            }
        }
    }

    /// Field names in this record
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether the record holds no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ResourceRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
