//! The typed leaves carried by a socket message.
//!
//! A decoded message is a flat `Vec<Value>`. The legacy client has no
//! notion of nested containers on the wire, so [`Value::List`] and
//! [`Value::Map`] only exist on the sending side: the encoder lowers them
//! to JSON strings, which the client parses itself.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{PlayerId, ProtocolError};

/// One value in a socket message.
///
/// `PartialEq` (not `Eq`) because of the float variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit unsigned integer.
    UInt(u32),
    /// 64-bit unsigned integer.
    ULong(u64),
    /// Boolean.
    Bool(bool),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Raw bytes (game data blobs).
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch. Sent as a 64-bit integer.
    Timestamp(i64),
    /// Ordered list. Sent as a JSON array string.
    List(Vec<Value>),
    /// String-keyed map. Sent as a JSON object string.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Serializes any serde value into a JSON string leaf.
    ///
    /// Most save replies are built this way: a typed response struct
    /// becomes one string element of the outgoing message.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ProtocolError> {
        Ok(Self::String(serde_json::to_string(value)?))
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns any integer variant widened to `i64`.
    ///
    /// The decoder picks the narrowest tag the sender used, so a field the
    /// client thinks of as "a number" may arrive as any of these.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v as i64),
            Self::Long(v) | Self::Timestamp(v) => Some(v),
            Self::UInt(v) => Some(v as i64),
            Self::ULong(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts this value into its JSON equivalent.
    ///
    /// Bytes become an array of numbers; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::String(s) => Json::String(s.clone()),
            Self::Int(v) => Json::from(*v),
            Self::Long(v) | Self::Timestamp(v) => Json::from(*v),
            Self::UInt(v) => Json::from(*v),
            Self::ULong(v) => Json::from(*v),
            Self::Bool(b) => Json::Bool(*b),
            Self::Float(v) => serde_json::Number::from_f64(*v as f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Double(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::String(v.clone())
    }
}

impl From<&PlayerId> for Value {
    fn from(v: &PlayerId) -> Self {
        Self::String(v.0.clone())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::ULong(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    /// Wraps a JSON document as a string leaf, the way the client expects
    /// nested data.
    fn from(v: serde_json::Value) -> Self {
        Self::String(v.to_string())
    }
}
