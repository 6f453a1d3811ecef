//! The logical value tree.
//!
//! [`Value`] is what a caller means, independent of the widths chosen on the wire.
//! [`crate::Builder::add_value`] encodes one, [`crate::reader::Reference::to_value`]
//! decodes one.

use serde::Serialize;
use std::collections::BTreeMap;

/// A decoded (or to be encoded) value.
///
/// Maps are ordered by key bytes, which is also the order keys are stored in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Float of any width.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Ordered list. Typed and fixed vectors decode to this as well.
    Vector(Vec<Value>),
    /// Keyed entries.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a map from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the map entries, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the elements, if this is a vector.
    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Vector(v)
    }
}
