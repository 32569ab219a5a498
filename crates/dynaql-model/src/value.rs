//! Native value tree used by applications.
//!
//! `Value` is what callers put in and get back: ordered maps, ordered lists,
//! sets and scalars. It distinguishes an absent attribute (`Undefined`) from a
//! stored `Null`, and keeps dates and big integers as their own variants so the
//! schema can decide how they are stored.

use std::fmt;

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::types::AttributeKind;

/// Largest integer an `f64` represents exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A native value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent. Never stored.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Floating point number.
    Number(f64),
    /// Integer beyond the exact `f64` range.
    BigInt(i128),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Binary(Bytes),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Ordered list.
    List(Vec<Value>),
    /// Ordered map.
    Map(IndexMap<String, Value>),
    /// Set of scalars of one kind.
    Set(Vec<Value>),
}

impl Value {
    /// Build an empty map.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(IndexMap::new())
    }

    /// Build a set from anything convertible into values.
    #[must_use]
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Set(items.into_iter().map(Into::into).collect())
    }

    /// The storage kind of this value, or `None` when it has none
    /// (undefined, `NaN`, a set mixing member kinds).
    ///
    /// Dates are stored as numbers, so a date reports `N`.
    #[must_use]
    pub fn kind(&self) -> Option<AttributeKind> {
        match self {
            Self::Undefined => None,
            Self::Null => Some(AttributeKind::Null),
            Self::Bool(_) => Some(AttributeKind::Bool),
            Self::Number(n) if n.is_nan() => None,
            Self::Number(_) | Self::BigInt(_) | Self::Date(_) => Some(AttributeKind::N),
            Self::String(_) => Some(AttributeKind::S),
            Self::Binary(_) => Some(AttributeKind::B),
            Self::List(_) => Some(AttributeKind::L),
            Self::Map(_) => Some(AttributeKind::M),
            Self::Set(items) => set_kind(items),
        }
    }

    /// Name of the storage kind for messages, `"undefined"` when there is none.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Number(n) if n.is_nan() => "NaN",
            Self::Set(items) if set_kind(items).is_none() => "Multi-type Set instance",
            other => other.kind().map_or("undefined", |k| k.as_str()),
        }
    }

    /// Returns `false` for undefined, null, `false`, zero, `NaN` and the
    /// empty string.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::BigInt(n) => *n != 0,
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Returns `true` if the value is absent.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` if the value is a map.
    #[must_use]
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns the string if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number as `f64` for `Number` and `BigInt`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::BigInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the map if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the mutable map if this is a `Map`.
    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the elements if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the members if this is a `Set`.
    #[must_use]
    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Map lookup; `Undefined` when absent or when this is not a map.
    #[must_use]
    pub fn get(&self, key: &str) -> &Value {
        static UNDEFINED: Value = Value::Undefined;
        self.as_map().and_then(|m| m.get(key)).unwrap_or(&UNDEFINED)
    }

    /// Convert into plain JSON. Binary becomes base64, dates become RFC 3339,
    /// sets become arrays and undefined map entries are dropped.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Undefined | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, |num| {
                if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                    #[allow(clippy::cast_possible_truncation)]
                    Json::from(*n as i64)
                } else {
                    Json::Number(num)
                }
            }),
            Self::BigInt(n) => i64::try_from(*n).map_or_else(|_| Json::String(n.to_string()), Json::from),
            Self::String(s) => Json::String(s.clone()),
            Self::Binary(b) => Json::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Self::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::List(items) | Self::Set(items) => {
                Json::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(m) => Json::Object(
                m.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn set_kind(items: &[Value]) -> Option<AttributeKind> {
    if items
        .iter()
        .all(|v| matches!(v, Value::Number(n) if !n.is_nan()) || matches!(v, Value::BigInt(_)))
    {
        Some(AttributeKind::Ns)
    } else if items.iter().all(|v| matches!(v, Value::String(_))) {
        Some(AttributeKind::Ss)
    } else if items.iter().all(|v| matches!(v, Value::Binary(_))) {
        Some(AttributeKind::Bs)
    } else if items.iter().all(|v| matches!(v, Value::Date(_))) {
        Some(AttributeKind::Ns)
    } else {
        None
    }
}

/// Format a number the way the wire expects: integers without a fraction,
/// everything else in shortest round-trip form.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::BigInt(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::List(items) | Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        if (n as f64).abs() <= MAX_SAFE_INTEGER {
            Self::Number(n as f64)
        } else {
            Self::BigInt(i128::from(n))
        }
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Self::BigInt(n)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Self::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::from(i),
                (None, Some(f)) => Self::Number(f),
                (None, None) => n
                    .as_u64()
                    .map_or(Self::Number(f64::NAN), |u| Self::BigInt(i128::from(u))),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(m) => Self::Map(m.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}
