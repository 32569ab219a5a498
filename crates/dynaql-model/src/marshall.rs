//! Conversion between native values and wire attribute values.

use indexmap::IndexMap;

use crate::attribute_value::{AttributeValue, Item};
use crate::value::{MAX_SAFE_INTEGER, Value, format_number};

/// Options for [`marshall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshallOptions {
    /// Drop undefined map entries and list elements instead of failing.
    pub remove_undefined_values: bool,
}

impl Default for MarshallOptions {
    fn default() -> Self {
        Self {
            remove_undefined_values: true,
        }
    }
}

/// Errors raised while marshalling.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarshallError {
    /// An undefined value with `remove_undefined_values` off.
    #[error("Pass options.removeUndefinedValues=true to remove undefined values from map/array/set.")]
    Undefined,
    /// `NaN` or an infinite number.
    #[error("Number {0} is not a valid stored number.")]
    InvalidNumber(String),
    /// A set with no members.
    #[error("Cannot store an empty set.")]
    EmptySet,
    /// A set whose members differ in kind.
    #[error("Only Set of numbers, strings or binary is supported, got {0}.")]
    MixedSet(String),
    /// A top-level value that is not a map.
    #[error("Expected an object to marshall as an item, got {0}.")]
    NotAnItem(&'static str),
}

/// Marshall a single native value.
///
/// Dates are written as epoch milliseconds. Undefined values return `Ok(None)`
/// when `remove_undefined_values` is set.
///
/// # Errors
///
/// See [`MarshallError`].
pub fn marshall(
    value: &Value,
    options: MarshallOptions,
) -> Result<Option<AttributeValue>, MarshallError> {
    let av = match value {
        Value::Undefined => {
            return if options.remove_undefined_values {
                Ok(None)
            } else {
                Err(MarshallError::Undefined)
            };
        }
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(number_string(*n)?),
        Value::BigInt(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Binary(b) => AttributeValue::B(b.clone()),
        Value::Date(d) => AttributeValue::N(d.timestamp_millis().to_string()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(av) = marshall(item, options)? {
                    out.push(av);
                }
            }
            AttributeValue::L(out)
        }
        Value::Map(m) => AttributeValue::M(marshall_map(m, options)?),
        Value::Set(members) => marshall_set(members, options)?,
    };
    Ok(Some(av))
}

/// Marshall a map value into an item.
///
/// # Errors
///
/// Fails when `value` is not a map or a member fails to marshall.
pub fn marshall_item(value: &Value, options: MarshallOptions) -> Result<Item, MarshallError> {
    match value {
        Value::Map(m) => marshall_map(m, options),
        other => Err(MarshallError::NotAnItem(other.kind_name())),
    }
}

fn marshall_map(
    m: &IndexMap<String, Value>,
    options: MarshallOptions,
) -> Result<Item, MarshallError> {
    let mut out = IndexMap::with_capacity(m.len());
    for (k, v) in m {
        if let Some(av) = marshall(v, options)? {
            out.insert(k.clone(), av);
        }
    }
    Ok(out)
}

fn marshall_set(members: &[Value], options: MarshallOptions) -> Result<AttributeValue, MarshallError> {
    let members: Vec<&Value> = members
        .iter()
        .filter(|v| !(options.remove_undefined_values && v.is_undefined()))
        .collect();
    if members.is_empty() {
        return Err(MarshallError::EmptySet);
    }
    if members
        .iter()
        .all(|v| matches!(v, Value::Number(_) | Value::BigInt(_) | Value::Date(_)))
    {
        let ns = members
            .iter()
            .map(|v| match v {
                Value::Number(n) => number_string(*n),
                Value::BigInt(n) => Ok(n.to_string()),
                Value::Date(d) => Ok(d.timestamp_millis().to_string()),
                _ => unreachable!("filtered above"),
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(AttributeValue::Ns(ns));
    }
    if let Some(ss) = members
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(AttributeValue::Ss(ss));
    }
    if let Some(bs) = members
        .iter()
        .map(|v| match v {
            Value::Binary(b) => Some(b.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        return Ok(AttributeValue::Bs(bs));
    }
    Err(MarshallError::MixedSet(
        members
            .iter()
            .map(|v| v.kind_name())
            .collect::<Vec<_>>()
            .join(", "),
    ))
}

fn number_string(n: f64) -> Result<String, MarshallError> {
    if n.is_finite() {
        Ok(format_number(n))
    } else {
        Err(MarshallError::InvalidNumber(n.to_string()))
    }
}

/// Unmarshall a wire value into a native value.
///
/// Integer strings beyond the exact `f64` range come back as `BigInt`.
#[must_use]
pub fn unmarshall(av: &AttributeValue) -> Value {
    match av {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::B(b) => Value::Binary(b.clone()),
        AttributeValue::Ss(v) => Value::Set(v.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(v) => Value::Set(v.iter().map(|n| parse_number(n)).collect()),
        AttributeValue::Bs(v) => Value::Set(v.iter().cloned().map(Value::Binary).collect()),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::List(items.iter().map(unmarshall).collect()),
        AttributeValue::M(m) => Value::Map(unmarshall_map(m)),
    }
}

/// Unmarshall an item into a map value.
#[must_use]
pub fn unmarshall_item(item: &Item) -> Value {
    Value::Map(unmarshall_map(item))
}

fn unmarshall_map(m: &IndexMap<String, AttributeValue>) -> IndexMap<String, Value> {
    m.iter().map(|(k, v)| (k.clone(), unmarshall(v))).collect()
}

fn parse_number(n: &str) -> Value {
    let float = n.parse::<f64>().unwrap_or(f64::NAN);
    if float.abs() > MAX_SAFE_INTEGER {
        if let Ok(big) = n.parse::<i128>() {
            return Value::BigInt(big);
        }
    }
    Value::Number(float)
}
