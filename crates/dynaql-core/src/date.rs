//! Date parsing and storage conversion.
//!
//! Date attributes are stored as numbers: milliseconds by default, seconds
//! for [`DateFormat::Epoch`]. Input may be a date value, an ISO string, a year,
//! or a numeric timestamp (as a number or a numeric string).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use dynaql_model::Value;
use serde::{Deserialize, Serialize};

use crate::error::MapperError;

/// Largest absolute timestamp a date may hold, in milliseconds.
const MAX_TIMESTAMP_MS: f64 = 8.64e15;

/// Storage format of a date attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateFormat {
    /// Milliseconds since the Unix epoch.
    #[default]
    #[serde(rename = "timestamp", alias = "TIMESTAMP")]
    Timestamp,
    /// Seconds since the Unix epoch.
    #[serde(rename = "EPOCH", alias = "epoch")]
    Epoch,
}

impl DateFormat {
    /// Parse a declared format name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("epoch") {
            Some(Self::Epoch)
        } else if name.eq_ignore_ascii_case("timestamp") {
            Some(Self::Timestamp)
        } else {
            None
        }
    }

    /// Convert milliseconds to the stored number.
    #[must_use]
    pub fn to_storage(self, millis: i64) -> i64 {
        match self {
            Self::Timestamp => millis,
            Self::Epoch => millis.div_euclid(1000),
        }
    }

    /// Convert a stored number back to milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_storage(self, stored: f64) -> Option<i64> {
        let millis = match self {
            Self::Timestamp => stored,
            Self::Epoch => stored * 1000.0,
        };
        (millis.is_finite() && millis.abs() <= MAX_TIMESTAMP_MS).then_some(millis.trunc() as i64)
    }

    fn unit_lengths(self) -> [f64; 5] {
        match self {
            Self::Epoch => [3.154e7, 2.628e6, 86_400.0, 3_600.0, 60.0],
            Self::Timestamp => [3.154e10, 2.628e9, 8.64e7, 3.6e6, 60_000.0],
        }
    }
}

/// Milliseconds since the epoch for `value`, or `None` when it is not a date.
#[must_use]
pub fn timestamp(format: DateFormat, value: &Value) -> Option<i64> {
    match value {
        Value::Date(d) => Some(d.timestamp_millis()),
        Value::String(s) => parse_date_string(format, s),
        Value::Number(n) => number_timestamp(format, *n),
        _ => None,
    }
}

/// The stored form of a date value, or `None` when it is not a date.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_storage_value(format: DateFormat, value: &Value) -> Option<Value> {
    timestamp(format, value).map(|ms| Value::Number(format.to_storage(ms) as f64))
}

/// Build a date value from milliseconds.
#[must_use]
pub fn date_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[allow(clippy::cast_possible_truncation)]
fn number_timestamp(format: DateFormat, n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }
    let floored = n.floor();
    if format == DateFormat::Epoch && (floored as i64).to_string().len() == 10 {
        return Some(floored as i64 * 1000);
    }
    (n.abs() <= MAX_TIMESTAMP_MS).then_some(n.trunc() as i64)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_date_string(format: DateFormat, s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if !n.is_finite() {
            return None;
        }
        if s.len() == 10 && format == DateFormat::Epoch {
            return Some(n.floor() as i64 * 1000);
        }
        if s.len() == 4 {
            return year_start(n as i32);
        }
        return (n.abs() <= MAX_TIMESTAMP_MS).then_some(n.trunc() as i64);
    }
    parse_iso(trimmed)
}

fn year_start(year: i32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_iso(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Net change described by a `$date` update (`{year: {$incr: 1}, day:
/// {$decr: 2}}`), in the unit of `format`, floored.
///
/// # Errors
///
/// Fails when `spec` is not a map, names an unknown unit, or a unit is not
/// `{$incr: n}` / `{$decr: n}`.
#[allow(clippy::cast_possible_truncation)]
pub fn date_change(format: DateFormat, spec: &Value) -> Result<i64, MapperError> {
    const UNITS: [&str; 5] = ["year", "month", "day", "hour", "minute"];

    let Some(units) = spec.as_map() else {
        return Err(MapperError::configuration(format!(
            "$date expects an object of {}. Received: {}",
            UNITS.join(", "),
            spec.kind_name()
        )));
    };
    let lengths = format.unit_lengths();
    let mut total = 0.0;

    for (unit, op) in units {
        let Some(idx) = UNITS.iter().position(|u| u == unit) else {
            return Err(MapperError::configuration(format!(
                "Unknown $date unit '{unit}'. Allowed units: {}",
                UNITS.join(", ")
            )));
        };
        let (sign, amount) = match (op.get("$incr").as_f64(), op.get("$decr").as_f64()) {
            (Some(n), _) => (1.0, n),
            (None, Some(n)) => (-1.0, n),
            (None, None) => {
                return Err(MapperError::configuration(format!(
                    "$date > '{unit}' must be {{$incr: number}} or {{$decr: number}}"
                )));
            }
        };
        total += sign * amount * lengths[idx];
    }

    Ok(total.floor() as i64)
}
