//! Mapper configuration.
//!
//! Provides [`MapperConfig`], shared by every [`Model`](crate::model::Model)
//! built from it. Values can be loaded from environment variables.

use dynaql_model::MarshallOptions;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Mapper configuration.
///
/// # Examples
///
/// ```
/// use dynaql_core::config::MapperConfig;
///
/// let config = MapperConfig::default();
/// assert!(config.remove_undefined_values);
/// assert_eq!(config.default_read_capacity, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    /// Drop undefined values while marshalling instead of failing.
    #[builder(default = true)]
    pub remove_undefined_values: bool,

    /// Read capacity used for secondary indexes declared without one.
    #[builder(default = 1)]
    pub default_read_capacity: i64,

    /// Write capacity used for secondary indexes declared without one.
    #[builder(default = 1)]
    pub default_write_capacity: i64,

    /// Log every compiled expression at `trace` level.
    #[builder(default = false)]
    pub trace_expressions: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            remove_undefined_values: true,
            default_read_capacity: 1,
            default_write_capacity: 1,
            trace_expressions: false,
        }
    }
}

impl MapperConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAQL_REMOVE_UNDEFINED_VALUES` | `true` |
    /// | `DYNAQL_DEFAULT_READ_CAPACITY` | `1` |
    /// | `DYNAQL_DEFAULT_WRITE_CAPACITY` | `1` |
    /// | `DYNAQL_TRACE_EXPRESSIONS` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNAQL_REMOVE_UNDEFINED_VALUES") {
            config.remove_undefined_values = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DYNAQL_DEFAULT_READ_CAPACITY") {
            if let Ok(n) = v.parse::<i64>() {
                config.default_read_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("DYNAQL_DEFAULT_WRITE_CAPACITY") {
            if let Ok(n) = v.parse::<i64>() {
                config.default_write_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("DYNAQL_TRACE_EXPRESSIONS") {
            config.trace_expressions = parse_bool(&v);
        }

        config
    }

    /// Marshaller options derived from this configuration.
    #[must_use]
    pub fn marshall_options(&self) -> MarshallOptions {
        MarshallOptions {
            remove_undefined_values: self.remove_undefined_values,
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
