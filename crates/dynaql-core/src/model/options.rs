//! Per-call options of [`Model`](super::Model) operations.

use dynaql_model::Value;
use dynaql_model::types::{
    ReturnConsumedCapacity, ReturnItemCollectionMetrics, ReturnValue,
    ReturnValuesOnConditionCheckFailure, Select,
};
use typed_builder::TypedBuilder;

use crate::error::MapperError;
use crate::expression::{AttributePath, ExpressionAttributes};

/// What a read returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Only these attribute paths, as a projection expression.
    Paths(Vec<String>),
    /// Only the number of matching items.
    Count,
    /// Every attribute.
    All,
    /// Every attribute projected into the queried index.
    Projected,
}

impl Selection {
    /// A projection of `paths`.
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Paths(paths.into_iter().map(Into::into).collect())
    }

    /// The `Select` value for the non-projection forms.
    #[must_use]
    pub fn as_select(&self) -> Option<Select> {
        match self {
            Self::Paths(_) => None,
            Self::Count => Some(Select::Count),
            Self::All => Some(Select::AllAttributes),
            Self::Projected => Some(Select::AllProjectedAttributes),
        }
    }
}

/// Build a projection expression from `paths`, allocating names in `attrs`.
/// An empty list yields `None`.
///
/// # Errors
///
/// Fails on malformed paths.
pub fn projection(paths: &[String], attrs: &mut ExpressionAttributes) -> Result<Option<String>, MapperError> {
    if paths.is_empty() {
        return Ok(None);
    }
    let names = paths
        .iter()
        .map(|p| Ok(attrs.add_name(&AttributePath::parse(p)?)))
        .collect::<Result<Vec<_>, MapperError>>()?;
    Ok(Some(names.join(", ")))
}

/// Options of `get`, `query`, `scan` and the batch and transactional reads.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ReadOptions {
    /// What to return: a count, every attribute or a path list.
    #[builder(default, setter(strip_option))]
    pub select: Option<Selection>,

    /// Strongly consistent read.
    #[builder(default, setter(strip_option))]
    pub consistent_read: Option<bool>,

    /// Maximum number of items to evaluate.
    #[builder(default, setter(strip_option))]
    pub limit: Option<i32>,

    /// Query order. `false` reads the sort key descending.
    #[builder(default, setter(strip_option))]
    pub scan_index_forward: Option<bool>,

    /// Where to resume a paginated query or scan.
    #[builder(default, setter(strip_option))]
    pub exclusive_start_key: Option<Value>,

    /// Segment of a parallel scan.
    #[builder(default, setter(strip_option))]
    pub segment: Option<i32>,

    /// Number of segments of a parallel scan.
    #[builder(default, setter(strip_option))]
    pub total_segments: Option<i32>,

    /// Capacity detail to return.
    #[builder(default, setter(strip_option))]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Passed to every getter.
    #[builder(default)]
    pub context: Value,
}

/// Options of `put`, `update`, `delete` and the batch writes.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct WriteOptions {
    /// Attributes to return from the write.
    #[builder(default, setter(strip_option))]
    pub return_values: Option<ReturnValue>,

    /// Capacity detail to return.
    #[builder(default, setter(strip_option))]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Whether to return item collection metrics.
    #[builder(default, setter(strip_option))]
    pub return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,

    /// Attributes to return when the condition fails.
    #[builder(default, setter(strip_option))]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,

    /// Passed to every setter.
    #[builder(default)]
    pub context: Value,
}

impl WriteOptions {
    /// Options that only carry what a failed condition check returns.
    #[must_use]
    pub(crate) fn on_check_failure(value: Option<ReturnValuesOnConditionCheckFailure>) -> Self {
        Self {
            return_values_on_condition_check_failure: value,
            ..Self::default()
        }
    }
}
