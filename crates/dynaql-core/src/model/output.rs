//! Results of executed [`Model`](super::Model) operations.
//!
//! Items are native values: reads went through the getter pipeline and
//! returned attributes of writes had their schema types restored.

use dynaql_model::Value;
use dynaql_model::types::{ConsumedCapacity, ItemCollectionMetrics};
use indexmap::IndexMap;

/// Result of `put`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutResult {
    /// The item as it was stored.
    pub item: Value,
    /// Attributes requested through `return_values`.
    pub attributes: Option<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Option<ConsumedCapacity>,
    /// Item collection metrics, when requested.
    pub item_collection_metrics: Option<ItemCollectionMetrics>,
}

/// Result of `update` and `delete`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    /// Attributes requested through `return_values`.
    pub attributes: Option<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Option<ConsumedCapacity>,
    /// Item collection metrics, when requested.
    pub item_collection_metrics: Option<ItemCollectionMetrics>,
}

/// Result of `get`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResult {
    /// The item, or `None` when no item has the key.
    pub item: Option<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Result of `query` and `scan`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsResult {
    /// Items in the order the store returned them.
    pub items: Vec<Value>,
    /// Number of items returned.
    pub count: i32,
    /// Number of items evaluated before the filter.
    pub scanned_count: i32,
    /// Key to resume from, when the store stopped early.
    pub last_evaluated_key: Option<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Result of `batch_get`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResult {
    /// Items in the order the store returned them.
    pub items: Vec<Value>,
    /// Keys the store did not process.
    pub unprocessed_keys: Vec<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// A write the store did not process.
#[derive(Debug, Clone, PartialEq)]
pub enum UnprocessedWrite {
    /// The stored form of an item to put.
    Put(Value),
    /// The key of an item to delete.
    Delete(Value),
}

/// Result of `batch_put`, `batch_delete` and `batch_write`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteResult {
    /// Put items as they were sent.
    pub items: Vec<Value>,
    /// Writes to retry.
    pub unprocessed: Vec<UnprocessedWrite>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Vec<ConsumedCapacity>,
    /// Item collection metrics, when requested.
    pub item_collection_metrics: IndexMap<String, Vec<ItemCollectionMetrics>>,
}

/// Result of `transact_get`. Reads that matched no item are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactGetResult {
    /// Items in the order the store returned them.
    pub items: Vec<Value>,
    /// Capacity consumed, when requested.
    pub consumed_capacity: Vec<ConsumedCapacity>,
}
