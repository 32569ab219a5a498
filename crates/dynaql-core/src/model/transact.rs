//! Transactional reads and writes.
//!
//! Every member of a write transaction is built exactly like its single-item
//! counterpart, each with its own expression attributes. A condition check is
//! an update with an empty update document: the key and condition are kept,
//! the update expression is dropped.

use dynaql_model::Value;
use dynaql_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use dynaql_model::output::{TransactGetItemsOutput, TransactWriteItemsOutput};
use dynaql_model::types::{
    ConditionCheck, Get, ReturnConsumedCapacity, ReturnItemCollectionMetrics,
    ReturnValuesOnConditionCheckFailure, TransactGetItem, TransactWriteItem,
};
use typed_builder::TypedBuilder;

use super::options::projection;
use super::{Model, ReadOptions, Selection, TransactGetResult, WriteOptions};
use crate::error::MapperError;

/// A condition that must hold for the transaction to commit.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ConditionCheckRequest {
    /// Key attributes of the item plus conditions on its other attributes.
    pub condition: Value,

    /// Attributes to return when this member's condition fails.
    #[builder(default, setter(strip_option))]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// A put inside a transaction.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TransactPut {
    /// The item to write.
    pub item: Value,

    /// Condition that must hold on the stored item.
    #[builder(default, setter(strip_option))]
    pub condition: Option<Value>,

    /// Attributes to return when this member's condition fails.
    #[builder(default, setter(strip_option))]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// An update inside a transaction.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TransactUpdate {
    /// Key attributes plus conditions, split like in `update`.
    pub filter: Value,

    /// Update document.
    pub set: Value,

    /// Attributes to return when this member's condition fails.
    #[builder(default, setter(strip_option))]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// A delete inside a transaction.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TransactDelete {
    /// Key attributes plus conditions, split like in `delete`.
    pub filter: Value,

    /// Attributes to return when this member's condition fails.
    #[builder(default, setter(strip_option))]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Everything one write transaction does. Members are sent as checks, puts,
/// deletes, then updates.
#[derive(Debug, Clone, Default)]
pub struct TransactWrite {
    /// Condition checks.
    pub check: Vec<ConditionCheckRequest>,
    /// Puts.
    pub put: Vec<TransactPut>,
    /// Deletes.
    pub delete: Vec<TransactDelete>,
    /// Updates.
    pub update: Vec<TransactUpdate>,
}

/// Options of the transactional writes.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct TransactOptions {
    /// Checks sent before every other member.
    #[builder(default)]
    pub checks: Vec<ConditionCheckRequest>,

    /// Idempotency token of the request.
    #[builder(default, setter(strip_option, into))]
    pub client_request_token: Option<String>,

    /// Capacity detail to return.
    #[builder(default, setter(strip_option))]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Whether to return item collection metrics.
    #[builder(default, setter(strip_option))]
    pub return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,

    /// Passed to the setters of every put.
    #[builder(default)]
    pub context: Value,
}

impl Model {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Build a `TransactGetItems` request.
    ///
    /// Each entry of `keys` is a key, or a map with `$key` and an optional
    /// `$select` list of paths. Plain keys use the projection of `options`;
    /// entries with `$key` use only their own `$select`.
    ///
    /// # Errors
    ///
    /// Fails on undefined key members and malformed projection paths.
    pub fn build_transact_get(
        &self,
        keys: &[Value],
        options: &ReadOptions,
    ) -> Result<TransactGetItemsInput, MapperError> {
        let mut attrs = self.attributes();
        let shared_projection = match &options.select {
            Some(Selection::Paths(paths)) => projection(paths, &mut attrs)?,
            _ => None,
        };
        let (shared_names, _) = attrs.into_parts();

        let mut transact_items = Vec::with_capacity(keys.len());
        for entry in keys {
            let get = match entry.as_map().and_then(|m| m.get("$key")) {
                Some(key) => {
                    let paths = select_paths(entry.get("$select"))?;
                    let mut attrs = self.attributes();
                    let projection_expression = projection(&paths, &mut attrs)?;
                    Get {
                        table_name: self.table.clone(),
                        key: self.marshall_key(key)?,
                        projection_expression,
                        expression_attribute_names: attrs.into_parts().0,
                    }
                }
                None => Get {
                    table_name: self.table.clone(),
                    key: self.marshall_key(entry)?,
                    projection_expression: shared_projection.clone(),
                    expression_attribute_names: shared_names.clone(),
                },
            };
            transact_items.push(TransactGetItem { get });
        }

        Ok(TransactGetItemsInput {
            transact_items,
            return_consumed_capacity: options.return_consumed_capacity,
        })
    }

    /// Read several items atomically. Reads that matched no item are left
    /// out of the result.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_get`].
    pub async fn transact_get(&self, keys: &[Value], options: &ReadOptions) -> Result<TransactGetResult, MapperError> {
        let input = self.build_transact_get(keys, options)?;
        let output: TransactGetItemsOutput = self.send(input.into()).await?;

        let mut items = Vec::with_capacity(output.responses.len());
        for response in &output.responses {
            if let Some(item) = &response.item {
                items.push(self.read_item(item, &options.context).await);
            }
        }
        Ok(TransactGetResult {
            items,
            consumed_capacity: output.consumed_capacity,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Build a `TransactWriteItems` request. Checks of `options` come first.
    ///
    /// # Errors
    ///
    /// Returns the first error of any member.
    pub async fn build_transact_write(
        &self,
        write: TransactWrite,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsInput, MapperError> {
        let mut transact_items = Vec::new();

        for check in options.checks.iter().chain(&write.check) {
            transact_items.push(TransactWriteItem {
                condition_check: Some(self.condition_check(check).await?),
                ..Default::default()
            });
        }
        for put in write.put {
            let member_options = WriteOptions {
                return_values_on_condition_check_failure: put.return_values_on_condition_check_failure,
                context: options.context.clone(),
                ..WriteOptions::default()
            };
            let (input, _) = self
                .prepare_put(put.item, put.condition.as_ref(), &member_options)
                .await?;
            transact_items.push(TransactWriteItem {
                put: Some(input),
                ..Default::default()
            });
        }
        for delete in write.delete {
            let member_options = WriteOptions::on_check_failure(delete.return_values_on_condition_check_failure);
            transact_items.push(TransactWriteItem {
                delete: Some(self.build_delete(&delete.filter, &member_options)?),
                ..Default::default()
            });
        }
        for update in write.update {
            let member_options = WriteOptions::on_check_failure(update.return_values_on_condition_check_failure);
            transact_items.push(TransactWriteItem {
                update: Some(self.build_update(&update.filter, &update.set, &member_options).await?),
                ..Default::default()
            });
        }

        Ok(TransactWriteItemsInput {
            transact_items,
            client_request_token: options.client_request_token.clone(),
            return_consumed_capacity: options.return_consumed_capacity,
            return_item_collection_metrics: options.return_item_collection_metrics,
        })
    }

    /// Run a write transaction.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`]. A cancelled transaction is
    /// returned as [`MapperError::Store`] with its cancellation reasons.
    pub async fn transact_write(
        &self,
        write: TransactWrite,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsOutput, MapperError> {
        let input = self.build_transact_write(write, options).await?;
        self.send(input.into()).await
    }

    /// Build a transaction of puts.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn build_transact_put(
        &self,
        items: Vec<TransactPut>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsInput, MapperError> {
        let write = TransactWrite {
            put: items,
            ..TransactWrite::default()
        };
        self.build_transact_write(write, options).await
    }

    /// Put several items atomically.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn transact_put(
        &self,
        items: Vec<TransactPut>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsOutput, MapperError> {
        let input = self.build_transact_put(items, options).await?;
        self.send(input.into()).await
    }

    /// Build a transaction of updates.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn build_transact_update(
        &self,
        items: Vec<TransactUpdate>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsInput, MapperError> {
        let write = TransactWrite {
            update: items,
            ..TransactWrite::default()
        };
        self.build_transact_write(write, options).await
    }

    /// Update several items atomically.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn transact_update(
        &self,
        items: Vec<TransactUpdate>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsOutput, MapperError> {
        let input = self.build_transact_update(items, options).await?;
        self.send(input.into()).await
    }

    /// Build a transaction of deletes.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn build_transact_delete(
        &self,
        items: Vec<TransactDelete>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsInput, MapperError> {
        let write = TransactWrite {
            delete: items,
            ..TransactWrite::default()
        };
        self.build_transact_write(write, options).await
    }

    /// Delete several items atomically.
    ///
    /// # Errors
    ///
    /// See [`Model::build_transact_write`].
    pub async fn transact_delete(
        &self,
        items: Vec<TransactDelete>,
        options: &TransactOptions,
    ) -> Result<TransactWriteItemsOutput, MapperError> {
        let input = self.build_transact_delete(items, options).await?;
        self.send(input.into()).await
    }

    async fn condition_check(&self, check: &ConditionCheckRequest) -> Result<ConditionCheck, MapperError> {
        let options = WriteOptions::on_check_failure(check.return_values_on_condition_check_failure);
        let update = self.build_update(&check.condition, &Value::map(), &options).await?;
        Ok(ConditionCheck {
            table_name: update.table_name,
            key: update.key,
            condition_expression: update.condition_expression,
            expression_attribute_names: update.expression_attribute_names,
            expression_attribute_values: update.expression_attribute_values,
            return_values_on_condition_check_failure: update.return_values_on_condition_check_failure,
        })
    }
}

fn select_paths(select: &Value) -> Result<Vec<String>, MapperError> {
    match select {
        Value::Undefined => Ok(Vec::new()),
        Value::List(paths) => paths
            .iter()
            .map(|p| {
                p.as_str().map(str::to_owned).ok_or_else(|| {
                    MapperError::configuration(format!(
                        "$select expects attribute paths. Received: {}",
                        p.kind_name()
                    ))
                })
            })
            .collect(),
        other => Err(MapperError::configuration(format!(
            "$select expects a list of attribute paths. Received: {}",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynaql_model::output::ItemResponse;
    use dynaql_model::{AttributeValue, Item, StoreError, StoreErrorCode};
    use serde_json::json;

    use super::*;
    use crate::model::stub::{StubTransport, users};

    #[test]
    fn test_should_build_transact_get_with_per_item_select() {
        let model = users(&Arc::new(StubTransport::default()));
        let input = model
            .build_transact_get(
                &[
                    Value::from(json!({"id": "a", "createdAt": 1000})),
                    Value::from(json!({"$key": {"id": "b", "createdAt": 1000}, "$select": ["age"]})),
                    Value::from(json!({"$key": {"id": "c", "createdAt": 1000}})),
                ],
                &ReadOptions::builder().select(Selection::paths(["name", "email"])).build(),
            )
            .unwrap();

        let gets: Vec<&Get> = input.transact_items.iter().map(|t| &t.get).collect();
        assert_eq!(gets[0].projection_expression.as_deref(), Some("#n0, #n1"));
        assert_eq!(gets[1].projection_expression.as_deref(), Some("#n0"));
        assert_eq!(gets[1].expression_attribute_names["#n0"], "age");
        assert!(gets[2].projection_expression.is_none());
        assert_eq!(gets[2].key.get("id"), Some(&AttributeValue::S("c".to_owned())));
    }

    #[tokio::test]
    async fn test_should_skip_missing_transact_reads() {
        let transport = Arc::new(StubTransport::default());
        transport.respond(TransactGetItemsOutput {
            responses: vec![
                ItemResponse { item: None },
                ItemResponse {
                    item: Some(Item::from([("id".to_owned(), AttributeValue::S("b".to_owned()))])),
                },
            ],
            consumed_capacity: Vec::new(),
        });
        let model = users(&transport);
        let result = model
            .transact_get(
                &[
                    Value::from(json!({"id": "a", "createdAt": 1})),
                    Value::from(json!({"id": "b", "createdAt": 1})),
                ],
                &ReadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.items, vec![Value::from(json!({"id": "b"}))]);
    }

    #[tokio::test]
    async fn test_should_order_transaction_members() {
        let model = users(&Arc::new(StubTransport::default()));
        let write = TransactWrite {
            check: vec![
                ConditionCheckRequest::builder()
                    .condition(Value::from(json!({"id": "x", "createdAt": 1000, "age": {"$gte": 18}})))
                    .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
                    .build(),
            ],
            put: vec![TransactPut::builder().item(Value::from(json!({"id": "p", "createdAt": 1000}))).build()],
            delete: vec![TransactDelete::builder().filter(Value::from(json!({"id": "d", "createdAt": 1000}))).build()],
            update: vec![
                TransactUpdate::builder()
                    .filter(Value::from(json!({"id": "u", "createdAt": 1000})))
                    .set(Value::from(json!({"age": {"$incr": 1}})))
                    .build(),
            ],
        };
        let input = model
            .build_transact_write(write, &TransactOptions::builder().client_request_token("t-1").build())
            .await
            .unwrap();

        let items = &input.transact_items;
        assert_eq!(items.len(), 4);
        let check = items[0].condition_check.as_ref().unwrap();
        assert_eq!(check.condition_expression.as_deref(), Some("#n0 >= :v1"));
        assert_eq!(
            check.return_values_on_condition_check_failure,
            Some(ReturnValuesOnConditionCheckFailure::AllOld)
        );
        assert!(items[1].put.is_some());
        assert!(items[2].delete.is_some());
        let update = items[3].update.as_ref().unwrap();
        assert_eq!(update.update_expression.as_deref(), Some("SET #n0 = #n0 + :v1"));
        assert_eq!(input.client_request_token.as_deref(), Some("t-1"));
    }

    #[tokio::test]
    async fn test_should_prepend_option_checks() {
        let model = users(&Arc::new(StubTransport::default()));
        let options = TransactOptions::builder()
            .checks(vec![
                ConditionCheckRequest::builder()
                    .condition(Value::from(json!({"id": "x", "createdAt": 1000, "name": {"$exists": true}})))
                    .build(),
            ])
            .context(Value::from(json!({"domain": "corp.io"})))
            .build();
        let input = model
            .build_transact_put(
                vec![
                    TransactPut::builder()
                        .item(Value::from(json!({"id": "p", "createdAt": 1000, "email": "bo"})))
                        .build(),
                ],
                &options,
            )
            .await
            .unwrap();

        assert!(input.transact_items[0].condition_check.is_some());
        let put = input.transact_items[1].put.as_ref().unwrap();
        assert_eq!(put.item.get("email"), Some(&AttributeValue::S("bo@corp.io".to_owned())));
    }

    #[tokio::test]
    async fn test_should_surface_cancelled_transactions() {
        let transport = Arc::new(StubTransport::default());
        transport.fail(StoreError::new(StoreErrorCode::TransactionCanceledException));
        let model = users(&transport);
        let err = model
            .transact_delete(
                vec![TransactDelete::builder().filter(Value::from(json!({"id": "d", "createdAt": 1000}))).build()],
                &TransactOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::Store(e) if e.code == StoreErrorCode::TransactionCanceledException));
    }

    #[test]
    fn test_should_reject_malformed_select() {
        let err = select_paths(&Value::from("name")).unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
        assert_eq!(select_paths(&Value::Undefined).unwrap(), Vec::<String>::new());
    }
}
