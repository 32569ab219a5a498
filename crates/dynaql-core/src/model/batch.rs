use dynaql_model::Value;
use dynaql_model::input::{BatchGetItemInput, BatchWriteItemInput};
use dynaql_model::marshall::{marshall_item, unmarshall_item};
use dynaql_model::output::{BatchGetItemOutput, BatchWriteItemOutput};
use dynaql_model::types::{KeysAndAttributes, WriteRequest};
use indexmap::IndexMap;

use super::options::projection;
use super::{
    BatchGetResult, BatchWriteResult, Model, ReadOptions, Selection, UnprocessedWrite, WriteOptions,
};
use crate::error::MapperError;

impl Model {
    /// Build a `BatchGetItem` request for `keys` of this table.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `keys` is empty.
    pub fn build_batch_get(&self, keys: &[Value], options: &ReadOptions) -> Result<BatchGetItemInput, MapperError> {
        self.ensure_not_empty("batchGet", keys.len())?;

        let mut attrs = self.attributes();
        let projection_expression = match &options.select {
            Some(Selection::Paths(paths)) => projection(paths, &mut attrs)?,
            _ => None,
        };
        let (names, _) = attrs.into_parts();
        let keys = keys.iter().map(|k| self.marshall_key(k)).collect::<Result<Vec<_>, _>>()?;

        Ok(BatchGetItemInput {
            request_items: IndexMap::from([(
                self.table.clone(),
                KeysAndAttributes {
                    keys,
                    projection_expression,
                    expression_attribute_names: names,
                    consistent_read: options.consistent_read,
                },
            )]),
            return_consumed_capacity: options.return_consumed_capacity,
        })
    }

    /// Read several items by key. Items run through the getters; keys the
    /// store did not process are returned unmarshalled.
    ///
    /// # Errors
    ///
    /// See [`Model::build_batch_get`].
    pub async fn batch_get(&self, keys: &[Value], options: &ReadOptions) -> Result<BatchGetResult, MapperError> {
        let input = self.build_batch_get(keys, options)?;
        let mut output: BatchGetItemOutput = self.send(input.into()).await?;

        let items = match output.responses.get(&self.table) {
            Some(items) => self.read_items(items, &options.context).await,
            None => Vec::new(),
        };
        let unprocessed_keys = output
            .unprocessed_keys
            .swap_remove(&self.table)
            .map(|pending| pending.keys.iter().map(unmarshall_item).collect())
            .unwrap_or_default();

        Ok(BatchGetResult {
            items,
            unprocessed_keys,
            consumed_capacity: output.consumed_capacity,
        })
    }

    /// Build a `BatchWriteItem` request putting `items`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `items` is empty and the
    /// validation error of the first invalid item.
    pub async fn build_batch_put(
        &self,
        items: Vec<Value>,
        options: &WriteOptions,
    ) -> Result<BatchWriteItemInput, MapperError> {
        self.ensure_not_empty("batchPut", items.len())?;
        Ok(self.prepare_batch_write(items, &[], options).await?.0)
    }

    /// Put several items.
    ///
    /// # Errors
    ///
    /// See [`Model::build_batch_put`].
    pub async fn batch_put(&self, items: Vec<Value>, options: &WriteOptions) -> Result<BatchWriteResult, MapperError> {
        self.ensure_not_empty("batchPut", items.len())?;
        let (input, items) = self.prepare_batch_write(items, &[], options).await?;
        self.run_batch_write(input, items).await
    }

    /// Build a `BatchWriteItem` request deleting `keys`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `keys` is empty.
    pub async fn build_batch_delete(
        &self,
        keys: &[Value],
        options: &WriteOptions,
    ) -> Result<BatchWriteItemInput, MapperError> {
        self.ensure_not_empty("batchDelete", keys.len())?;
        Ok(self.prepare_batch_write(Vec::new(), keys, options).await?.0)
    }

    /// Delete several items by key.
    ///
    /// # Errors
    ///
    /// See [`Model::build_batch_delete`].
    pub async fn batch_delete(&self, keys: &[Value], options: &WriteOptions) -> Result<BatchWriteResult, MapperError> {
        let input = self.build_batch_delete(keys, options).await?;
        self.run_batch_write(input, Vec::new()).await
    }

    /// Build a `BatchWriteItem` request with puts followed by deletes.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the first invalid item.
    pub async fn build_batch_write(
        &self,
        put: Vec<Value>,
        delete: &[Value],
        options: &WriteOptions,
    ) -> Result<BatchWriteItemInput, MapperError> {
        Ok(self.prepare_batch_write(put, delete, options).await?.0)
    }

    /// Put and delete items in one request.
    ///
    /// # Errors
    ///
    /// See [`Model::build_batch_write`].
    pub async fn batch_write(
        &self,
        put: Vec<Value>,
        delete: &[Value],
        options: &WriteOptions,
    ) -> Result<BatchWriteResult, MapperError> {
        let (input, items) = self.prepare_batch_write(put, delete, options).await?;
        self.run_batch_write(input, items).await
    }

    async fn prepare_batch_write(
        &self,
        put: Vec<Value>,
        delete: &[Value],
        options: &WriteOptions,
    ) -> Result<(BatchWriteItemInput, Vec<Value>), MapperError> {
        let mut requests = Vec::with_capacity(put.len() + delete.len());
        let mut items = Vec::with_capacity(put.len());
        for item in put {
            let item = self.prepare_item(item, &options.context).await?;
            requests.push(WriteRequest::put(marshall_item(&item, self.config.marshall_options())?));
            items.push(item);
        }
        for key in delete {
            requests.push(WriteRequest::delete(self.marshall_key(key)?));
        }

        let input = BatchWriteItemInput {
            request_items: IndexMap::from([(self.table.clone(), requests)]),
            return_consumed_capacity: options.return_consumed_capacity,
            return_item_collection_metrics: options.return_item_collection_metrics,
        };
        Ok((input, items))
    }

    async fn run_batch_write(
        &self,
        input: BatchWriteItemInput,
        items: Vec<Value>,
    ) -> Result<BatchWriteResult, MapperError> {
        let mut output: BatchWriteItemOutput = self.send(input.into()).await?;
        let unprocessed = output
            .unprocessed_items
            .swap_remove(&self.table)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| match (request.put_request, request.delete_request) {
                (Some(put), _) => Some(UnprocessedWrite::Put(unmarshall_item(&put.item))),
                (None, Some(delete)) => Some(UnprocessedWrite::Delete(unmarshall_item(&delete.key))),
                (None, None) => None,
            })
            .collect();

        Ok(BatchWriteResult {
            items,
            unprocessed,
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        })
    }

    fn ensure_not_empty(&self, operation: &str, len: usize) -> Result<(), MapperError> {
        if len == 0 {
            return Err(MapperError::configuration(format!(
                "{} > {operation} must include at least one item.",
                self.table
            )));
        }
        Ok(())
    }
}
