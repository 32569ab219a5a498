//! The item-level API of one table.
//!
//! A [`Model`] binds a table name, a compiled [`Schema`] and a [`Transport`].
//! Every operation comes in two forms: `build_*` returns the fully formed
//! request without sending it, the plain form sends it and converts the
//! response back to native values.
//!
//! Each request gets its own [`ExpressionAttributes`], so key conditions,
//! filters, projections and update expressions of one request never reuse a
//! token for a different name or value.

mod batch;
mod index;
pub mod options;
pub mod output;
#[cfg(test)]
mod stub;
mod transact;

use std::fmt;
use std::sync::Arc;

use dynaql_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use dynaql_model::marshall::{marshall_item, unmarshall_item};
use dynaql_model::output::{
    DeleteItemOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput, UpdateItemOutput,
};
use dynaql_model::types::Select;
use dynaql_model::{Item, StoreError, Value};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::config::MapperConfig;
use crate::error::MapperError;
use crate::expression::{ExpressionAttributes, compile_condition, compile_update};
use crate::schema::{IndexKeys, Resolutions, Schema, TableDefinition};
use crate::transform::{prepare_read, prepare_write, restore};
use crate::transport::{StoreRequest, StoreResponse, Transport};
use crate::validate::validate;

use self::options::projection;

pub use index::IndexQuery;
pub use options::{ReadOptions, Selection, WriteOptions};
pub use output::{
    BatchGetResult, BatchWriteResult, GetResult, ItemsResult, PutResult, TransactGetResult,
    UnprocessedWrite, WriteResult,
};
pub use transact::{
    ConditionCheckRequest, TransactDelete, TransactOptions, TransactPut, TransactUpdate, TransactWrite,
};

/// Typed access to one table.
#[derive(Clone)]
pub struct Model {
    table: String,
    schema: Arc<Schema>,
    transport: Arc<dyn Transport>,
    config: MapperConfig,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table)
            .field("primary_key", &self.schema.primary_key())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// A model of `table` with the default configuration.
    pub fn new(table: impl Into<String>, schema: Arc<Schema>, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(table, schema, transport, MapperConfig::default())
    }

    /// A model of `table` with `config`.
    pub fn with_config(
        table: impl Into<String>,
        schema: Arc<Schema>,
        transport: Arc<dyn Transport>,
        config: MapperConfig,
    ) -> Self {
        Self {
            table: table.into(),
            schema,
            transport,
            config,
        }
    }

    /// Table the model reads and writes.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The compiled schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mapper settings.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Provisioning metadata of the table.
    #[must_use]
    pub fn table_definition(&self) -> TableDefinition {
        self.schema.table_definition(&self.table, &self.config)
    }

    // -----------------------------------------------------------------------
    // Put
    // -----------------------------------------------------------------------

    /// Build a `PutItem` request. The item goes through defaults, string
    /// modifiers, setters and pruning, then is validated.
    ///
    /// # Errors
    ///
    /// Returns validation errors of the item and configuration errors of
    /// the condition.
    pub async fn build_put(
        &self,
        item: Value,
        condition: Option<&Value>,
        options: &WriteOptions,
    ) -> Result<PutItemInput, MapperError> {
        Ok(self.prepare_put(item, condition, options).await?.0)
    }

    /// Store an item.
    ///
    /// # Errors
    ///
    /// See [`Model::build_put`]. Store failures are returned as
    /// [`MapperError::Store`].
    pub async fn put(
        &self,
        item: Value,
        condition: Option<&Value>,
        options: &WriteOptions,
    ) -> Result<PutResult, MapperError> {
        let (input, item) = self.prepare_put(item, condition, options).await?;
        let output: PutItemOutput = self.send(input.into()).await?;
        Ok(PutResult {
            item,
            attributes: self.restore_item(&output.attributes),
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        })
    }

    pub(crate) async fn prepare_put(
        &self,
        item: Value,
        condition: Option<&Value>,
        options: &WriteOptions,
    ) -> Result<(PutItemInput, Value), MapperError> {
        let item = self.prepare_item(item, &options.context).await?;
        let mut attrs = self.attributes();
        let condition_expression = match condition {
            Some(condition) => self.serialize_condition(condition, &mut attrs)?,
            None => None,
        };
        let (names, values) = attrs.into_parts();

        let input = PutItemInput {
            table_name: self.table.clone(),
            item: marshall_item(&item, self.config.marshall_options())?,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: options.return_values,
            return_consumed_capacity: options.return_consumed_capacity,
            return_item_collection_metrics: options.return_item_collection_metrics,
            return_values_on_condition_check_failure: options.return_values_on_condition_check_failure,
        };
        Ok((input, item))
    }

    // -----------------------------------------------------------------------
    // Get
    // -----------------------------------------------------------------------

    /// Build a `GetItem` request. `key` is a bare partition key value or a
    /// map of key attributes. Only a [`Selection::Paths`] applies to a get.
    ///
    /// # Errors
    ///
    /// Fails on undefined key members and malformed projection paths.
    pub fn build_get(&self, key: &Value, options: &ReadOptions) -> Result<GetItemInput, MapperError> {
        let mut attrs = self.attributes();
        let projection_expression = match &options.select {
            Some(Selection::Paths(paths)) => projection(paths, &mut attrs)?,
            _ => None,
        };
        let (names, _) = attrs.into_parts();

        Ok(GetItemInput {
            table_name: self.table.clone(),
            key: self.marshall_key(key)?,
            projection_expression,
            expression_attribute_names: names,
            consistent_read: options.consistent_read,
            return_consumed_capacity: options.return_consumed_capacity,
        })
    }

    /// Read one item. The item runs through the getters.
    ///
    /// # Errors
    ///
    /// See [`Model::build_get`].
    pub async fn get(&self, key: &Value, options: &ReadOptions) -> Result<GetResult, MapperError> {
        let input = self.build_get(key, options)?;
        let output: GetItemOutput = self.send(input.into()).await?;
        let item = match output.item {
            Some(item) => Some(self.read_item(&item, &options.context).await),
            None => None,
        };
        Ok(GetResult {
            item,
            consumed_capacity: output.consumed_capacity,
        })
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Build an `UpdateItem` request. Key attributes of `filter` form the
    /// key; every other entry becomes the condition. The update expression
    /// is serialized first so its tokens come before the condition's.
    ///
    /// An empty `set` yields no update expression, which is how condition
    /// checks of transactions are built.
    ///
    /// # Errors
    ///
    /// Returns the errors of the update and condition compilers.
    pub async fn build_update(
        &self,
        filter: &Value,
        set: &Value,
        options: &WriteOptions,
    ) -> Result<UpdateItemInput, MapperError> {
        let update = compile_update(&self.schema, &self.table, set).await?;
        let mut attrs = self.attributes();
        let update_expression = update.serialize(&mut attrs)?;
        self.trace_expression("update", update_expression.as_deref());

        let (key, condition) = self.split_filter(filter, |field| self.schema.is_key_field(field))?;
        let condition_expression = self.serialize_condition(&condition, &mut attrs)?;
        let (names, values) = attrs.into_parts();

        Ok(UpdateItemInput {
            table_name: self.table.clone(),
            key: self.marshall_key(&key)?,
            update_expression,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: options.return_values,
            return_consumed_capacity: options.return_consumed_capacity,
            return_item_collection_metrics: options.return_item_collection_metrics,
            return_values_on_condition_check_failure: options.return_values_on_condition_check_failure,
        })
    }

    /// Update one item.
    ///
    /// # Errors
    ///
    /// See [`Model::build_update`].
    pub async fn update(
        &self,
        filter: &Value,
        set: &Value,
        options: &WriteOptions,
    ) -> Result<WriteResult, MapperError> {
        let input = self.build_update(filter, set, options).await?;
        let output: UpdateItemOutput = self.send(input.into()).await?;
        Ok(WriteResult {
            attributes: self.restore_item(&output.attributes),
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        })
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Build a `DeleteItem` request. `filter` is split like in
    /// [`Model::build_update`].
    ///
    /// # Errors
    ///
    /// Returns the errors of the condition compiler.
    pub fn build_delete(&self, filter: &Value, options: &WriteOptions) -> Result<DeleteItemInput, MapperError> {
        let (key, condition) = self.split_filter(filter, |field| self.schema.is_key_field(field))?;
        let key = self.marshall_key(&key)?;
        let mut attrs = self.attributes();
        let condition_expression = self.serialize_condition(&condition, &mut attrs)?;
        let (names, values) = attrs.into_parts();

        Ok(DeleteItemInput {
            table_name: self.table.clone(),
            key,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: options.return_values,
            return_consumed_capacity: options.return_consumed_capacity,
            return_item_collection_metrics: options.return_item_collection_metrics,
            return_values_on_condition_check_failure: options.return_values_on_condition_check_failure,
        })
    }

    /// Delete one item.
    ///
    /// # Errors
    ///
    /// See [`Model::build_delete`].
    pub async fn delete(&self, filter: &Value, options: &WriteOptions) -> Result<WriteResult, MapperError> {
        let input = self.build_delete(filter, options)?;
        let output: DeleteItemOutput = self.send(input.into()).await?;
        Ok(WriteResult {
            attributes: self.restore_item(&output.attributes),
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        })
    }

    // -----------------------------------------------------------------------
    // Query & Scan
    // -----------------------------------------------------------------------

    /// Build a `Query` request. Table key attributes of `filter` form the
    /// key condition and the remaining entries the filter.
    ///
    /// # Errors
    ///
    /// Returns the errors of the condition compiler.
    pub fn build_query(&self, filter: &Value, options: &ReadOptions) -> Result<QueryInput, MapperError> {
        self.query_input(None, filter, options)
    }

    /// Query the table.
    ///
    /// # Errors
    ///
    /// See [`Model::build_query`].
    pub async fn query(&self, filter: &Value, options: &ReadOptions) -> Result<ItemsResult, MapperError> {
        let input = self.build_query(filter, options)?;
        self.run_query(input, &options.context).await
    }

    /// Build a `Scan` request. All of `filter` becomes the filter.
    ///
    /// # Errors
    ///
    /// Returns the errors of the condition compiler.
    pub fn build_scan(&self, filter: &Value, options: &ReadOptions) -> Result<ScanInput, MapperError> {
        self.scan_input(None, filter, options)
    }

    /// Scan the table.
    ///
    /// # Errors
    ///
    /// See [`Model::build_scan`].
    pub async fn scan(&self, filter: &Value, options: &ReadOptions) -> Result<ItemsResult, MapperError> {
        let input = self.build_scan(filter, options)?;
        self.run_scan(input, &options.context).await
    }

    pub(crate) fn query_input(
        &self,
        index: Option<&IndexKeys>,
        filter: &Value,
        options: &ReadOptions,
    ) -> Result<QueryInput, MapperError> {
        let mut attrs = self.attributes();
        let (projection_expression, select) = self.selection(options, &mut attrs)?;
        let (key, rest) = self.split_filter(filter, |field| match index {
            Some(keys) => keys.is_key(field),
            None => self.schema.is_key_field(field),
        })?;
        let key_condition_expression = self.serialize_condition(&key, &mut attrs)?;
        let filter_expression = self.serialize_condition(&rest, &mut attrs)?;
        let (names, values) = attrs.into_parts();

        Ok(QueryInput {
            table_name: self.table.clone(),
            index_name: index.map(|keys| keys.name.clone()),
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            select,
            limit: options.limit,
            consistent_read: options.consistent_read,
            scan_index_forward: options.scan_index_forward,
            exclusive_start_key: self.start_key(options)?,
            return_consumed_capacity: options.return_consumed_capacity,
        })
    }

    pub(crate) fn scan_input(
        &self,
        index: Option<&str>,
        filter: &Value,
        options: &ReadOptions,
    ) -> Result<ScanInput, MapperError> {
        let mut attrs = self.attributes();
        let filter_expression = self.serialize_condition(filter, &mut attrs)?;
        let (projection_expression, select) = self.selection(options, &mut attrs)?;
        let (names, values) = attrs.into_parts();

        Ok(ScanInput {
            table_name: self.table.clone(),
            index_name: index.map(str::to_owned),
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            select,
            limit: options.limit,
            consistent_read: options.consistent_read,
            exclusive_start_key: self.start_key(options)?,
            segment: options.segment,
            total_segments: options.total_segments,
            return_consumed_capacity: options.return_consumed_capacity,
        })
    }

    pub(crate) async fn run_query(&self, input: QueryInput, context: &Value) -> Result<ItemsResult, MapperError> {
        let output: QueryOutput = self.send(input.into()).await?;
        Ok(ItemsResult {
            items: self.read_items(&output.items, context).await,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: self.restore_item(&output.last_evaluated_key),
            consumed_capacity: output.consumed_capacity,
        })
    }

    pub(crate) async fn run_scan(&self, input: ScanInput, context: &Value) -> Result<ItemsResult, MapperError> {
        let output: ScanOutput = self.send(input.into()).await?;
        Ok(ItemsResult {
            items: self.read_items(&output.items, context).await,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: self.restore_item(&output.last_evaluated_key),
            consumed_capacity: output.consumed_capacity,
        })
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    fn attributes(&self) -> ExpressionAttributes {
        ExpressionAttributes::new(self.config.marshall_options())
    }

    /// Run the write pipeline and validate the result. Both share one union
    /// resolution per attribute path.
    async fn prepare_item(&self, item: Value, context: &Value) -> Result<Value, MapperError> {
        let root = self.schema.root();
        let resolutions = Resolutions::new();
        let item = prepare_write(root, item, context, &resolutions).await;
        validate(root, &item, "", &self.table, &resolutions).await?;
        Ok(item)
    }

    fn marshall_key(&self, key: &Value) -> Result<Item, MapperError> {
        self.schema.marshall_key(key, self.config.marshall_options())
    }

    fn start_key(&self, options: &ReadOptions) -> Result<Item, MapperError> {
        match &options.exclusive_start_key {
            Some(key) => self.marshall_key(key),
            None => Ok(Item::new()),
        }
    }

    /// Split `filter` into key entries and condition entries, keeping the
    /// order of each.
    fn split_filter(
        &self,
        filter: &Value,
        is_key: impl Fn(&str) -> bool,
    ) -> Result<(Value, Value), MapperError> {
        let entries = match filter {
            Value::Map(entries) => entries,
            Value::Undefined | Value::Null => return Ok((Value::map(), Value::map())),
            other => {
                return Err(MapperError::configuration(format!(
                    "{} > expected an object of key and condition attributes. Received: {}",
                    self.table,
                    other.kind_name()
                )));
            }
        };

        let mut key = IndexMap::new();
        let mut condition = IndexMap::new();
        for (name, value) in entries {
            if is_key(name) {
                key.insert(name.clone(), value.clone());
            } else {
                condition.insert(name.clone(), value.clone());
            }
        }
        Ok((Value::Map(key), Value::Map(condition)))
    }

    fn serialize_condition(
        &self,
        condition: &Value,
        attrs: &mut ExpressionAttributes,
    ) -> Result<Option<String>, MapperError> {
        let expression = compile_condition(&self.schema, condition)?
            .map(|expr| expr.serialize(attrs))
            .transpose()?;
        self.trace_expression("condition", expression.as_deref());
        Ok(expression)
    }

    /// Projection expression and `Select` of a read.
    fn selection(
        &self,
        options: &ReadOptions,
        attrs: &mut ExpressionAttributes,
    ) -> Result<(Option<String>, Option<Select>), MapperError> {
        match &options.select {
            Some(Selection::Paths(paths)) => Ok((projection(paths, attrs)?, None)),
            Some(selection) => Ok((None, selection.as_select())),
            None => Ok((None, None)),
        }
    }

    fn trace_expression(&self, kind: &'static str, expression: Option<&str>) {
        if let (true, Some(expression)) = (self.config.trace_expressions, expression) {
            trace!(table = %self.table, kind, expression, "compiled expression");
        }
    }

    async fn read_item(&self, item: &Item, context: &Value) -> Value {
        prepare_read(self.schema.root(), unmarshall_item(item), context).await
    }

    async fn read_items(&self, items: &[Item], context: &Value) -> Vec<Value> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.read_item(item, context).await);
        }
        out
    }

    /// Restore schema types of returned attributes. Empty maps yield `None`.
    fn restore_item(&self, item: &Item) -> Option<Value> {
        if item.is_empty() {
            return None;
        }
        Some(restore(self.schema.root(), unmarshall_item(item)))
    }

    async fn send<O>(&self, request: StoreRequest) -> Result<O, MapperError>
    where
        O: TryFrom<StoreResponse, Error = StoreError>,
    {
        let operation = request.operation();
        debug!(table = %self.table, %operation, "sending store request");
        let response = self.transport.send(request).await.map_err(|e| {
            warn!(table = %self.table, %operation, code = %e.code, "store request failed");
            e
        })?;
        Ok(O::try_from(response)?)
    }
}
