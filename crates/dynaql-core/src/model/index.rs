use dynaql_model::Value;
use dynaql_model::input::{QueryInput, ScanInput};

use super::{ItemsResult, Model, ReadOptions};
use crate::error::MapperError;
use crate::schema::IndexKeys;

/// Queries and scans of one secondary index, from [`Model::using`].
#[derive(Debug, Clone)]
pub struct IndexQuery<'m> {
    model: &'m Model,
    keys: IndexKeys,
}

impl Model {
    /// Target the secondary index `index`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the schema declares no such index.
    pub fn using(&self, index: &str) -> Result<IndexQuery<'_>, MapperError> {
        let keys = self.schema.index_keys(index).ok_or_else(|| {
            MapperError::configuration(format!("{} > unknown index \"{index}\".", self.table))
        })?;
        Ok(IndexQuery { model: self, keys })
    }
}

impl IndexQuery<'_> {
    /// Key attributes of the index.
    #[must_use]
    pub fn keys(&self) -> &IndexKeys {
        &self.keys
    }

    /// Build a `Query` request. The index hash and sort attributes form the
    /// key condition; for a local index that is the table partition key and
    /// the index sort key.
    ///
    /// # Errors
    ///
    /// Returns the errors of the condition compiler.
    pub fn build_query(&self, filter: &Value, options: &ReadOptions) -> Result<QueryInput, MapperError> {
        self.model.query_input(Some(&self.keys), filter, options)
    }

    /// Query the index.
    ///
    /// # Errors
    ///
    /// See [`IndexQuery::build_query`].
    pub async fn query(&self, filter: &Value, options: &ReadOptions) -> Result<ItemsResult, MapperError> {
        let input = self.build_query(filter, options)?;
        self.model.run_query(input, &options.context).await
    }

    /// Build a `Scan` request of the index.
    ///
    /// # Errors
    ///
    /// Returns the errors of the condition compiler.
    pub fn build_scan(&self, filter: &Value, options: &ReadOptions) -> Result<ScanInput, MapperError> {
        self.model.scan_input(Some(&self.keys.name), filter, options)
    }

    /// Scan the index.
    ///
    /// # Errors
    ///
    /// See [`IndexQuery::build_scan`].
    pub async fn scan(&self, filter: &Value, options: &ReadOptions) -> Result<ItemsResult, MapperError> {
        let input = self.build_scan(filter, options)?;
        self.model.run_scan(input, &options.context).await
    }
}
