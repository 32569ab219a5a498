//! Compiled schemas.
//!
//! A [`Schema`] is compiled once from a [`SchemaDecl`] and is immutable
//! afterwards. The only state that grows is the path cache, a concurrent
//! append-only map from normalized path (`items[#].name`) to the resolved
//! node.

mod compiler;
pub mod declaration;
pub mod node;
mod path;
pub mod union;

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dynaql_model::marshall::marshall_item;
use dynaql_model::types::{
    AttributeDefinition, GlobalSecondaryIndex, KeySchemaElement, KeyType, LocalSecondaryIndex,
    ProvisionedThroughput,
};
use dynaql_model::{Item, MarshallOptions, Value};
use indexmap::IndexMap;
use serde::Serialize;

pub use declaration::{DeclType, FieldDecl, FieldOptions, SchemaDecl, TypeTag};
pub use node::{
    Capacity, DefaultValue, GlobalIndexRole, IndexRoles, LocalIndexRole, NodeShape,
    ProjectionSpec, ScalarKind, SchemaNode,
};
pub use union::Resolutions;

use crate::config::MapperConfig;
use crate::error::MapperError;
use crate::expression::ast::AttributePath;

/// Key attributes of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeys {
    /// Index name.
    pub name: String,
    /// `true` for local secondary indexes.
    pub local: bool,
    /// Hash key attribute. The table partition key for local indexes.
    pub hash_key: String,
    /// Range key attribute.
    pub sort_key: Option<String>,
}

impl IndexKeys {
    /// Returns `true` if `field` is part of the index key.
    #[must_use]
    pub fn is_key(&self, field: &str) -> bool {
        self.hash_key == field || self.sort_key.as_deref() == Some(field)
    }
}

/// Provisioning metadata of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDefinition {
    /// Table name.
    pub table_name: String,
    /// Partition and sort key.
    pub key_schema: Vec<KeySchemaElement>,
    /// Types of key and index attributes.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Local secondary indexes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
    /// Global secondary indexes, with capacity filled in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
}

/// A compiled schema.
#[derive(Debug)]
pub struct Schema {
    root: Arc<SchemaNode>,
    primary_key: String,
    sort_key: Option<String>,
    key_schema: Vec<KeySchemaElement>,
    attribute_definitions: Vec<AttributeDefinition>,
    local_indexes: Vec<LocalSecondaryIndex>,
    global_indexes: Vec<GlobalSecondaryIndex>,
    path_cache: DashMap<String, Arc<SchemaNode>>,
}

impl Schema {
    /// Compile `decl`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown types, invalid sets, a
    /// missing or duplicated partition key and conflicting indexes.
    pub fn new(decl: &SchemaDecl) -> Result<Self, MapperError> {
        let compiled = compiler::compile(decl)?;
        Ok(Self {
            root: Arc::new(compiled.root),
            primary_key: compiled.primary_key,
            sort_key: compiled.sort_key,
            key_schema: compiled.key_schema,
            attribute_definitions: compiled.attribute_definitions,
            local_indexes: compiled.local_indexes,
            global_indexes: compiled.global_indexes,
            path_cache: DashMap::new(),
        })
    }

    /// Compile a JSON declaration.
    ///
    /// # Errors
    ///
    /// See [`SchemaDecl::from_json`] and [`Schema::new`].
    pub fn from_json(json: &serde_json::Value) -> Result<Self, MapperError> {
        Self::new(&SchemaDecl::from_json(json)?)
    }

    /// The root object node.
    #[must_use]
    pub fn root(&self) -> &Arc<SchemaNode> {
        &self.root
    }

    /// Top-level field `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.root.field(name)
    }

    /// Top-level fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Arc<SchemaNode>> {
        static EMPTY: LazyLock<IndexMap<String, Arc<SchemaNode>>> = LazyLock::new(IndexMap::new);
        self.root.fields().unwrap_or(&EMPTY)
    }

    /// Partition key attribute.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Sort key attribute.
    #[must_use]
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// `[HASH pk, RANGE sk?]`.
    #[must_use]
    pub fn key_schema(&self) -> &[KeySchemaElement] {
        &self.key_schema
    }

    /// Attribute definitions of every key and index attribute.
    #[must_use]
    pub fn attribute_definitions(&self) -> &[AttributeDefinition] {
        &self.attribute_definitions
    }

    /// Local secondary indexes.
    #[must_use]
    pub fn local_indexes(&self) -> &[LocalSecondaryIndex] {
        &self.local_indexes
    }

    /// Global secondary indexes.
    #[must_use]
    pub fn global_indexes(&self) -> &[GlobalSecondaryIndex] {
        &self.global_indexes
    }

    /// Returns `true` if `field` is the partition or sort key.
    #[must_use]
    pub fn is_key_field(&self, field: &str) -> bool {
        self.primary_key == field || self.sort_key.as_deref() == Some(field)
    }

    /// Key attributes of the index called `name`.
    #[must_use]
    pub fn index_keys(&self, name: &str) -> Option<IndexKeys> {
        let range_of = |keys: &[KeySchemaElement]| {
            keys.iter()
                .find(|k| k.key_type == KeyType::Range)
                .map(|k| k.attribute_name.clone())
        };
        let hash_of = |keys: &[KeySchemaElement]| {
            keys.iter()
                .find(|k| k.key_type == KeyType::Hash)
                .map(|k| k.attribute_name.clone())
        };

        if let Some(lsi) = self.local_indexes.iter().find(|i| i.index_name == name) {
            return Some(IndexKeys {
                name: name.to_owned(),
                local: true,
                hash_key: hash_of(&lsi.key_schema)?,
                sort_key: range_of(&lsi.key_schema),
            });
        }
        self.global_indexes
            .iter()
            .find(|i| i.index_name == name)
            .and_then(|gsi| {
                Some(IndexKeys {
                    name: name.to_owned(),
                    local: false,
                    hash_key: hash_of(&gsi.key_schema)?,
                    sort_key: range_of(&gsi.key_schema),
                })
            })
    }

    /// Resolve a textual path. Results are cached by normalized path for the
    /// lifetime of the schema.
    ///
    /// # Errors
    ///
    /// Fails on malformed paths and on a literal `[#]`.
    pub fn resolve_path(&self, path: &str) -> Result<Arc<SchemaNode>, MapperError> {
        let key = path::normalize(path)?;
        if let Some(node) = self.path_cache.get(&key) {
            return Ok(Arc::clone(node.value()));
        }
        let parsed = AttributePath::parse(path)?;
        let node = path::resolve(&self.root, &parsed);
        self.path_cache.insert(key, Arc::clone(&node));
        Ok(node)
    }

    /// Resolve a parsed path; see [`Schema::resolve_path`].
    #[must_use]
    pub fn resolve(&self, path: &AttributePath) -> Arc<SchemaNode> {
        let display = path.to_string();
        match path::normalize(&display) {
            Ok(key) => {
                if let Some(node) = self.path_cache.get(&key) {
                    return Arc::clone(node.value());
                }
                let node = path::resolve(&self.root, path);
                self.path_cache.insert(key, Arc::clone(&node));
                node
            }
            Err(_) => path::resolve(&self.root, path),
        }
    }

    /// Number of cached paths.
    #[must_use]
    pub fn cached_paths(&self) -> usize {
        self.path_cache.len()
    }

    /// Marshall a key. `key` is either a bare partition-key value or a map of
    /// key attributes. Date attributes are converted to their stored form.
    ///
    /// # Errors
    ///
    /// Fails on undefined members and unmarshallable values.
    pub fn marshall_key(&self, key: &Value, options: MarshallOptions) -> Result<Item, MapperError> {
        let mut map = match key {
            Value::Map(m) => m.clone(),
            other => IndexMap::from([(self.primary_key.clone(), other.clone())]),
        };
        for (name, value) in &mut map {
            if value.is_undefined() {
                return Err(MapperError::configuration(format!(
                    "'{name}' can not use 'undefined' as condition value."
                )));
            }
            if let Some(node) = self.field(name) {
                *value = node.to_storage(value);
            }
        }
        Ok(marshall_item(&Value::Map(map), options)?)
    }

    /// Table provisioning metadata. Global indexes declared without capacity
    /// use the configured defaults.
    #[must_use]
    pub fn table_definition(&self, table_name: &str, config: &MapperConfig) -> TableDefinition {
        let default_throughput = ProvisionedThroughput {
            read_capacity_units: config.default_read_capacity,
            write_capacity_units: config.default_write_capacity,
        };
        TableDefinition {
            table_name: table_name.to_owned(),
            key_schema: self.key_schema.clone(),
            attribute_definitions: self.attribute_definitions.clone(),
            local_secondary_indexes: self.local_indexes.clone(),
            global_secondary_indexes: self
                .global_indexes
                .iter()
                .cloned()
                .map(|mut gsi| {
                    gsi.provisioned_throughput.get_or_insert(default_throughput);
                    gsi
                })
                .collect(),
        }
    }
}
