//! Schema compiler, expression compilers and item pipeline for dynaql.
//!
//! A [`Schema`] is compiled once from a [`SchemaDecl`] and shared by every
//! [`Model`] of its table. Models turn native [`Value`] documents into store
//! requests: conditions and updates are compiled against the schema, items
//! run through defaults, setters and validation, and everything leaves as a
//! [`StoreRequest`] through a [`Transport`].
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod callback;
pub mod config;
pub mod date;
pub mod error;
pub mod expression;
pub mod model;
pub mod schema;
pub mod transform;
pub mod transport;
pub mod validate;

pub use callback::{ComputedDefault, Getter, Setter, Validator};
pub use config::MapperConfig;
pub use date::DateFormat;
pub use dynaql_model::Value;
pub use error::{MapperError, ValidationError, ValidationKind};
pub use model::{IndexQuery, Model, ReadOptions, Selection, TransactOptions, WriteOptions};
pub use schema::{FieldDecl, Schema, SchemaDecl};
pub use transport::{StoreRequest, StoreResponse, Transport};
