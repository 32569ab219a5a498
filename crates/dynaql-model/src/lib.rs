//! Wire and value model types for dynaql.
//!
//! This crate holds the tagged wire representation (`AttributeValue`), the
//! request and response payloads of the item-level store operations, the
//! native `Value` tree applications work with, and the marshaller between the
//! two. The types are hand-written since the store's JSON protocol makes serde
//! derives trivial.
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod marshall;
pub mod operations;
pub mod output;
pub mod types;
pub mod value;

pub use attribute_value::{AttributeValue, Item};
pub use error::{StoreError, StoreErrorCode};
pub use marshall::{MarshallError, MarshallOptions};
pub use operations::StoreOperation;
pub use types::AttributeKind;
pub use value::Value;
