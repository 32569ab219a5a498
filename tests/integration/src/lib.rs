//! Scenario tests for dynaql against an in-memory store.
//!
//! Every scenario compiles real requests through a [`Model`] and executes
//! them on a [`MemoryTransport`], so conditions, updates and key handling
//! are checked end to end without a running store.
//!
//! Run them with:
//! ```text
//! cargo test -p dynaql-integration
//! ```

use std::sync::{Arc, Once};

use dynaql_core::{Model, Schema};

mod memory;

pub use memory::MemoryTransport;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// The `orders` declaration: `customer` partition key, `orderId` sort key and
/// a `byStatus` global index.
#[must_use]
pub fn orders_declaration() -> serde_json::Value {
    serde_json::json!({
        "customer": {"type": "String", "primaryIndex": true, "required": true},
        "orderId": {"type": "Number", "sortKey": true, "required": true},
        "status": {
            "type": "String",
            "enum": ["open", "shipped"],
            "default": "open",
            "GSI": {"indexName": "byStatus"}
        },
        "total": {"type": "Number", "min": 0},
        "note": {"type": "String", "trim": true, "lowercase": true},
        "tags": {"type": "Set", "items": "String"}
    })
}

/// Compile the `orders` declaration into a model on a fresh in-memory table.
///
/// # Panics
///
/// Panics if the declaration does not compile.
#[must_use]
pub fn orders_model() -> (Model, Arc<MemoryTransport>) {
    init_tracing();

    let schema = Schema::from_json(&orders_declaration())
        .unwrap_or_else(|e| panic!("orders declaration must compile: {e}"));
    let transport = Arc::new(MemoryTransport::default());
    let model = Model::new(test_table_name("orders"), Arc::new(schema), transport.clone());
    transport.create_table(&model);
    (model, transport)
}

mod test_batch;
mod test_crud;
mod test_query;
mod test_schema;
mod test_transact;
