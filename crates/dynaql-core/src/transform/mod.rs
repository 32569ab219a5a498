//! Item transforms applied around validation and storage.
//!
//! Writes go through defaults, string modifiers, setters and pruning of
//! undeclared keys, in that order. Reads restore schema types (dates, big
//! integers) and then run getters.

mod defaults;
mod getters;
mod prune;
mod restore;
mod setters;
mod strings;

use dynaql_model::Value;

use crate::schema::Resolutions;
use crate::schema::node::SchemaNode;

pub use prune::prune;
pub use restore::restore;
pub use strings::apply_string_modifiers;

/// Prepare an item for validation and marshalling.
///
/// Setters receive the item as the caller passed it and `context` unchanged.
/// Unions are resolved into `resolutions` by the first step that reaches
/// them; pass the same table on to validation.
pub async fn prepare_write(
    node: &SchemaNode,
    item: Value,
    context: &Value,
    resolutions: &Resolutions,
) -> Value {
    let raw = item.clone();
    let item = defaults::apply(node, item, String::new(), &raw, resolutions).await;
    let item = strings::apply_string_modifiers(node, item, "", resolutions);
    let cx = setters::SetterContext {
        item: &raw,
        context,
        resolutions,
    };
    let mut item = setters::apply(node, item, String::new(), &cx).await;
    prune(node, &mut item, "", resolutions);
    item
}

/// Turn a stored item back into what callers expect.
///
/// Getters receive the stored item as the whole-item argument.
pub async fn prepare_read(node: &SchemaNode, item: Value, context: &Value) -> Value {
    let stored = item.clone();
    getters::apply(node, item, String::new(), &stored, context, &Resolutions::new()).await
}

/// Members of a set with duplicates removed, first occurrence kept.
fn dedup_members(members: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(members.len());
    for member in members {
        if !member.is_undefined() && !out.contains(&member) {
            out.push(member);
        }
    }
    out
}
