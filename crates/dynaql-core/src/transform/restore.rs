use dynaql_model::Value;

use crate::date;
use crate::schema::node::{NodeShape, ScalarKind, SchemaNode};

/// Restore schema types in a stored value: numbers of date nodes become
/// dates and numbers of big integer nodes become big integers.
#[must_use]
pub fn restore(node: &SchemaNode, value: Value) -> Value {
    let node = match node.variants() {
        Some(_) => match node.predict_variant(&value) {
            Some(variant) => variant.as_ref(),
            None => return value,
        },
        None => node,
    };

    match (&node.shape, restore_scalar(node, value)) {
        (NodeShape::Object { fields, .. }, Value::Map(mut map)) => {
            for (name, child) in fields {
                if let Some(slot) = map.get_mut(name) {
                    *slot = restore(child, std::mem::take(slot));
                }
            }
            Value::Map(map)
        }
        (NodeShape::List { items }, Value::List(elements)) => {
            Value::List(elements.into_iter().map(|e| restore(items, e)).collect())
        }
        (NodeShape::Set { items }, Value::Set(members)) => {
            Value::Set(members.into_iter().map(|m| restore(items, m)).collect())
        }
        (_, value) => value,
    }
}

/// Restore the value of `node` itself without descending.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn restore_scalar(node: &SchemaNode, value: Value) -> Value {
    match (&node.shape, value) {
        (NodeShape::Scalar(ScalarKind::BigInt), Value::Number(n)) if n.fract() == 0.0 => {
            Value::BigInt(n as i128)
        }
        (NodeShape::Scalar(ScalarKind::Date), Value::Number(n)) => node
            .date_format()
            .from_storage(n)
            .and_then(date::date_from_millis)
            .map_or(Value::Number(n), Value::Date),
        (_, value) => value,
    }
}
