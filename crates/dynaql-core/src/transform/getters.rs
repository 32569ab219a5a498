use futures::FutureExt;
use futures::future::BoxFuture;

use dynaql_model::Value;

use super::restore::restore_scalar;
use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, SchemaNode};
use crate::validate::child_path;

/// Restore types and run getters bottom-up: children are read before the
/// getter of their parent sees them. Values whose kind does not match their
/// node are returned restored but otherwise untouched.
pub(super) fn apply<'a>(
    node: &'a SchemaNode,
    value: Value,
    path: String,
    item: &'a Value,
    context: &'a Value,
    resolutions: &'a Resolutions,
) -> BoxFuture<'a, Value> {
    async move {
        let Some(node) = resolutions.resolve(node, &path, &value) else {
            return value;
        };

        let mut value = restore_scalar(node, value);
        if !node.matches(&value) {
            return value;
        }

        match (&node.shape, &mut value) {
            (NodeShape::Object { fields, .. }, Value::Map(map)) => {
                for (name, child) in fields {
                    if let Some(slot) = map.get_mut(name) {
                        let current = std::mem::take(slot);
                        *slot = apply(child, current, child_path(&path, name), item, context, resolutions).await;
                    }
                }
            }
            (NodeShape::List { items }, Value::List(elements)) => {
                for (i, element) in elements.iter_mut().enumerate() {
                    let current = std::mem::take(element);
                    *element = apply(items, current, format!("{path}[{i}]"), item, context, resolutions).await;
                }
            }
            (NodeShape::Set { items }, Value::Set(members)) => {
                for member in members.iter_mut() {
                    let current = std::mem::take(member);
                    *member = apply(items, current, path.clone(), item, context, resolutions).await;
                }
            }
            _ => {}
        }

        match &node.getter {
            Some(getter) => getter.call(value, item.clone(), context.clone()).await,
            None => value,
        }
    }
    .boxed()
}
