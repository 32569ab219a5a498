use futures::FutureExt;
use futures::future::BoxFuture;

use dynaql_model::Value;

use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, SchemaNode};
use crate::validate::child_path;

/// Run setters through the value and convert dates to their stored numbers.
///
/// Setters receive the value as the caller wrote it; a date setter may return
/// anything that parses as a date. A declared key whose setter returns
/// `Undefined` is kept as `Undefined` so it is left out of the stored item.
pub(super) fn apply<'a>(
    node: &'a SchemaNode,
    value: Value,
    path: String,
    cx: &'a SetterContext<'a>,
) -> BoxFuture<'a, Value> {
    async move {
        if value.is_undefined() {
            return Value::Undefined;
        }
        let Some(node) = cx.resolutions.resolve(node, &path, &value) else {
            return value;
        };
        let (item, context) = (cx.item, cx.context);

        let mut value = value;
        if let Some(setter) = &node.setter {
            value = setter.call(value, item.clone(), context.clone()).await;
        }
        if node.is_date() && value.is_truthy() {
            value = node.to_storage(&value);
        }

        match (&node.shape, &mut value) {
            (NodeShape::Object { fields, .. }, Value::Map(map)) => {
                for (name, child) in fields {
                    if let Some(slot) = map.get_mut(name) {
                        *slot = apply(child, std::mem::take(slot), child_path(&path, name), cx).await;
                    }
                }
            }
            (NodeShape::List { items }, Value::List(elements)) => {
                for (i, element) in elements.iter_mut().enumerate() {
                    *element = apply(items, std::mem::take(element), format!("{path}[{i}]"), cx).await;
                }
            }
            (NodeShape::Set { items }, Value::Set(members)) => {
                let mut out = Vec::with_capacity(members.len());
                for member in members.drain(..) {
                    out.push(apply(items, member, path.clone(), cx).await);
                }
                *members = super::dedup_members(out);
            }
            _ => {}
        }
        value
    }
    .boxed()
}

/// What every setter call of one write shares.
#[derive(Debug)]
pub(super) struct SetterContext<'a> {
    /// The item as the caller passed it.
    pub item: &'a Value,
    /// Caller-supplied context.
    pub context: &'a Value,
    /// Union picks of the operation.
    pub resolutions: &'a Resolutions,
}
