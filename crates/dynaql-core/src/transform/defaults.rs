use futures::FutureExt;
use futures::future::BoxFuture;

use dynaql_model::Value;

use crate::schema::Resolutions;
use crate::schema::node::{DefaultValue, NodeShape, SchemaNode};
use crate::validate::child_path;

/// Fill absent values that declare a default. Computed defaults receive the
/// whole item; a computed `Undefined` leaves the value absent. Every filled
/// value is a fresh copy of the declared default.
pub(super) fn apply<'a>(
    node: &'a SchemaNode,
    value: Value,
    path: String,
    item: &'a Value,
    resolutions: &'a Resolutions,
) -> BoxFuture<'a, Value> {
    async move {
        let mut value = value;
        if value.is_undefined() {
            match &node.default {
                Some(DefaultValue::Static(v)) => value = v.clone(),
                Some(DefaultValue::Computed(f)) => value = f.call(item.clone()).await,
                None => {}
            }
        }

        match &node.shape {
            NodeShape::Object { fields, .. } => {
                if let Value::Map(map) = &mut value {
                    for (name, child) in fields {
                        let current = map.get_mut(name).map(std::mem::take).unwrap_or_default();
                        let filled = apply(child, current, child_path(&path, name), item, resolutions).await;
                        if !filled.is_undefined() {
                            map.insert(name.clone(), filled);
                        }
                    }
                }
            }
            NodeShape::List { items } => {
                if let Value::List(elements) = &mut value {
                    for (i, element) in elements.iter_mut().enumerate() {
                        let current = std::mem::take(element);
                        *element = apply(items, current, format!("{path}[{i}]"), item, resolutions).await;
                    }
                }
            }
            NodeShape::Union { .. } => {
                if let Some(variant) = resolutions.resolve(node, &path, &value) {
                    return apply(variant, value, path, item, resolutions).await;
                }
            }
            _ => {}
        }
        value
    }
    .boxed()
}
