use dynaql_model::Value;

use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, SchemaNode};
use crate::validate::child_path;

/// Remove keys of closed objects that the schema does not declare.
pub fn prune(node: &SchemaNode, value: &mut Value, path: &str, resolutions: &Resolutions) {
    match (&node.shape, value) {
        (NodeShape::Object { fields, allow_undeclared }, Value::Map(map)) => {
            if !*allow_undeclared {
                map.retain(|key, _| fields.contains_key(key));
            }
            for (key, child) in map.iter_mut() {
                if let Some(field) = fields.get(key) {
                    prune(field, child, &child_path(path, key), resolutions);
                }
            }
        }
        (NodeShape::List { items }, Value::List(elements)) => {
            for (i, element) in elements.iter_mut().enumerate() {
                prune(items, element, &format!("{path}[{i}]"), resolutions);
            }
        }
        (NodeShape::Union { .. }, value) => {
            if let Some(variant) = resolutions.resolve(node, path, value) {
                prune(variant, value, path, resolutions);
            }
        }
        _ => {}
    }
}
