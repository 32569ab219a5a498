use dynaql_model::Value;

use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, ScalarKind, SchemaNode};
use crate::validate::child_path;

/// Apply `trim`, `lowercase`/`uppercase` and `capitalize` to string values,
/// in that order.
#[must_use]
pub fn apply_string_modifiers(node: &SchemaNode, value: Value, path: &str, resolutions: &Resolutions) -> Value {
    match (&node.shape, value) {
        (NodeShape::Scalar(ScalarKind::String), Value::String(s)) => Value::String(modify(node, s)),
        (NodeShape::Object { fields, .. }, Value::Map(mut map)) => {
            for (name, child) in fields {
                if let Some(slot) = map.get_mut(name) {
                    *slot = apply_string_modifiers(child, std::mem::take(slot), &child_path(path, name), resolutions);
                }
            }
            Value::Map(map)
        }
        (NodeShape::List { items }, Value::List(elements)) => Value::List(
            elements
                .into_iter()
                .enumerate()
                .map(|(i, e)| apply_string_modifiers(items, e, &format!("{path}[{i}]"), resolutions))
                .collect(),
        ),
        (NodeShape::Set { items }, Value::Set(members)) => Value::Set(super::dedup_members(
            members
                .into_iter()
                .map(|m| apply_string_modifiers(items, m, path, resolutions))
                .collect(),
        )),
        (NodeShape::Union { .. }, value) => match resolutions.resolve(node, path, &value) {
            Some(variant) => apply_string_modifiers(variant, value, path, resolutions),
            None => value,
        },
        (_, value) => value,
    }
}

fn modify(node: &SchemaNode, s: String) -> String {
    let mut s = if node.trim { s.trim().to_owned() } else { s };
    if node.lowercase {
        s = s.to_lowercase();
    } else if node.uppercase {
        s = s.to_uppercase();
    }
    if node.capitalize {
        let mut chars = s.chars();
        if let Some(first) = chars.next() {
            s = first.to_uppercase().chain(chars).collect();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn string_node(f: impl FnOnce(&mut SchemaNode)) -> SchemaNode {
        let mut node = SchemaNode::new(NodeShape::Scalar(ScalarKind::String));
        f(&mut node);
        node
    }

    #[test]
    fn test_should_prefer_lowercase_over_uppercase() {
        let node = string_node(|n| {
            n.trim = true;
            n.lowercase = true;
            n.uppercase = true;
            n.capitalize = true;
        });
        let resolutions = Resolutions::new();
        assert_eq!(
            apply_string_modifiers(&node, Value::from("  hELLO "), "v", &resolutions),
            Value::from("Hello")
        );
        assert_eq!(apply_string_modifiers(&node, Value::from(3), "v", &resolutions), Value::from(3));
    }

    #[test]
    fn test_should_dedupe_modified_set_members() {
        let node = SchemaNode::new(NodeShape::Set {
            items: Arc::new(string_node(|n| n.lowercase = true)),
        });
        assert_eq!(
            apply_string_modifiers(&node, Value::set(["A", "a", "b"]), "tags", &Resolutions::new()),
            Value::set(["a", "b"])
        );
    }
}
