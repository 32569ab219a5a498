//! The custom-validator phase.
//!
//! Validators are awaited one at a time in declaration order. Unions run
//! the validators of their recorded variant.

use futures::FutureExt;
use futures::future::BoxFuture;

use dynaql_model::Value;

use crate::error::ValidationError;
use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, SchemaNode};
use crate::validate::child_path;

pub(super) fn visit<'a>(
    node: &'a SchemaNode,
    value: &'a Value,
    path: String,
    resolutions: &'a Resolutions,
    errors: &'a mut ValidationError,
) -> BoxFuture<'a, ()> {
    async move {
        if value.is_undefined() {
            return;
        }
        let Some(node) = resolutions.resolve(node, &path, value) else {
            return;
        };

        if let Some(validator) = &node.validator {
            if let Some(message) = validator.call(value.clone()).await {
                errors.add(&path, message);
            }
        }

        match (&node.shape, value) {
            (NodeShape::Object { fields, .. }, Value::Map(map)) => {
                for (name, child) in fields {
                    if let Some(child_value) = map.get(name) {
                        visit(child, child_value, child_path(&path, name), resolutions, errors).await;
                    }
                }
            }
            (NodeShape::List { items }, Value::List(elements)) => {
                for (i, element) in elements.iter().enumerate() {
                    visit(items, element, format!("{path}[{i}]"), resolutions, errors).await;
                }
            }
            (NodeShape::Set { items }, Value::Set(members)) => {
                let Some(validator) = &items.validator else {
                    return;
                };
                for (i, member) in members.iter().enumerate() {
                    if let Some(message) = validator.call(member.clone()).await {
                        errors.add(&format!("{path}[{i}]"), message);
                    }
                }
            }
            _ => {}
        }
    }
    .boxed()
}
