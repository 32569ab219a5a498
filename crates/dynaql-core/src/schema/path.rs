//! Path resolution against the schema tree.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::MapperError;
use crate::expression::ast::{AttributePath, PathElement};
use crate::schema::node::{NodeShape, SchemaNode};

static INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("static regex compiles"));

pub(crate) static ANY_NODE: LazyLock<Arc<SchemaNode>> = LazyLock::new(|| Arc::new(SchemaNode::any()));

pub(crate) static UNDEFINED_NODE: LazyLock<Arc<SchemaNode>> =
    LazyLock::new(|| Arc::new(SchemaNode::undefined()));

/// Cache key of `path`: every numeric index replaced by `[#]`.
///
/// # Errors
///
/// A literal `[#]` in the caller's path is rejected.
pub(crate) fn normalize(path: &str) -> Result<String, MapperError> {
    if path.contains("[#]") {
        return Err(MapperError::configuration(
            "'[#]' is a placeholder. Please use a real number.",
        ));
    }
    Ok(INDEX_RE.replace_all(path, "[#]").into_owned())
}

/// Walk `path` down from `node`.
///
/// An object with an unknown child yields the `ANY` node when it keeps
/// undeclared keys and the undefined node otherwise. Nodes that can not be
/// descended resolve to themselves.
pub(crate) fn resolve(node: &Arc<SchemaNode>, path: &AttributePath) -> Arc<SchemaNode> {
    let mut current = Arc::clone(node);
    for element in &path.elements {
        let next = match (&current.shape, element) {
            (NodeShape::Object { fields, allow_undeclared }, PathElement::Attribute(name)) => {
                Some(match fields.get(name) {
                    Some(child) => Arc::clone(child),
                    None if *allow_undeclared => Arc::clone(&ANY_NODE),
                    None => Arc::clone(&UNDEFINED_NODE),
                })
            }
            (NodeShape::Object { allow_undeclared, .. }, PathElement::Index(_)) => {
                Some(if *allow_undeclared {
                    Arc::clone(&ANY_NODE)
                } else {
                    Arc::clone(&UNDEFINED_NODE)
                })
            }
            (NodeShape::List { items } | NodeShape::Set { items }, PathElement::Index(_)) => {
                Some(Arc::clone(items))
            }
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}
