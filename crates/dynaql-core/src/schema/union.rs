//! Picking the union variant a value belongs to.
//!
//! A date variant wins as soon as the value parses as a date. Otherwise the
//! variants with the value's storage kind are candidates: a single candidate
//! wins outright, and several map or list candidates are scored against the
//! value's structure. Ties go to closed objects before open ones, then to
//! declaration order.
//!
//! One operation resolves each union once: [`Resolutions`] records the pick
//! per attribute path and every later pass over the same item reuses it.

use std::sync::Arc;

use dashmap::DashMap;
use dynaql_model::{AttributeKind, Value};
use indexmap::IndexMap;

use crate::schema::node::SchemaNode;

impl SchemaNode {
    /// The variant of this union that `value` belongs to. `None` for
    /// non-union nodes and values no variant accepts.
    #[must_use]
    pub fn predict_variant(&self, value: &Value) -> Option<&Arc<SchemaNode>> {
        predict(self.variants()?, value)
    }
}

/// Pick the variant of `variants` that `value` belongs to.
#[must_use]
pub fn predict<'a>(variants: &'a [Arc<SchemaNode>], value: &Value) -> Option<&'a Arc<SchemaNode>> {
    let kind = value.kind();
    let mut found: Vec<&Arc<SchemaNode>> = Vec::new();

    for variant in variants {
        if variant.is_date() && variant.timestamp(value).is_some() {
            return Some(variant);
        }
        if kind.is_some() && variant.storage_kind() == kind {
            let nestable = matches!(kind, Some(AttributeKind::M | AttributeKind::L));
            if nestable || !found.iter().any(|f| f.storage_kind() == kind) {
                found.push(variant);
            }
        }
    }

    match found.len() {
        0 => None,
        1 => Some(found[0]),
        _ => best_match(&found, value),
    }
}

/// Union variants picked during one operation, keyed by attribute path.
///
/// The first pass that reaches a union at a path resolves it and records
/// the pick. Later passes get the recorded variant back even if the value
/// changed in between.
#[derive(Debug, Default)]
pub struct Resolutions {
    chosen: DashMap<String, Option<usize>>,
}

impl Resolutions {
    /// An empty table for a new operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The node `value` at `path` is checked against: `node` itself, or the
    /// resolved variant when `node` is a union. `None` when no variant
    /// accepts the value. Undefined values are never recorded.
    #[must_use]
    pub fn resolve<'a>(&self, node: &'a SchemaNode, path: &str, value: &Value) -> Option<&'a SchemaNode> {
        let mut node = node;
        let mut key = path.to_owned();
        while let Some(variants) = node.variants() {
            if value.is_undefined() {
                return None;
            }
            let index = *self
                .chosen
                .entry(key.clone())
                .or_insert_with(|| choose(variants, path, value));
            node = variants.get(index?)?.as_ref();
            key.push('|');
        }
        Some(node)
    }

    /// Number of recorded picks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    /// Returns `true` if nothing was resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Index of the variant for `value`. When scoring cannot separate the
/// kind-matching variants, the one with the fewest type violations wins,
/// first declared on a tie.
fn choose(variants: &[Arc<SchemaNode>], path: &str, value: &Value) -> Option<usize> {
    if let Some(picked) = predict(variants, value) {
        return variants.iter().position(|v| Arc::ptr_eq(v, picked));
    }
    variants
        .iter()
        .enumerate()
        .filter(|(_, v)| v.matches(value))
        .min_by_key(|(_, v)| crate::validate::type_errors(v, value, path))
        .map(|(i, _)| i)
}

fn best_match<'a>(candidates: &[&'a Arc<SchemaNode>], value: &Value) -> Option<&'a Arc<SchemaNode>> {
    match value {
        Value::Map(map) => {
            let scores = candidates
                .iter()
                .map(|c| (object_score(c, map), c.allows_undeclared()));
            pick_best(scores).map(|(i, _)| candidates[i])
        }
        Value::List(items) => best_array_match(candidates, items).map(|(i, _)| candidates[i]),
        _ => None,
    }
}

/// Index of the best `(score, open)` entry: highest score, then closed
/// before open, then first declared.
#[allow(clippy::float_cmp)]
fn pick_best(scores: impl Iterator<Item = (f64, bool)>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, bool)> = None;
    for (i, (score, open)) in scores.enumerate() {
        let better = match best {
            None => true,
            Some((_, s, o)) => score > s || (score == s && o && !open),
        };
        if better {
            best = Some((i, score, open));
        }
    }
    best.map(|(i, s, _)| (i, s))
}

#[allow(clippy::cast_precision_loss)]
fn object_score(node: &SchemaNode, value: &IndexMap<String, Value>) -> f64 {
    let Some(fields) = node.fields() else {
        return 0.0;
    };
    let mut matched = 0.0;

    for (key, v) in value {
        let Some(field) = fields.get(key) else {
            continue;
        };
        matched += 0.5;

        if field.storage_kind().is_some() && field.storage_kind() == v.kind() {
            matched += nested_score(field, v).unwrap_or(1.0);
        } else if let Some(variant) = field.predict_variant(v) {
            matched += nested_score(variant, v).unwrap_or(1.0);
        } else if field.is_date() && field.timestamp(v).is_some() {
            matched += 1.0;
        }
    }

    if value.is_empty() && fields.is_empty() {
        return matched + 1.0;
    }

    let declared = fields.len() as f64;
    let unmatched = value.keys().filter(|k| !fields.contains_key(*k)).count() as f64;
    let open = node.allows_undeclared();

    if matched > 0.0 && matched >= declared {
        if open && matched > declared {
            matched += unmatched;
        }
        return matched;
    }
    if open { matched + unmatched } else { matched }
}

/// Score of a map or list value against `node`, `None` for scalars.
fn nested_score(node: &Arc<SchemaNode>, value: &Value) -> Option<f64> {
    match value {
        Value::Map(map) => Some(object_score(node, map)),
        Value::List(items) => Some(best_array_match(&[node], items).map_or(0.0, |(_, s)| s)),
        _ => None,
    }
}

fn best_array_match(candidates: &[&Arc<SchemaNode>], elements: &[Value]) -> Option<(usize, f64)> {
    let items: Vec<Option<&Arc<SchemaNode>>> = candidates.iter().map(|c| c.items()).collect();
    let mut scores = vec![0.0; candidates.len()];
    let date_index = items.iter().position(|i| i.is_some_and(|n| n.is_date()));

    for element in elements {
        let kind = element.kind();
        let found = match date_index {
            Some(di) if items[di].is_some_and(|n| n.timestamp(element).is_some()) => Some(di),
            _ => items.iter().position(|i| {
                i.is_some_and(|n| match n.variants() {
                    Some(variants) => variants.iter().any(|u| kind.is_some() && u.storage_kind() == kind),
                    None => kind.is_some() && n.storage_kind() == kind,
                })
            }),
        };
        let Some(found) = found else {
            continue;
        };

        if !matches!(element, Value::Map(_) | Value::List(_)) {
            scores[found] += 1.0;
            continue;
        }
        for (ai, item) in items.iter().enumerate() {
            let Some(item) = item else {
                continue;
            };
            if item.storage_kind() == kind {
                scores[ai] += nested_score(item, element).unwrap_or(0.0);
            } else if let Some(variant) = item.predict_variant(element) {
                scores[ai] += nested_score(variant, element).unwrap_or(0.0);
            }
        }
    }

    let open = items.iter().map(|i| i.is_some_and(|n| n.allows_undeclared()));
    pick_best(scores.iter().copied().zip(open)).filter(|(_, score)| *score > 0.0)
}
