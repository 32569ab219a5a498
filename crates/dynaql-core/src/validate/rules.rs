//! Checks of the synchronous phases.

use dynaql_model::Value;

use crate::error::{ValidationError, ValidationKind};
use crate::schema::node::{NodeShape, ScalarKind, SchemaNode};
use crate::validate::Rule;

/// Absent values of required nodes.
#[derive(Debug)]
pub(crate) struct RequiredRule;

impl Rule for RequiredRule {
    const KIND: ValidationKind = ValidationKind::MissingKey;
    const VISIT_UNDEFINED: bool = true;

    fn check(node: &SchemaNode, value: &Value, path: &str, errors: &mut ValidationError) -> bool {
        if node.required && value.is_undefined() {
            errors.add(path, "is required");
        }
        true
    }
}

/// Values whose kind differs from the node's.
#[derive(Debug)]
pub(crate) struct TypeRule;

impl Rule for TypeRule {
    const KIND: ValidationKind = ValidationKind::InvalidType;

    fn check(node: &SchemaNode, value: &Value, path: &str, errors: &mut ValidationError) -> bool {
        match &node.shape {
            NodeShape::Any => false,
            NodeShape::Union { variants } => {
                if variants.iter().any(|v| v.matches(value)) {
                    return true;
                }
                errors.add(
                    path,
                    format!("Excepted: {}. Received: {}", node.type_name(), value.kind_name()),
                );
                false
            }
            _ if node.matches(value) => true,
            _ if node.is_date() => {
                errors.add(
                    path,
                    format!(
                        "Excepted to be a valid date. Received: {} - {value}",
                        value.kind_name()
                    ),
                );
                false
            }
            _ => {
                errors.add(
                    path,
                    format!("Excepted: {}. Received: {}", node.type_name(), value.kind_name()),
                );
                false
            }
        }
    }
}

/// Values outside the declared enum.
#[derive(Debug)]
pub(crate) struct EnumRule;

impl Rule for EnumRule {
    const KIND: ValidationKind = ValidationKind::InvalidEnum;
    const VISIT_SET_MEMBERS: bool = true;

    fn check(node: &SchemaNode, value: &Value, path: &str, errors: &mut ValidationError) -> bool {
        if node.has_enum() && !node.enum_values.contains(value) {
            let allowed = node
                .enum_values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | ");
            errors.add(
                path,
                format!("Value '{value}' at '{path}' do not satisfies enum {allowed}"),
            );
        }
        true
    }
}

/// String lengths, number bounds, binary sizes and date bounds.
#[derive(Debug)]
pub(crate) struct RangeRule;

impl Rule for RangeRule {
    const KIND: ValidationKind = ValidationKind::InvalidRange;
    const VISIT_SET_MEMBERS: bool = true;

    fn check(node: &SchemaNode, value: &Value, path: &str, errors: &mut ValidationError) -> bool {
        let NodeShape::Scalar(kind) = node.shape else {
            return true;
        };
        match (kind, value) {
            (ScalarKind::String, Value::String(s)) => {
                let len = s.chars().count();
                if let Some(min) = node.min_length.filter(|m| len < *m) {
                    errors.add(
                        path,
                        format!("expected to have minimum length of {min}. Received: {len}"),
                    );
                }
                if let Some(max) = node.max_length.filter(|m| len > *m) {
                    errors.add(
                        path,
                        format!("expected to have maximum length of {max}. Received: {len}"),
                    );
                }
            }
            (ScalarKind::Number | ScalarKind::BigInt, Value::Number(_) | Value::BigInt(_)) => {
                let n = value.as_f64().unwrap_or_default();
                if let Some(min) = bound(node.min.as_ref()).filter(|m| n < *m) {
                    errors.add(path, format!("expected to be at least {}. Received: {value}", fmt_bound(min)));
                }
                if let Some(max) = bound(node.max.as_ref()).filter(|m| n > *m) {
                    errors.add(path, format!("expected to be maximum {}. Received: {value}", fmt_bound(max)));
                }
            }
            (ScalarKind::Binary, Value::Binary(b)) => {
                #[allow(clippy::cast_precision_loss)]
                let len = b.len() as f64;
                if let Some(min) = bound(node.min.as_ref()).filter(|m| len < *m) {
                    errors.add(
                        path,
                        format!("expected to have minimum size of {}. Received: {}", fmt_bound(min), b.len()),
                    );
                }
                if let Some(max) = bound(node.max.as_ref()).filter(|m| len > *m) {
                    errors.add(
                        path,
                        format!("expected to be maximum size of {}. Received: {}", fmt_bound(max), b.len()),
                    );
                }
            }
            (ScalarKind::Date, _) => {
                let Some(ts) = node.timestamp(value) else {
                    return true;
                };
                let shown = crate::date::date_from_millis(ts).map_or_else(|| value.clone(), Value::Date);
                if let Some(min) = node.min.as_ref().filter(|m| node.timestamp(m).is_some_and(|t| ts < t)) {
                    errors.add(path, format!("expected to be at least {min}. Received: {shown}"));
                }
                if let Some(max) = node.max.as_ref().filter(|m| node.timestamp(m).is_some_and(|t| ts > t)) {
                    errors.add(path, format!("expected to be maximum {max}. Received: {shown}"));
                }
            }
            _ => {}
        }
        true
    }
}

fn bound(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn fmt_bound(n: f64) -> String {
    dynaql_model::value::format_number(n)
}
