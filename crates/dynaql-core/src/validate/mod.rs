//! Five-phase validation.
//!
//! Phases run in order: required, type, enum, min/max, custom. Each phase
//! walks the whole tree, records every violation under its attribute path
//! and fails as one [`ValidationError`]. A phase only runs once every earlier
//! phase passed. Unions are checked against the variant recorded in the
//! operation's [`Resolutions`], so every phase sees the same variant.

mod custom;
mod rules;

use dynaql_model::Value;
use tracing::debug;

use crate::error::{MapperError, ValidationError, ValidationKind};
use crate::schema::Resolutions;
use crate::schema::node::{NodeShape, SchemaNode};

pub(crate) use rules::{EnumRule, RangeRule, RequiredRule, TypeRule};

/// Validate `value` against `node`. Paths in the error are rooted at `path`.
///
/// # Errors
///
/// Returns the first phase that recorded a violation.
pub async fn validate(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    table: &str,
    resolutions: &Resolutions,
) -> Result<(), MapperError> {
    run_phase::<RequiredRule>(node, value, path, table, resolutions)?;
    run_phase::<TypeRule>(node, value, path, table, resolutions)?;
    run_phase::<EnumRule>(node, value, path, table, resolutions)?;
    run_phase::<RangeRule>(node, value, path, table, resolutions)?;

    let mut errors = ValidationError::new(ValidationKind::CustomValidation, table);
    custom::visit(node, value, path.to_owned(), resolutions, &mut errors).await;
    report(errors)
}

fn run_phase<R: Rule>(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    table: &str,
    resolutions: &Resolutions,
) -> Result<(), MapperError> {
    let mut errors = ValidationError::new(R::KIND, table);
    visit::<R>(node, value, path, resolutions, &mut errors);
    report(errors)
}

/// Type-phase violations of `value` against `node`, with unions inside
/// resolved on the spot.
pub(crate) fn type_errors(node: &SchemaNode, value: &Value, path: &str) -> usize {
    let mut errors = ValidationError::new(ValidationKind::InvalidType, "");
    visit::<TypeRule>(node, value, path, &Resolutions::new(), &mut errors);
    errors.len()
}

fn report(errors: ValidationError) -> Result<(), MapperError> {
    if !errors.is_empty() {
        debug!(
            table = %errors.table,
            kind = %errors.kind,
            count = errors.len(),
            "validation failed"
        );
    }
    errors.into_result()
}

/// The check one synchronous phase applies at every node.
pub(crate) trait Rule {
    /// Phase reported in errors.
    const KIND: ValidationKind;
    /// Undefined values are checked too (only the required phase needs this).
    const VISIT_UNDEFINED: bool = false;
    /// Set members are visited as `path[i]`.
    const VISIT_SET_MEMBERS: bool = false;

    /// Check `value` against `node` itself. Returns `false` to stop
    /// descending into the value.
    fn check(node: &SchemaNode, value: &Value, path: &str, errors: &mut ValidationError) -> bool;
}

/// The recursive walk shared by every synchronous phase.
///
/// Object fields are visited in declaration order, list elements and set
/// members by index. A union descends only into its resolved variant.
pub(crate) fn visit<R: Rule>(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    resolutions: &Resolutions,
    errors: &mut ValidationError,
) {
    if value.is_undefined() && !R::VISIT_UNDEFINED {
        return;
    }
    if !R::check(node, value, path, errors) {
        return;
    }

    match (&node.shape, value) {
        (NodeShape::Object { fields, .. }, Value::Map(_)) => {
            for (name, child) in fields {
                visit::<R>(child, value.get(name), &child_path(path, name), resolutions, errors);
            }
        }
        (NodeShape::List { items }, Value::List(elements)) => {
            for (i, element) in elements.iter().enumerate() {
                visit::<R>(items, element, &format!("{path}[{i}]"), resolutions, errors);
            }
        }
        (NodeShape::Set { items }, Value::Set(members)) if R::VISIT_SET_MEMBERS => {
            for (i, member) in members.iter().enumerate() {
                visit::<R>(items, member, &format!("{path}[{i}]"), resolutions, errors);
            }
        }
        (NodeShape::Union { .. }, _) => {
            if let Some(variant) = resolutions.resolve(node, path, value) {
                visit::<R>(variant, value, path, resolutions, errors);
            }
        }
        _ => {}
    }
}

/// `parent.name`, or `name` at the root.
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::callback::Validator;
    use crate::date::DateFormat;
    use crate::schema::{FieldDecl, Schema, SchemaDecl};

    fn schema() -> Schema {
        Schema::new(
            &SchemaDecl::new()
                .field("id", FieldDecl::string().primary_index())
                .field("name", FieldDecl::string().required().min_length(2).max_length(5))
                .field("age", FieldDecl::number().min(0).max(130))
                .field("role", FieldDecl::string().enum_values(["admin", "user"]))
                .field(
                    "address",
                    FieldDecl::object([
                        ("city", FieldDecl::string()),
                        ("zip", FieldDecl::number().required()),
                    ]),
                )
                .field("tags", FieldDecl::list(FieldDecl::string().enum_values(["a", "b"])))
                .field(
                    "nick",
                    FieldDecl::string().validator(Validator::new(|v: Value| async move {
                        (v.as_str() == Some("root")).then(|| "reserved".to_owned())
                    })),
                )
                .field("born", FieldDecl::date().format(DateFormat::Timestamp)),
        )
        .unwrap()
    }

    async fn check(item: serde_json::Value) -> Result<(), MapperError> {
        let schema = schema();
        let root = Arc::clone(schema.root());
        validate(&root, &Value::from(item), "", "users", &Resolutions::new()).await
    }

    fn details(result: Result<(), MapperError>) -> (ValidationKind, Vec<(String, String)>) {
        let err = result.unwrap_err();
        let v = err.as_validation().unwrap();
        (v.kind, v.details.clone().into_iter().collect())
    }

    #[tokio::test]
    async fn test_should_accept_valid_item() {
        check(json!({
            "id": "u1", "name": "Ann", "age": 30, "role": "admin",
            "address": {"city": "Oslo", "zip": 1234}, "tags": ["a"], "born": "1990-05-01"
        }))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_should_collect_every_missing_key() {
        let (kind, details) = details(check(json!({"address": {"city": "x"}})).await);
        assert_eq!(kind, ValidationKind::MissingKey);
        assert_eq!(
            details,
            vec![
                ("id".to_owned(), "is required".to_owned()),
                ("name".to_owned(), "is required".to_owned()),
                ("address.zip".to_owned(), "is required".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_report_type_mismatches() {
        let (kind, details) = details(
            check(json!({"id": "u1", "name": 5, "tags": ["a", 3], "born": "soon"})).await,
        );
        assert_eq!(kind, ValidationKind::InvalidType);
        assert_eq!(details[0], ("name".to_owned(), "Excepted: S. Received: N".to_owned()));
        assert_eq!(details[1], ("tags[1]".to_owned(), "Excepted: S. Received: N".to_owned()));
        assert_eq!(
            details[2],
            ("born".to_owned(), "Excepted to be a valid date. Received: S - soon".to_owned())
        );
    }

    #[tokio::test]
    async fn test_should_report_enum_violations() {
        let (kind, details) =
            details(check(json!({"id": "u1", "name": "Ann", "role": "root", "tags": ["c"]})).await);
        assert_eq!(kind, ValidationKind::InvalidEnum);
        assert_eq!(
            details[0].1,
            "Value 'root' at 'role' do not satisfies enum admin | user"
        );
        assert_eq!(details[1].0, "tags[0]");
    }

    #[tokio::test]
    async fn test_should_report_range_violations() {
        let (kind, details) =
            details(check(json!({"id": "u1", "name": "Annabelle", "age": -1})).await);
        assert_eq!(kind, ValidationKind::InvalidRange);
        assert_eq!(
            details,
            vec![
                (
                    "name".to_owned(),
                    "expected to have maximum length of 5. Received: 9".to_owned()
                ),
                ("age".to_owned(), "expected to be at least 0. Received: -1".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_run_custom_validators_last() {
        let (kind, details) = details(check(json!({"id": "u1", "name": "Ann", "nick": "root"})).await);
        assert_eq!(kind, ValidationKind::CustomValidation);
        assert_eq!(details, vec![("nick".to_owned(), "reserved".to_owned())]);
    }

    fn pets() -> Schema {
        Schema::new(
            &SchemaDecl::new()
                .field("id", FieldDecl::string().primary_index())
                .field(
                    "pet",
                    FieldDecl::union([
                        FieldDecl::object([("meow", FieldDecl::boolean()), ("lives", FieldDecl::number())]),
                        FieldDecl::object([("bark", FieldDecl::string())]),
                    ]),
                )
                .field(
                    "tag",
                    FieldDecl::union([
                        FieldDecl::object([("kind", FieldDecl::string().enum_values(["cat"]))]),
                        FieldDecl::object([("kind", FieldDecl::string()), ("extra", FieldDecl::number())]),
                    ]),
                ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_should_check_every_phase_against_the_resolved_variant() {
        let schema = pets();
        let item = Value::from(json!({"id": "1", "pet": {"meow": "yes"}}));
        let err = validate(schema.root(), &item, "", "pets", &Resolutions::new())
            .await
            .unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!(v.kind, ValidationKind::MissingKey);
        assert_eq!(v.get("pet.lives"), Some("is required"));
        assert_eq!(v.get("pet.bark"), None);

        let item = Value::from(json!({"id": "1", "pet": 4}));
        let err = validate(schema.root(), &item, "", "pets", &Resolutions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().get("pet"),
            Some("Excepted: M | M. Received: N")
        );
    }

    #[tokio::test]
    async fn test_should_not_switch_variant_to_satisfy_an_enum() {
        let schema = pets();
        let item = Value::from(json!({"id": "1", "tag": {"kind": "dog"}}));
        let resolutions = Resolutions::new();
        let err = validate(schema.root(), &item, "", "pets", &resolutions)
            .await
            .unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!(v.kind, ValidationKind::InvalidEnum);
        assert_eq!(
            v.get("tag.kind"),
            Some("Value 'dog' at 'tag.kind' do not satisfies enum cat")
        );
        assert_eq!(resolutions.len(), 1);
    }
}
