//! Update DSL compiler.
//!
//! A document such as `{name: "x", count: {$incr: 1}, tags: {$add: ["a"]}}`
//! becomes an [`UpdateExpr`]. A non-operator key whose value is a map nests
//! one path level deeper. Every assigned value is pruned and validated
//! against the node its path resolves to, and dates are converted to their
//! stored numbers.

use std::collections::HashSet;

use futures::FutureExt;
use futures::future::BoxFuture;

use dynaql_model::Value;
use indexmap::IndexMap;
use tracing::trace;

use crate::date;
use crate::error::MapperError;
use crate::expression::ast::{
    AddAction, AttributePath, DeleteAction, Operand, SetAction, SetValue, UpdateExpr,
};
use crate::schema::{Resolutions, Schema};
use crate::schema::node::SchemaNode;
use crate::transform::prune;
use crate::validate::validate;

/// Compile an update document for `table`.
///
/// # Errors
///
/// Returns a forbidden-operation error for unknown operators, unknown
/// top-level `$set` targets, arithmetic on enums, removal of required
/// attributes and several operators on one path. Validation errors of
/// assigned values are returned as they are.
///
/// # Examples
///
/// ```
/// use dynaql_core::expression::{ExpressionAttributes, compile_update};
/// use dynaql_core::{FieldDecl, Schema, SchemaDecl, Value};
/// use dynaql_model::MarshallOptions;
///
/// let schema = Schema::new(
///     &SchemaDecl::new()
///         .field("id", FieldDecl::string().primary_index())
///         .field("visits", FieldDecl::number()),
/// )?;
/// # tokio_test::block_on(async {
/// let doc = Value::from(serde_json::json!({"visits": {"$incr": 1}}));
/// let update = compile_update(&schema, "pages", &doc).await?;
/// let mut attrs = ExpressionAttributes::new(MarshallOptions::default());
/// assert_eq!(update.serialize(&mut attrs)?.as_deref(), Some("SET #n0 = #n0 + :v1"));
/// # Ok::<(), dynaql_core::MapperError>(())
/// # })?;
/// # Ok::<(), dynaql_core::MapperError>(())
/// ```
pub async fn compile_update(schema: &Schema, table: &str, doc: &Value) -> Result<UpdateExpr, MapperError> {
    let Value::Map(entries) = doc else {
        return Err(MapperError::configuration(format!(
            "Update expression must be an object. Received: {}",
            doc.kind_name()
        )));
    };
    let mut compiler = UpdateCompiler {
        schema,
        table,
        update: UpdateExpr::default(),
        targets: HashSet::new(),
    };
    compiler.compile(entries, None).await?;
    trace!(table, update = ?compiler.update, "compiled update");
    Ok(compiler.update)
}

struct UpdateCompiler<'a> {
    schema: &'a Schema,
    table: &'a str,
    update: UpdateExpr,
    targets: HashSet<String>,
}

impl<'a> UpdateCompiler<'a> {
    fn compile<'b>(
        &'b mut self,
        doc: &'b IndexMap<String, Value>,
        parent: Option<&'b str>,
    ) -> BoxFuture<'b, Result<(), MapperError>>
    where
        'a: 'b,
    {
        async move {
            for (name, field) in doc {
                if field.is_undefined() {
                    continue;
                }
                let raw_path = match parent {
                    None => name.clone(),
                    Some(p) if name.starts_with('$') => p.to_owned(),
                    Some(p) if name.starts_with('[') => format!("{p}{name}"),
                    Some(p) => format!("{p}.{name}"),
                };

                if !name.starts_with('$') {
                    match field {
                        Value::Map(nested) => self.compile(nested, Some(&raw_path)).await?,
                        Value::Null => self.set(&raw_path, SetValue::Operand(Operand::Value(Value::Null)))?,
                        _ => {
                            let value = self.coerce(&raw_path, field).await?;
                            self.set(&raw_path, SetValue::Operand(Operand::Value(value)))?;
                        }
                    }
                    continue;
                }

                match (name.as_str(), parent) {
                    ("$set" | "$ifNotExists", None) => {
                        let Value::Map(fields) = field else {
                            return Err(MapperError::configuration(format!(
                                "'{name}' at the top level must be an object of attribute names."
                            )));
                        };
                        self.top_level_set(name, fields).await?;
                    }
                    ("$remove", _) => self.remove(parent.unwrap_or_default(), field)?,
                    (_, None) => {
                        return Err(MapperError::configuration(format!(
                            "'{name}' must be nested under an attribute name."
                        )));
                    }
                    ("$set", Some(_)) => {
                        let value = self.coerce(&raw_path, field).await?;
                        self.set(&raw_path, SetValue::Operand(Operand::Value(value)))?;
                    }
                    ("$ifNotExists", Some(_)) => {
                        let value = self.coerce(&raw_path, field).await?;
                        let path = AttributePath::parse(&raw_path)?;
                        self.set(&raw_path, SetValue::IfNotExists(path, Operand::Value(value)))?;
                    }
                    ("$push" | "$unshift", Some(_)) => {
                        let pushed = Value::List(as_members(field));
                        let node = self.schema.resolve_path(&raw_path)?;
                        validate(&node, &pushed, &raw_path, self.table, &Resolutions::new()).await?;
                        let path = Operand::Path(AttributePath::parse(&raw_path)?);
                        let pushed = Operand::Value(pushed);
                        let value = if name == "$push" {
                            SetValue::ListAppend(path, pushed)
                        } else {
                            SetValue::ListAppend(pushed, path)
                        };
                        self.set(&raw_path, value)?;
                    }
                    ("$incr" | "$decr", Some(_)) => self.arithmetic(&raw_path, name, field.clone())?,
                    ("$date", Some(_)) => {
                        let node = self.schema.resolve_path(&raw_path)?;
                        #[allow(clippy::cast_precision_loss)]
                        let delta = date::date_change(node.date_format(), field)? as f64;
                        self.arithmetic(&raw_path, "$incr", Value::Number(delta))?;
                    }
                    ("$add" | "$delete", Some(_)) => {
                        let path = AttributePath::parse(&raw_path)?;
                        self.claim(&path)?;
                        let value = Operand::Value(Value::Set(as_members(field)));
                        if name == "$add" {
                            self.update.add_actions.push(AddAction { path, value });
                        } else {
                            self.update.delete_actions.push(DeleteAction { path, value });
                        }
                    }
                    _ => {
                        return Err(MapperError::forbidden(
                            self.table,
                            format!("Unknown update expression - \"{name}\""),
                        ));
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn top_level_set(&mut self, op: &str, fields: &IndexMap<String, Value>) -> Result<(), MapperError> {
        for (key, value) in fields {
            if value.is_undefined() {
                continue;
            }
            let Some(node) = self.schema.field(key) else {
                return Err(MapperError::forbidden(
                    self.table,
                    format!("Can not set \"{key}\" as it doesn't exists in Schema."),
                ));
            };
            let value = Operand::Value(coerce_with(node, key, value, self.table).await?);
            let path = AttributePath::field(key.clone());
            let value = if op == "$ifNotExists" {
                SetValue::IfNotExists(path, value)
            } else {
                SetValue::Operand(value)
            };
            self.set(key, value)?;
        }
        Ok(())
    }

    async fn coerce(&self, raw_path: &str, value: &Value) -> Result<Value, MapperError> {
        let node = self.schema.resolve_path(raw_path)?;
        coerce_with(&node, raw_path, value, self.table).await
    }

    fn arithmetic(&mut self, raw_path: &str, op: &str, amount: Value) -> Result<(), MapperError> {
        let node = self.schema.resolve_path(raw_path)?;
        if node.has_enum() {
            return Err(MapperError::forbidden(
                self.table,
                format!("{raw_path} can not be used with {op} as it is an enum."),
            ));
        }
        let path = AttributePath::parse(raw_path)?;
        let operands = (Operand::Path(path), Operand::Value(amount));
        let value = if op == "$decr" {
            SetValue::Minus(operands.0, operands.1)
        } else {
            SetValue::Plus(operands.0, operands.1)
        };
        self.set(raw_path, value)
    }

    fn remove(&mut self, parent: &str, targets: &Value) -> Result<(), MapperError> {
        for target in as_members(targets) {
            let nested = match index_of(&target) {
                Some(i) => format!("{parent}[{i}]"),
                None if parent.is_empty() => target.to_string(),
                None => format!("{parent}.{target}"),
            };
            let node = self.schema.resolve_path(&nested)?;
            if node.required {
                return Err(MapperError::forbidden(
                    self.table,
                    format!("{nested} can not be removed as it is marked as 'required'."),
                ));
            }
            let path = AttributePath::parse(&nested)?;
            self.claim(&path)?;
            self.update.remove_paths.push(path);
        }
        Ok(())
    }

    fn set(&mut self, raw_path: &str, value: SetValue) -> Result<(), MapperError> {
        let path = AttributePath::parse(raw_path)?;
        self.claim(&path)?;
        self.update.set_actions.push(SetAction { path, value });
        Ok(())
    }

    fn claim(&mut self, path: &AttributePath) -> Result<(), MapperError> {
        let key = path.to_string();
        if self.targets.insert(key.clone()) {
            Ok(())
        } else {
            Err(MapperError::forbidden(
                self.table,
                format!("Can not apply more than one update operator to \"{key}\"."),
            ))
        }
    }
}

/// Prune, validate and convert a value assigned to `node`.
async fn coerce_with(node: &SchemaNode, path: &str, value: &Value, table: &str) -> Result<Value, MapperError> {
    let mut value = value.clone();
    let resolutions = Resolutions::new();
    prune(node, &mut value, path, &resolutions);
    validate(node, &value, path, table, &resolutions).await?;
    Ok(node.to_storage(&value))
}

/// A list or set as its members, anything else as a single member.
fn as_members(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) | Value::Set(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// A list index given as a number or a numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn index_of(target: &Value) -> Option<usize> {
    match target {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
