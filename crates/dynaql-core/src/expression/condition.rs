//! Condition DSL compiler.
//!
//! Turns a nested condition document such as
//! `{id: "x", age: {$gt: 5, $lt: 10}}` into an [`Expr`] tree. Several keys at
//! one level form an implicit `$and` in key order. A non-operator key nests
//! one path level deeper when its value is itself a condition document and
//! compares for equality otherwise.

use dynaql_model::Value;
use indexmap::IndexMap;
use tracing::trace;

use crate::error::MapperError;
use crate::expression::ast::{AttributePath, CompareOp, Expr, FunctionName, LogicalOp, Operand};
use crate::schema::{Schema, TypeTag};

/// Every operator a condition document may use.
pub const CONDITION_OPERATORS: &[&str] = &[
    "$and",
    "$or",
    "$not",
    "$eq",
    "$neq",
    "$gt",
    "$gte",
    "$lt",
    "$lte",
    "$in",
    "$between",
    "$size",
    "$includes",
    "$exists",
    "$type",
    "$startsWith",
];

const SIZE_OPERATORS: &str = "$eq, $neq, $gt, $gte, $lt, $lte, $in";

/// Compile a condition document. An empty document yields `None`.
///
/// # Errors
///
/// Returns a configuration error for undefined values, unknown operators and
/// operators with the wrong operand shape.
pub fn compile_condition(schema: &Schema, condition: &Value) -> Result<Option<Expr>, MapperError> {
    let expr = ConditionCompiler { schema }.compile(condition, None)?;
    trace!(condition = ?expr, "compiled condition");
    Ok(expr)
}

/// Compile a condition document rooted at `path`.
///
/// # Errors
///
/// See [`compile_condition`].
pub fn compile_condition_at(
    schema: &Schema,
    condition: &Value,
    path: &str,
) -> Result<Option<Expr>, MapperError> {
    ConditionCompiler { schema }.compile(condition, Some(path))
}

struct ConditionCompiler<'s> {
    schema: &'s Schema,
}

impl ConditionCompiler<'_> {
    fn compile(&self, condition: &Value, raw_path: Option<&str>) -> Result<Option<Expr>, MapperError> {
        let entries = match condition {
            Value::Map(m) => m,
            Value::Undefined | Value::Null => return Ok(None),
            other => {
                return Err(MapperError::configuration(format!(
                    "Condition at '{}' must be an object. Received: {}",
                    raw_path.unwrap_or_default(),
                    other.kind_name()
                )));
            }
        };

        if entries.len() > 1 {
            let children: Vec<Value> = entries
                .iter()
                .map(|(k, v)| Value::Map(IndexMap::from([(k.clone(), v.clone())])))
                .collect();
            return self.logical(LogicalOp::And, raw_path, &Value::List(children)).map(Some);
        }
        match entries.first() {
            Some((name, value)) => self.compile_entry(name, value, raw_path).map(Some),
            None => Ok(None),
        }
    }

    fn compile_entry(&self, name: &str, value: &Value, raw_path: Option<&str>) -> Result<Expr, MapperError> {
        if value.is_undefined() {
            let at = match raw_path {
                Some(p) if !name.is_empty() => format!("'{p}' > '{name}'"),
                _ => format!("'{name}'"),
            };
            return Err(MapperError::configuration(format!(
                "{at} can not use 'undefined' as condition value."
            )));
        }

        if !name.starts_with('$') {
            let current = match raw_path {
                Some(p) if name.starts_with('[') && name.ends_with(']') => format!("{p}{name}"),
                Some(p) => format!("{p}.{name}"),
                None => name.to_owned(),
            };
            if value.is_map() {
                return self.compile(value, Some(&current))?.ok_or_else(|| {
                    MapperError::configuration(format!(
                        "Invalid condition expression at \"{current}\".\nCondition expression can not be empty"
                    ))
                });
            }
            let value = self.normalize_date(&current, value)?;
            return Ok(Expr::compare(AttributePath::parse(&current)?, CompareOp::Eq, value));
        }

        match name {
            "$and" => self.logical(LogicalOp::And, raw_path, value),
            "$or" => self.logical(LogicalOp::Or, raw_path, value),
            "$not" => {
                let inner = self.compile(value, raw_path)?.ok_or_else(|| {
                    MapperError::configuration(format!(
                        "{} condition can not have 'undefined' condition.",
                        scope(raw_path, "$not")
                    ))
                })?;
                Ok(Expr::Not(Box::new(inner)))
            }
            "$eq" => self.comparison(raw_path, name, CompareOp::Eq, value),
            "$neq" => self.comparison(raw_path, name, CompareOp::Ne, value),
            "$gt" => self.comparison(raw_path, name, CompareOp::Gt, value),
            "$gte" => self.comparison(raw_path, name, CompareOp::Ge, value),
            "$lt" => self.comparison(raw_path, name, CompareOp::Lt, value),
            "$lte" => self.comparison(raw_path, name, CompareOp::Le, value),
            "$in" => {
                let path = subject(raw_path, name)?;
                let list = in_list(raw_path, &self.normalize_date(&path.to_string(), value)?)?;
                Ok(Expr::In {
                    value: Operand::Path(path),
                    list,
                })
            }
            "$between" => {
                let path = subject(raw_path, name)?;
                let value = self.normalize_date(&path.to_string(), value)?;
                let (low, high) = match value.as_list() {
                    Some([low, high]) if !low.is_undefined() && !high.is_undefined() => {
                        (low.clone(), high.clone())
                    }
                    _ => {
                        return Err(MapperError::configuration(format!(
                            "{} condition must include exactly two defined values.",
                            scope(raw_path, "$between")
                        )));
                    }
                };
                Ok(Expr::Between {
                    value: Operand::Path(path),
                    low: Operand::Value(low),
                    high: Operand::Value(high),
                })
            }
            "$size" => self.size(raw_path, value),
            "$includes" => function(raw_path, name, FunctionName::Contains, Some(value)),
            "$startsWith" => function(raw_path, name, FunctionName::BeginsWith, Some(value)),
            "$exists" => {
                let fname = if value.as_bool() == Some(true) {
                    FunctionName::AttributeExists
                } else {
                    FunctionName::AttributeNotExists
                };
                function(raw_path, name, fname, None)
            }
            "$type" => {
                let tag = type_descriptor(value)?;
                function(raw_path, name, FunctionName::AttributeType, Some(&Value::from(tag)))
            }
            unknown => Err(MapperError::configuration(format!(
                "Unknown operator '{unknown}'\nAllowed operators: {}",
                CONDITION_OPERATORS.join(", ")
            ))),
        }
    }

    fn logical(&self, op: LogicalOp, raw_path: Option<&str>, value: &Value) -> Result<Expr, MapperError> {
        let cmd = match op {
            LogicalOp::And => "$and",
            LogicalOp::Or => "$or",
        };
        let Some(items) = value.as_list() else {
            return Err(MapperError::configuration(format!(
                "{} condition must be an array.",
                scope(raw_path, cmd)
            )));
        };

        let mut conditions = Vec::with_capacity(items.len());
        for item in items {
            let expr = self.compile(item, raw_path)?.ok_or_else(|| {
                MapperError::configuration(format!(
                    "{} condition can not have 'undefined' condition.",
                    scope(raw_path, cmd)
                ))
            })?;
            conditions.push(expr);
        }
        if conditions.is_empty() {
            return Err(MapperError::configuration(format!(
                "{} condition can not be empty array.",
                scope(raw_path, cmd)
            )));
        }
        Ok(Expr::Logical { op, conditions })
    }

    fn comparison(
        &self,
        raw_path: Option<&str>,
        name: &str,
        op: CompareOp,
        value: &Value,
    ) -> Result<Expr, MapperError> {
        let path = subject(raw_path, name)?;
        let value = self.normalize_date(&path.to_string(), value)?;
        Ok(Expr::compare(path, op, value))
    }

    fn size(&self, raw_path: Option<&str>, value: &Value) -> Result<Expr, MapperError> {
        let path = subject(raw_path, "$size")?;
        let Some(ops) = value.as_map() else {
            return Ok(Expr::Compare {
                left: Operand::Size(path),
                op: CompareOp::Eq,
                right: Operand::Value(value.clone()),
            });
        };

        let mut entries = ops.iter();
        let (cmp, operand) = match (entries.next(), ops.len()) {
            (None, _) => {
                return Err(MapperError::configuration(format!(
                    "$size condition for '{path}' must contain at least one of comparison operator ({SIZE_OPERATORS})"
                )));
            }
            (Some(entry), 1) => entry,
            _ => {
                let children = ops
                    .iter()
                    .map(|(k, v)| {
                        let inner = Value::Map(IndexMap::from([(k.clone(), v.clone())]));
                        Value::Map(IndexMap::from([("$size".to_owned(), inner)]))
                    })
                    .collect();
                return self.logical(LogicalOp::And, raw_path, &Value::List(children));
            }
        };

        let op = match cmp.as_str() {
            "$eq" => CompareOp::Eq,
            "$neq" => CompareOp::Ne,
            "$gt" => CompareOp::Gt,
            "$gte" => CompareOp::Ge,
            "$lt" => CompareOp::Lt,
            "$lte" => CompareOp::Le,
            "$in" => {
                return Ok(Expr::In {
                    value: Operand::Size(path),
                    list: in_list(raw_path, operand)?,
                });
            }
            "$between" => {
                return match operand.as_list() {
                    Some([low, high]) if is_number(low) && is_number(high) => Ok(Expr::Between {
                        value: Operand::Size(path),
                        low: Operand::Value(low.clone()),
                        high: Operand::Value(high.clone()),
                    }),
                    _ => Err(MapperError::configuration(
                        "$between condition for \"$size\" must include exactly two numbers/bigint.",
                    )),
                };
            }
            other => {
                return Err(MapperError::configuration(format!(
                    "{path} > $size > '{other}' is not a valid comparison operator"
                )));
            }
        };
        Ok(Expr::Compare {
            left: Operand::Size(path),
            op,
            right: Operand::Value(operand.clone()),
        })
    }

    /// Convert date-like literals compared against a date attribute to the
    /// attribute's stored form. Values that do not parse are kept as is.
    fn normalize_date(&self, path: &str, value: &Value) -> Result<Value, MapperError> {
        if !value.is_truthy() {
            return Ok(value.clone());
        }
        let node = self.schema.resolve_path(path)?;
        if !node.is_date() {
            return Ok(value.clone());
        }
        Ok(match value {
            Value::List(items) => Value::List(items.iter().map(|v| node.to_storage(v)).collect()),
            Value::Date(_) | Value::String(_) | Value::Number(_) => node.to_storage(value),
            other => other.clone(),
        })
    }
}

fn scope(raw_path: Option<&str>, cmd: &str) -> String {
    match raw_path {
        Some(p) => format!("'{p}' > '{cmd}'"),
        None => format!("'{cmd}'"),
    }
}

fn subject(raw_path: Option<&str>, cmd: &str) -> Result<AttributePath, MapperError> {
    match raw_path {
        Some(p) => AttributePath::parse(p),
        None => Err(MapperError::configuration(format!(
            "'{cmd}' must be nested under an attribute name."
        ))),
    }
}

fn function(
    raw_path: Option<&str>,
    cmd: &str,
    name: FunctionName,
    arg: Option<&Value>,
) -> Result<Expr, MapperError> {
    Ok(Expr::Function {
        name,
        path: subject(raw_path, cmd)?,
        arg: arg.map(|v| Operand::Value(v.clone())),
    })
}

fn in_list(raw_path: Option<&str>, value: &Value) -> Result<Vec<Operand>, MapperError> {
    match value.as_list() {
        Some(items) if !items.is_empty() && !items.iter().any(Value::is_undefined) => {
            Ok(items.iter().cloned().map(Operand::Value).collect())
        }
        _ => Err(MapperError::configuration(format!(
            "{} condition must include at least one defined value.",
            scope(raw_path, "$in")
        ))),
    }
}

/// Storage descriptor for a `$type` operand.
fn type_descriptor(value: &Value) -> Result<&'static str, MapperError> {
    let Some(name) = value.as_str() else {
        return Err(MapperError::configuration(format!(
            "$type expects a type name. Received: {}",
            value.kind_name()
        )));
    };
    match name {
        "SS" => return Ok("SS"),
        "NS" | "DS" => return Ok("NS"),
        "BS" => return Ok("BS"),
        _ => {}
    }
    let tag = TypeTag::parse(name)?;
    match tag {
        TypeTag::Any => Ok("M"),
        other => other.storage_name().ok_or_else(|| {
            MapperError::configuration(format!(
                "$type '{name}' is ambiguous. Use one of SS, NS, BS."
            ))
        }),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(n) if !n.is_nan()) || matches!(value, Value::BigInt(_))
}
