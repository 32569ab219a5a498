//! AST types for compiled expressions.
//!
//! The condition and update compilers build these trees from the query DSL.
//! Operands hold native values; names and values are substituted only when a
//! tree is serialized against an [`ExpressionAttributes`] allocator, so two
//! expressions sharing one allocator share tokens.

use std::fmt;

use dynaql_model::Value;

use crate::error::MapperError;
use crate::expression::attributes::ExpressionAttributes;

/// Expression AST node for condition, filter, and key-condition expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Comparison expression: `left op right`.
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// Between expression: `value BETWEEN low AND high`.
    Between {
        /// Value to test.
        value: Operand,
        /// Lower bound (inclusive).
        low: Operand,
        /// Upper bound (inclusive).
        high: Operand,
    },
    /// In expression: `value IN (list...)`.
    In {
        /// Value to search for.
        value: Operand,
        /// Candidate values.
        list: Vec<Operand>,
    },
    /// `(a) AND (b) ...` or `(a) OR (b) ...`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Children, never empty.
        conditions: Vec<Expr>,
    },
    /// Logical negation: `NOT (expr)`.
    Not(Box<Expr>),
    /// Function call on a path: `function_name(path[, arg])`.
    Function {
        /// Function name.
        name: FunctionName,
        /// Target path.
        path: AttributePath,
        /// Second argument, if the function takes one.
        arg: Option<Operand>,
    },
}

impl Expr {
    /// `path op value`.
    #[must_use]
    pub fn compare(path: AttributePath, op: CompareOp, value: Value) -> Self {
        Self::Compare {
            left: Operand::Path(path),
            op,
            right: Operand::Value(value),
        }
    }

    /// Serialize, allocating every name before the value it is compared with.
    ///
    /// # Errors
    ///
    /// Fails when a value can not be marshalled.
    pub fn serialize(&self, attrs: &mut ExpressionAttributes) -> Result<String, MapperError> {
        Ok(match self {
            Self::Compare { left, op, right } => {
                let left = left.serialize(attrs)?;
                let right = right.serialize(attrs)?;
                format!("{left} {op} {right}")
            }
            Self::Between { value, low, high } => {
                let value = value.serialize(attrs)?;
                let low = low.serialize(attrs)?;
                let high = high.serialize(attrs)?;
                format!("{value} BETWEEN {low} AND {high}")
            }
            Self::In { value, list } => {
                let value = value.serialize(attrs)?;
                let list = list
                    .iter()
                    .map(|o| o.serialize(attrs))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{value} IN ({})", list.join(", "))
            }
            Self::Logical { op, conditions } => {
                if let [single] = conditions.as_slice() {
                    single.serialize(attrs)?
                } else {
                    let parts = conditions
                        .iter()
                        .map(|c| c.serialize(attrs).map(|s| format!("({s})")))
                        .collect::<Result<Vec<_>, _>>()?;
                    parts.join(&format!(" {op} "))
                }
            }
            Self::Not(inner) => format!("NOT ({})", inner.serialize(attrs)?),
            Self::Function { name, path, arg } => {
                let path = attrs.add_name(path);
                match arg {
                    Some(arg) => format!("{name}({path}, {})", arg.serialize(attrs)?),
                    None => format!("{name}({path})"),
                }
            }
        })
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Built-in expression function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)`.
    AttributeExists,
    /// `attribute_not_exists(path)`.
    AttributeNotExists,
    /// `attribute_type(path, type)`.
    AttributeType,
    /// `begins_with(path, substr)`.
    BeginsWith,
    /// `contains(path, operand)`.
    Contains,
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// An operand in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A document path reference (e.g., `info.rating`, `myList[0]`).
    Path(AttributePath),
    /// A literal, substituted as `:v{n}`.
    Value(Value),
    /// `size(path)`.
    Size(AttributePath),
}

impl Operand {
    fn serialize(&self, attrs: &mut ExpressionAttributes) -> Result<String, MapperError> {
        match self {
            Self::Path(path) => Ok(attrs.add_name(path)),
            Self::Value(value) => attrs.add_value(value),
            Self::Size(path) => Ok(format!("size({})", attrs.add_name(path))),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute paths
// ---------------------------------------------------------------------------

/// A document path consisting of one or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributePath {
    /// The path elements in order.
    pub elements: Vec<PathElement>,
}

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A named attribute.
    Attribute(String),
    /// A list index dereference (e.g., `[0]`).
    Index(usize),
}

impl AttributePath {
    /// Parse a dotted/bracketed path such as `a.b[2].c`.
    ///
    /// # Errors
    ///
    /// Fails on unbalanced brackets, non-numeric indices or empty names.
    pub fn parse(path: &str) -> Result<Self, MapperError> {
        let invalid = || MapperError::configuration(format!("Invalid attribute path '{path}'"));
        let mut elements = Vec::new();
        let mut name = String::new();
        let mut chars = path.chars().peekable();
        // `true` right after `]`, where only `.`, `[` or the end may follow.
        let mut after_index = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if name.is_empty() && !after_index {
                        return Err(invalid());
                    }
                    if !name.is_empty() {
                        elements.push(PathElement::Attribute(std::mem::take(&mut name)));
                    }
                    after_index = false;
                    if chars.peek().is_none() {
                        return Err(invalid());
                    }
                }
                '[' => {
                    if !name.is_empty() {
                        elements.push(PathElement::Attribute(std::mem::take(&mut name)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => return Err(invalid()),
                        }
                    }
                    let index = digits.parse::<usize>().map_err(|_| invalid())?;
                    elements.push(PathElement::Index(index));
                    after_index = true;
                }
                _ => {
                    if after_index {
                        return Err(invalid());
                    }
                    name.push(c);
                }
            }
        }
        if !name.is_empty() {
            elements.push(PathElement::Attribute(name));
        }
        if elements.is_empty() {
            return Err(invalid());
        }
        Ok(Self { elements })
    }

    /// A single-element path. The name is taken verbatim.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            elements: vec![PathElement::Attribute(name.into())],
        }
    }

    /// First attribute name, if the path starts with one.
    #[must_use]
    pub fn top_level(&self) -> Option<&str> {
        match self.elements.first() {
            Some(PathElement::Attribute(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        write!(f, ".{name}")?;
                    } else {
                        write!(f, "{name}")?;
                    }
                }
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Update expressions
// ---------------------------------------------------------------------------

/// Update expression AST containing all four clause types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    /// SET actions: assign values to attributes.
    pub set_actions: Vec<SetAction>,
    /// REMOVE actions: remove attributes.
    pub remove_paths: Vec<AttributePath>,
    /// ADD actions: add to numbers or sets.
    pub add_actions: Vec<AddAction>,
    /// DELETE actions: remove elements from sets.
    pub delete_actions: Vec<DeleteAction>,
}

/// A single SET action: `path = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value to assign.
    pub value: SetValue,
}

/// The right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Simple operand assignment.
    Operand(Operand),
    /// Addition: `left + right`.
    Plus(Operand, Operand),
    /// Subtraction: `left - right`.
    Minus(Operand, Operand),
    /// `if_not_exists(path, operand)`.
    IfNotExists(AttributePath, Operand),
    /// `list_append(operand, operand)`.
    ListAppend(Operand, Operand),
}

impl SetValue {
    fn serialize(&self, attrs: &mut ExpressionAttributes) -> Result<String, MapperError> {
        Ok(match self {
            Self::Operand(op) => op.serialize(attrs)?,
            Self::Plus(a, b) => format!("{} + {}", a.serialize(attrs)?, b.serialize(attrs)?),
            Self::Minus(a, b) => format!("{} - {}", a.serialize(attrs)?, b.serialize(attrs)?),
            Self::IfNotExists(path, op) => {
                let path = attrs.add_name(path);
                format!("if_not_exists({path}, {})", op.serialize(attrs)?)
            }
            Self::ListAppend(a, b) => {
                let a = a.serialize(attrs)?;
                format!("list_append({a}, {})", b.serialize(attrs)?)
            }
        })
    }
}

/// A single ADD action: `path value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value to add.
    pub value: Operand,
}

/// A single DELETE action: `path value`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value (set) to remove.
    pub value: Operand,
}

impl UpdateExpr {
    /// Returns `true` if no clause was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_actions.is_empty()
            && self.remove_paths.is_empty()
            && self.add_actions.is_empty()
            && self.delete_actions.is_empty()
    }

    /// Serialize as `SET .. REMOVE .. ADD .. DELETE ..`, each target path
    /// allocated before its right-hand side. `None` when empty.
    ///
    /// # Errors
    ///
    /// Fails when a value can not be marshalled.
    pub fn serialize(
        &self,
        attrs: &mut ExpressionAttributes,
    ) -> Result<Option<String>, MapperError> {
        let mut clauses = Vec::with_capacity(4);

        if !self.set_actions.is_empty() {
            let mut parts = Vec::with_capacity(self.set_actions.len());
            for action in &self.set_actions {
                let path = attrs.add_name(&action.path);
                parts.push(format!("{path} = {}", action.value.serialize(attrs)?));
            }
            clauses.push(format!("SET {}", parts.join(", ")));
        }
        if !self.remove_paths.is_empty() {
            let parts: Vec<String> = self.remove_paths.iter().map(|p| attrs.add_name(p)).collect();
            clauses.push(format!("REMOVE {}", parts.join(", ")));
        }
        if !self.add_actions.is_empty() {
            let mut parts = Vec::with_capacity(self.add_actions.len());
            for action in &self.add_actions {
                let path = attrs.add_name(&action.path);
                parts.push(format!("{path} {}", action.value.serialize(attrs)?));
            }
            clauses.push(format!("ADD {}", parts.join(", ")));
        }
        if !self.delete_actions.is_empty() {
            let mut parts = Vec::with_capacity(self.delete_actions.len());
            for action in &self.delete_actions {
                let path = attrs.add_name(&action.path);
                parts.push(format!("{path} {}", action.value.serialize(attrs)?));
            }
            clauses.push(format!("DELETE {}", parts.join(", ")));
        }

        Ok((!clauses.is_empty()).then(|| clauses.join(" ")))
    }
}
