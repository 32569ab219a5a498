//! Condition and update expressions.
//!
//! The pipeline is:
//!
//! 1. **Compiling**: turn a condition or update document into an AST, checking
//!    it against the schema.
//! 2. **Serializing**: walk the AST and allocate `#n`/`:v` substitutions into
//!    one [`ExpressionAttributes`] per request.

pub mod ast;
pub mod attributes;
pub mod condition;
pub mod update;

pub use ast::{AttributePath, Expr, Operand, PathElement, SetValue, UpdateExpr};
pub use attributes::ExpressionAttributes;
pub use condition::{CONDITION_OPERATORS, compile_condition, compile_condition_at};
pub use update::compile_update;
