//! Errors raised by the mapper.
//!
//! Everything the mapper itself rejects is reported before a request reaches
//! the store. Store failures pass through as [`MapperError::Store`].

use std::fmt;

use dynaql_model::{MarshallError, StoreError};
use indexmap::IndexMap;

/// The single error type of the mapper.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// Malformed schema or request: unknown type or operator, undefined
    /// condition value, empty batch.
    #[error("{0}")]
    Configuration(String),

    /// The request is well-formed but not allowed by the schema.
    #[error("{message}")]
    ForbiddenOperation {
        /// Table the request targets.
        table: String,
        /// What was refused.
        message: String,
    },

    /// One validation phase failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A value could not be converted to its wire form.
    #[error(transparent)]
    Marshall(#[from] MarshallError),

    /// The store or its transport reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MapperError {
    /// Build a [`MapperError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`MapperError::ForbiddenOperation`].
    pub fn forbidden(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ForbiddenOperation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// The validation error, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Validation phase that produced a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    /// A required attribute is absent.
    MissingKey,
    /// A value does not have the declared kind.
    InvalidType,
    /// A value is not one of the declared enum members.
    InvalidEnum,
    /// A value is outside its declared bounds.
    InvalidRange,
    /// A custom validator returned a message.
    CustomValidation,
}

impl ValidationKind {
    /// Human-readable phase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingKey => "Missing Key",
            Self::InvalidType => "Invalid Type",
            Self::InvalidEnum => "Invalid enum value",
            Self::InvalidRange => "Invalid min/max value",
            Self::CustomValidation => "Custom validator exception",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every violation found by one validation phase, keyed by attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The phase.
    pub kind: ValidationKind,
    /// Table the item belongs to.
    pub table: String,
    /// Attribute path to message, in discovery order.
    pub details: IndexMap<String, String>,
}

impl ValidationError {
    /// An empty error for `kind`.
    pub fn new(kind: ValidationKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            details: IndexMap::new(),
        }
    }

    /// Record a violation. A leading `.` in `path` is dropped.
    pub fn add(&mut self, path: &str, message: impl Into<String>) {
        let path = path.strip_prefix('.').unwrap_or(path);
        self.details.insert(path.to_owned(), message.into());
    }

    /// Take over every violation of `other`.
    pub fn merge(&mut self, other: Self) {
        self.details.extend(other.details);
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.details.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Message recorded for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.details.get(path).map(String::as_str)
    }

    /// `Ok(())` when empty, the error itself otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` if any violation was recorded.
    pub fn into_result(self) -> Result<(), MapperError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MapperError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.table)?;
        for (i, (path, message)) in self.details.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}'{path}' {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
