//! Errors reported by the store.
//!
//! The store reports failures with a `__type` field holding a qualified type
//! name (`com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException`).
//! These pass through the mapper unmodified.

use std::fmt;

/// Well-known store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// Condition check failed.
    ConditionalCheckFailedException,
    /// Transaction canceled.
    TransactionCanceledException,
    /// Transaction conflict.
    TransactionConflictException,
    /// Request limit exceeded.
    RequestLimitExceeded,
    /// Table or index not found.
    ResourceNotFoundException,
    /// Validation error.
    #[default]
    ValidationException,
    /// Internal server error.
    InternalServerError,
    /// The transport could not deliver the request.
    TransportError,
}

impl StoreErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TransactionCanceledException => "TransactionCanceledException",
            Self::TransactionConflictException => "TransactionConflictException",
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ValidationException => "ValidationException",
            Self::InternalServerError => "InternalServerError",
            Self::TransportError => "TransportError",
        }
    }

    /// Parse a `__type` value, with or without its namespace prefix.
    #[must_use]
    pub fn from_type(error_type: &str) -> Option<Self> {
        let short = error_type.rsplit('#').next().unwrap_or(error_type);
        match short {
            "ConditionalCheckFailedException" => Some(Self::ConditionalCheckFailedException),
            "TransactionCanceledException" => Some(Self::TransactionCanceledException),
            "TransactionConflictException" => Some(Self::TransactionConflictException),
            "RequestLimitExceeded" => Some(Self::RequestLimitExceeded),
            "ResourceNotFoundException" => Some(Self::ResourceNotFoundException),
            "ValidationException" => Some(Self::ValidationException),
            "InternalServerError" => Some(Self::InternalServerError),
            _ => None,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the store or its transport.
#[derive(Debug)]
pub struct StoreError {
    /// The error code.
    pub code: StoreErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// Per-member reasons of a canceled transaction.
    pub cancellation_reasons: Vec<crate::types::CancellationReason>,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl StoreError {
    /// Create a new `StoreError` from an error code.
    #[must_use]
    pub fn new(code: StoreErrorCode) -> Self {
        Self::with_message(code, code.as_str())
    }

    /// Create a new `StoreError` with a custom message.
    #[must_use]
    pub fn with_message(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cancellation_reasons: Vec::new(),
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the reasons of a canceled transaction.
    #[must_use]
    pub fn with_cancellation_reasons(
        mut self,
        reasons: Vec<crate::types::CancellationReason>,
    ) -> Self {
        self.cancellation_reasons = reasons;
        self
    }

    /// Condition expression evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ConditionalCheckFailedException, message)
    }

    /// Request rejected as malformed by the store.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ValidationException, message)
    }

    /// The request never reached the store.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::TransportError, message)
    }
}

/// Create a `StoreError` from an error code.
///
/// # Examples
///
/// ```
/// use dynaql_model::store_error;
/// use dynaql_model::error::StoreErrorCode;
///
/// let err = store_error!(ValidationException);
/// assert_eq!(err.code, StoreErrorCode::ValidationException);
///
/// let err = store_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! store_error {
    ($code:ident) => {
        $crate::error::StoreError::new($crate::error::StoreErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::StoreError::with_message($crate::error::StoreErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_qualified_error_type() {
        assert_eq!(
            StoreErrorCode::from_type(
                "com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException"
            ),
            Some(StoreErrorCode::ConditionalCheckFailedException)
        );
        assert_eq!(
            StoreErrorCode::from_type("RequestLimitExceeded"),
            Some(StoreErrorCode::RequestLimitExceeded)
        );
        assert_eq!(StoreErrorCode::from_type("Nope"), None);
    }

    #[test]
    fn test_should_format_store_error() {
        let err = StoreError::conditional_check_failed("The conditional request failed");
        assert_eq!(
            err.to_string(),
            "StoreError(ConditionalCheckFailedException): The conditional request failed"
        );
    }
}
