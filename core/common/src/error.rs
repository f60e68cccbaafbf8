//! Common error types for the EDV service.

use std::fmt;

use thiserror::Error;

/// Top-level error type for vault and document operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller is not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Request is structurally invalid (missing or inconsistent fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An identifier is not well-formed.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Resource already exists.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sequence mismatch or other stale-state write.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable kind of this error.
    ///
    /// Callers branch on the kind, never on the message text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::Duplicate(_) => ErrorKind::Duplicate,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => ErrorKind::Operation,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Stable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    Validation,
    Syntax,
    Duplicate,
    NotFound,
    InvalidState,
    Operation,
}

impl ErrorKind {
    /// Wire name of the kind, as reported in the `type` field of error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Duplicate => "DuplicateError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::Operation => "OperationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(
            Error::PermissionDenied("x".into()).kind().as_str(),
            "PermissionDenied"
        );
        assert_eq!(Error::Syntax("x".into()).kind().as_str(), "SyntaxError");
        assert_eq!(Error::Duplicate("x".into()).kind().as_str(), "DuplicateError");
        assert_eq!(Error::NotFound("x".into()).kind().as_str(), "NotFoundError");
        assert_eq!(
            Error::InvalidState("x".into()).kind().as_str(),
            "InvalidStateError"
        );
        assert_eq!(Error::Validation("x".into()).kind().as_str(), "ValidationError");
    }

    #[test]
    fn test_internal_failures_share_operation_kind() {
        let io = Error::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), ErrorKind::Operation);
        assert_eq!(Error::Internal("boom".into()).kind(), ErrorKind::Operation);

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(bad_json).kind(), ErrorKind::Operation);
    }

    #[test]
    fn test_message_is_independent_of_kind() {
        let err = Error::NotFound("document z1abc".into());
        assert_eq!(err.to_string(), "Not found: document z1abc");
        assert_eq!(err.kind().to_string(), "NotFoundError");
    }
}
