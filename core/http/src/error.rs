//! Wire error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use edvault_common::{Error, ErrorKind};

/// An error as returned to HTTP clients.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

/// Body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a validation error for a malformed request body.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status for the error kind.
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Validation | ErrorKind::Syntax => StatusCode::BAD_REQUEST,
            ErrorKind::Duplicate | ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Operation => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = %self.kind, message = %self.message, "Request failed");
        } else {
            warn!(kind = %self.kind, message = %self.message, "Request rejected");
        }

        let body = ErrorBody {
            kind: self.kind.as_str(),
            message: &self.message,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for REST handlers.
pub type ApiResult<T> = Result<Json<T>, ApiError>;
