use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Error categories exposed to clients. Each one tells the caller what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; retrying without changes will fail again.
    Validation,
    /// State changed under the caller; re-fetch before retrying.
    Conflict,
    NotFound,
    /// Re-authenticate.
    Authentication,
    /// Wrong role or not the owner of the resource.
    Authorization,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Implemented by every cell-level error so handlers can convert it into an `AppError`
/// without losing the specific error name.
pub trait DomainError: std::error::Error {
    fn kind(&self) -> ErrorKind;
    fn code(&self) -> &'static str;
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{message}")]
    Domain {
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn domain<E: DomainError + ?Sized>(err: &E) -> Self {
        AppError::Domain {
            kind: err.kind(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth(_) => ErrorKind::Authentication,
            AppError::Forbidden(_) => ErrorKind::Authorization,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::BadRequest(_) | AppError::ValidationError(_) => ErrorKind::Validation,
            AppError::Internal(_) | AppError::Database(_) => ErrorKind::Internal,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Domain { kind, .. } => *kind,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "Unauthenticated",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Internal(_) => "Internal",
            AppError::Database(_) => "Database",
            AppError::ValidationError(_) => "ValidationError",
            AppError::Conflict(_) => "Conflict",
            AppError::Domain { code, .. } => *code,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Domain { message, .. } => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();
        let message = self.message();

        // Internal details stay in the log.
        let exposed = if kind == ErrorKind::Internal {
            tracing::error!("Error: {}: {}", status, message);
            "Internal server error".to_string()
        } else {
            tracing::debug!("Rejected request: {}: {}", status, message);
            message
        };

        let body = Json(json!({
            "error": exposed,
            "kind": kind.as_str(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
