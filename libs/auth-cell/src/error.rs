use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::{AppError, DomainError, ErrorKind};
use shared_utils::AccessError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Password must be at least 8 characters with letters and numbers")]
    WeakPassword,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("User not found")]
    NotFound,

    #[error("Could not issue token: {0}")]
    TokenIssue(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for AuthError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuthError::DuplicateEmail => ErrorKind::Conflict,
            AuthError::WeakPassword | AuthError::InvalidField { .. } => ErrorKind::Validation,
            AuthError::InvalidCredentials | AuthError::AccountDisabled => ErrorKind::Authentication,
            AuthError::NotFound => ErrorKind::NotFound,
            AuthError::Access(inner) => inner.kind(),
            AuthError::TokenIssue(_) | AuthError::PasswordHash(_) | AuthError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "DuplicateEmail",
            AuthError::WeakPassword => "WeakPassword",
            AuthError::InvalidField { .. } => "ValidationError",
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::AccountDisabled => "AccountDisabled",
            AuthError::NotFound => "NotFound",
            AuthError::Access(inner) => inner.code(),
            AuthError::TokenIssue(_) => "TokenIssue",
            AuthError::PasswordHash(_) => "PasswordHash",
            AuthError::Store(_) => "StoreError",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::domain(&err)
    }
}
