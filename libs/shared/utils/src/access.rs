use thiserror::Error;
use tracing::warn;

use shared_database::StoreError;
use shared_models::auth::{User, UserRole};
use shared_models::error::{AppError, DomainError, ErrorKind};

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Could not validate credentials: {0}")]
    Unauthenticated(String),

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("Not enough permissions")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for AccessError {
    fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Unauthenticated(_) | AccessError::AccountDisabled => ErrorKind::Authentication,
            AccessError::Forbidden => ErrorKind::Authorization,
            AccessError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated(_) => "Unauthenticated",
            AccessError::AccountDisabled => "AccountDisabled",
            AccessError::Forbidden => "Forbidden",
            AccessError::Store(_) => "StoreError",
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        AppError::domain(&err)
    }
}

/// Passes the user through when their role is one of `allowed`.
pub fn authorize<'a>(user: &'a User, allowed: &[UserRole]) -> Result<&'a User, AccessError> {
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        warn!("User {} with role {} denied; requires one of {:?}", user.id, user.role, allowed);
        Err(AccessError::Forbidden)
    }
}
