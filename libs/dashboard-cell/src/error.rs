use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::{AppError, DomainError, ErrorKind};
use shared_utils::AccessError;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for DashboardError {
    fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Access(inner) => inner.kind(),
            DashboardError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DashboardError::Access(inner) => inner.code(),
            DashboardError::Store(_) => "StoreError",
        }
    }
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        AppError::domain(&err)
    }
}
