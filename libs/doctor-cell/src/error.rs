use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::{AppError, DomainError, ErrorKind};
use shared_utils::AccessError;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor profile already exists")]
    ProfileAlreadyExists,

    #[error("Doctor profile not found")]
    ProfileNotFound,

    #[error("Doctor not found")]
    NotFound,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for DoctorError {
    fn kind(&self) -> ErrorKind {
        match self {
            DoctorError::ProfileAlreadyExists => ErrorKind::Conflict,
            DoctorError::ProfileNotFound | DoctorError::NotFound => ErrorKind::NotFound,
            DoctorError::InvalidField { .. } => ErrorKind::Validation,
            DoctorError::Access(inner) => inner.kind(),
            DoctorError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DoctorError::ProfileAlreadyExists => "ProfileAlreadyExists",
            DoctorError::ProfileNotFound => "ProfileNotFound",
            DoctorError::NotFound => "NotFound",
            DoctorError::InvalidField { .. } => "ValidationError",
            DoctorError::Access(inner) => inner.code(),
            DoctorError::Store(_) => "StoreError",
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        AppError::domain(&err)
    }
}

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Start time must be before end time")]
    InvalidRange,

    #[error("Slot {start}-{end} overlaps an existing slot on {date}")]
    OverlappingSlot { date: String, start: String, end: String },

    #[error("Availability slot not found")]
    NotFound,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for AvailabilityError {
    fn kind(&self) -> ErrorKind {
        match self {
            AvailabilityError::InvalidDateFormat(_)
            | AvailabilityError::InvalidTimeFormat(_)
            | AvailabilityError::InvalidRange => ErrorKind::Validation,
            AvailabilityError::OverlappingSlot { .. } => ErrorKind::Conflict,
            AvailabilityError::NotFound => ErrorKind::NotFound,
            AvailabilityError::Access(inner) => inner.kind(),
            AvailabilityError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AvailabilityError::InvalidDateFormat(_) => "InvalidDateFormat",
            AvailabilityError::InvalidTimeFormat(_) => "InvalidTimeFormat",
            AvailabilityError::InvalidRange => "InvalidRange",
            AvailabilityError::OverlappingSlot { .. } => "OverlappingSlot",
            AvailabilityError::NotFound => "NotFound",
            AvailabilityError::Access(inner) => inner.code(),
            AvailabilityError::Store(_) => "StoreError",
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        AppError::domain(&err)
    }
}
