use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::{AppError, DomainError, ErrorKind};
use shared_utils::AccessError;

use crate::models::AppointmentStatus;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Availability slot not found or already booked")]
    SlotUnavailable,

    #[error("Appointment details do not match the slot: {0}")]
    DetailMismatch(String),

    #[error("You already have an appointment at this time")]
    DoubleBookedPatient,

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Not allowed to perform this action on the appointment")]
    Forbidden,

    #[error("Appointment is already {0}")]
    AlreadyFinal(AppointmentStatus),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment was modified concurrently; reload and retry")]
    ConcurrentModification,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError for AppointmentError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::DetailMismatch(_)
            | AppointmentError::InvalidDateFormat(_)
            | AppointmentError::InvalidTimeFormat(_) => ErrorKind::Validation,
            AppointmentError::SlotUnavailable
            | AppointmentError::DoubleBookedPatient
            | AppointmentError::AlreadyFinal(_)
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::ConcurrentModification => ErrorKind::Conflict,
            AppointmentError::NotFound => ErrorKind::NotFound,
            AppointmentError::Forbidden => ErrorKind::Authorization,
            AppointmentError::Access(inner) => inner.kind(),
            AppointmentError::Store(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppointmentError::SlotUnavailable => "SlotUnavailable",
            AppointmentError::DetailMismatch(_) => "DetailMismatch",
            AppointmentError::DoubleBookedPatient => "DoubleBookedPatient",
            AppointmentError::InvalidDateFormat(_) => "InvalidDateFormat",
            AppointmentError::InvalidTimeFormat(_) => "InvalidTimeFormat",
            AppointmentError::NotFound => "NotFound",
            AppointmentError::Forbidden => "Forbidden",
            AppointmentError::AlreadyFinal(_) => "AlreadyFinal",
            AppointmentError::InvalidTransition { .. } => "InvalidTransition",
            AppointmentError::ConcurrentModification => "ConcurrentModification",
            AppointmentError::Access(inner) => inner.code(),
            AppointmentError::Store(_) => "StoreError",
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        AppError::domain(&err)
    }
}
