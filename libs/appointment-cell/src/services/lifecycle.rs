use tracing::warn;

use shared_models::auth::{User, UserRole};

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentStatus};

/// Target statuses a role may request on an appointment it takes part in.
pub fn allowed_targets(role: UserRole) -> &'static [AppointmentStatus] {
    match role {
        UserRole::Patient => &[AppointmentStatus::Cancelled],
        UserRole::Doctor => &[
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ],
        UserRole::Admin => &[],
    }
}

/// Statuses reachable from `from` through the normal lifecycle.
pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    match from {
        AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
        AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Rescheduled => &[],
    }
}

/// The patient or the doctor on the appointment. Admins have no bypass.
pub fn ensure_participant(actor: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    let participant = match actor.role {
        UserRole::Patient => appointment.patient_id == actor.id,
        UserRole::Doctor => appointment.doctor_id == actor.id,
        UserRole::Admin => false,
    };

    if participant {
        Ok(())
    } else {
        warn!("User {} ({}) is not a participant of appointment {}", actor.id, actor.role, appointment.id);
        Err(AppointmentError::Forbidden)
    }
}

pub fn ensure_authority(role: UserRole, target: AppointmentStatus) -> Result<(), AppointmentError> {
    if allowed_targets(role).contains(&target) {
        Ok(())
    } else {
        warn!("Role {} may not set appointment status {}", role, target);
        Err(AppointmentError::Forbidden)
    }
}

/// Transition guard for the status-update path. Cancellation is accepted from any
/// status here; the dedicated cancel path applies its own final-state guard.
pub fn ensure_status_update(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if to == AppointmentStatus::Cancelled || valid_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidTransition { from, to })
    }
}

pub fn ensure_cancellable(from: AppointmentStatus) -> Result<(), AppointmentError> {
    if from.is_final() {
        Err(AppointmentError::AlreadyFinal(from))
    } else {
        Ok(())
    }
}
