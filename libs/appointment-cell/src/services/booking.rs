use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{parse_date, ClockTime};
use doctor_cell::services::{AvailabilityService, DoctorService};
use shared_database::{
    collections, from_document, from_documents, to_document, DocumentStore, Filter, FindOptions,
};
use shared_models::auth::{User, UserRole};
use shared_utils::{authorize, AppState};

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentQuery, AppointmentResponse, AppointmentStatus, BookAppointmentRequest,
    DoctorSummary, PatientSummary, UpdateStatusRequest,
};
use crate::services::consistency::SlotReconciler;
use crate::services::lifecycle;

/// Attempts made to release a slot after its appointment was cancelled.
const SLOT_RELEASE_ATTEMPTS: u32 = 2;

pub struct AppointmentBookingService {
    store: Arc<dyn DocumentStore>,
    availability: AvailabilityService,
    doctors: DoctorService,
    reconciler: SlotReconciler,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            availability: AvailabilityService::new(state),
            doctors: DoctorService::new(state),
            reconciler: SlotReconciler::new(state),
        }
    }

    /// Books an available slot for the calling patient.
    ///
    /// The slot is claimed with a conditional `available -> booked` update before the
    /// appointment is written. If the appointment insert fails the claim is undone, so
    /// a failed booking leaves nothing behind.
    pub async fn book_appointment(
        &self,
        patient: &User,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentResponse, AppointmentError> {
        authorize(patient, &[UserRole::Patient])?;
        debug!(
            "Booking slot {} with doctor {} for patient {}",
            request.availability_slot_id, request.doctor_id, patient.id
        );

        let date = parse_date(&request.appointment_date).map_err(AppointmentError::InvalidDateFormat)?;
        let start_time: ClockTime = request
            .start_time
            .parse()
            .map_err(AppointmentError::InvalidTimeFormat)?;
        let end_time: ClockTime = request
            .end_time
            .parse()
            .map_err(AppointmentError::InvalidTimeFormat)?;

        // A foreign, missing and already-booked slot all look the same to the caller.
        let slot = self
            .availability
            .available_slot(&request.availability_slot_id, &request.doctor_id)
            .await?
            .ok_or(AppointmentError::SlotUnavailable)?;

        if slot.date != date || slot.start_time != start_time || slot.end_time != end_time {
            return Err(AppointmentError::DetailMismatch(format!(
                "slot is {} {}-{}",
                slot.date, slot.start_time, slot.end_time
            )));
        }
        if slot.consultation_type != request.consultation_type {
            return Err(AppointmentError::DetailMismatch(format!(
                "slot is for {} consultations",
                slot.consultation_type
            )));
        }

        let clash = self
            .store
            .count(
                collections::APPOINTMENTS,
                &Filter::new()
                    .eq("patient_id", patient.id.as_str())
                    .eq("appointment_date", date.to_string())
                    .eq("start_time", start_time.to_string())
                    .in_list("status", AppointmentStatus::ACTIVE.iter().map(|s| s.as_str())),
            )
            .await?;
        if clash > 0 {
            return Err(AppointmentError::DoubleBookedPatient);
        }

        if self
            .availability
            .claim_slot(&slot.id, &slot.doctor_id)
            .await?
            .is_none()
        {
            warn!("Slot {} was taken before patient {} could claim it", slot.id, patient.id);
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            doctor_id: slot.doctor_id.clone(),
            patient_id: patient.id.clone(),
            availability_slot_id: slot.id.clone(),
            consultation_type: slot.consultation_type,
            appointment_date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: AppointmentStatus::Pending,
            reason: request.reason,
            symptoms: request.symptoms,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        };

        let inserted = async {
            let document = to_document(&appointment)?;
            self.store.insert(collections::APPOINTMENTS, document).await
        }
        .await;

        if let Err(e) = inserted {
            error!("Appointment insert failed for slot {}: {}; releasing claim", slot.id, e);
            if let Err(release_error) = self.availability.release_slot(&slot.id).await {
                warn!("Compensating release of slot {} failed: {}", slot.id, release_error);
            }
            return Err(e.into());
        }

        info!(
            "Booked appointment {} (slot {}) for patient {} with doctor {}",
            appointment.id, slot.id, patient.id, appointment.doctor_id
        );
        self.enrich(appointment).await
    }

    /// Moves an appointment to `request.status` on behalf of one of its participants.
    pub async fn update_status(
        &self,
        actor: &User,
        appointment_id: &str,
        request: UpdateStatusRequest,
    ) -> Result<AppointmentResponse, AppointmentError> {
        debug!("User {} setting appointment {} to {}", actor.id, appointment_id, request.status);

        let appointment = self.load(appointment_id).await?;
        lifecycle::ensure_participant(actor, &appointment)?;
        lifecycle::ensure_authority(actor.role, request.status)?;
        lifecycle::ensure_status_update(appointment.status, request.status)?;

        let now = Utc::now();
        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(request.status));
        changes.insert("updated_at".to_string(), json!(now));

        match request.status {
            AppointmentStatus::Confirmed => {
                changes.insert("confirmed_at".to_string(), json!(now));
            }
            AppointmentStatus::Completed => {
                changes.insert("completed_at".to_string(), json!(now));
            }
            AppointmentStatus::Cancelled => {
                changes.insert("cancelled_at".to_string(), json!(now));
                if let Some(reason) = request.cancellation_reason {
                    changes.insert("cancellation_reason".to_string(), json!(reason));
                }
            }
            AppointmentStatus::Pending | AppointmentStatus::Rescheduled => {}
        }
        if let Some(notes) = request.notes {
            changes.insert("notes".to_string(), json!(notes));
        }

        let updated = self.write_status(&appointment, Value::Object(changes)).await?;

        // A repeated cancel must not free a slot that has since been booked by someone else.
        if updated.status == AppointmentStatus::Cancelled && appointment.status != AppointmentStatus::Cancelled {
            self.release_after_cancel(&updated.availability_slot_id).await;
        }

        info!(
            "Appointment {} moved {} -> {} by {} {}",
            updated.id, appointment.status, updated.status, actor.role, actor.id
        );
        self.enrich(updated).await
    }

    /// The dedicated cancel entry point. Unlike `update_status`, it refuses to touch an
    /// appointment that is already completed or cancelled.
    pub async fn cancel_appointment(
        &self,
        actor: &User,
        appointment_id: &str,
        reason: Option<String>,
    ) -> Result<AppointmentResponse, AppointmentError> {
        debug!("User {} cancelling appointment {}", actor.id, appointment_id);

        let appointment = self.load(appointment_id).await?;
        lifecycle::ensure_participant(actor, &appointment)?;
        lifecycle::ensure_cancellable(appointment.status)?;
        lifecycle::ensure_authority(actor.role, AppointmentStatus::Cancelled)?;

        let now = Utc::now();
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Cancelled by {}", actor.role));

        let updated = self
            .write_status(
                &appointment,
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "cancelled_at": now,
                    "updated_at": now,
                    "cancellation_reason": reason,
                }),
            )
            .await?;

        self.release_after_cancel(&updated.availability_slot_id).await;

        info!("Appointment {} cancelled by {} {}", updated.id, actor.role, actor.id);
        self.enrich(updated).await
    }

    pub async fn get_appointment(
        &self,
        actor: &User,
        appointment_id: &str,
    ) -> Result<AppointmentResponse, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        lifecycle::ensure_participant(actor, &appointment)?;

        if appointment.status == AppointmentStatus::Cancelled {
            if let Err(e) = self.reconciler.repair_slot(&appointment.availability_slot_id).await {
                warn!("Read-repair of slot {} failed: {}", appointment.availability_slot_id, e);
            }
        }

        self.enrich(appointment).await
    }

    /// Patients see their own appointments, doctors the ones booked with them.
    pub async fn list_appointments(
        &self,
        actor: &User,
        query: AppointmentQuery,
    ) -> Result<Vec<AppointmentResponse>, AppointmentError> {
        authorize(actor, &[UserRole::Patient, UserRole::Doctor])?;

        let mut filter = match actor.role {
            UserRole::Patient => Filter::new().eq("patient_id", actor.id.as_str()),
            UserRole::Doctor => Filter::new().eq("doctor_id", actor.id.as_str()),
            UserRole::Admin => return Err(AppointmentError::Forbidden),
        };

        if let Some(status) = query.status {
            filter = filter.eq("status", status.as_str());
        }
        if let Some(start) = query.start_date.as_deref() {
            let start = parse_date(start).map_err(AppointmentError::InvalidDateFormat)?;
            filter = filter.gte("appointment_date", start.to_string());
        }
        if let Some(end) = query.end_date.as_deref() {
            let end = parse_date(end).map_err(AppointmentError::InvalidDateFormat)?;
            filter = filter.lte("appointment_date", end.to_string());
        }

        let options = FindOptions::new()
            .sort_asc("appointment_date")
            .sort_asc("start_time");
        let appointments: Vec<Appointment> = from_documents(
            self.store
                .find(collections::APPOINTMENTS, &filter, &options)
                .await?,
        )?;

        let mut responses = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            responses.push(self.enrich(appointment).await?);
        }
        Ok(responses)
    }

    async fn load(&self, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        let document = self
            .store
            .find_one(collections::APPOINTMENTS, &Filter::by_id(appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)?;
        Ok(from_document(document)?)
    }

    /// Optimistic write: applies only if the status is still the one we read.
    async fn write_status(
        &self,
        observed: &Appointment,
        changes: Value,
    ) -> Result<Appointment, AppointmentError> {
        let filter = Filter::by_id(&observed.id).eq("status", observed.status.as_str());
        let mut updated = self
            .store
            .update(collections::APPOINTMENTS, &filter, changes)
            .await?;

        if updated.is_empty() {
            warn!("Appointment {} changed under us (was {})", observed.id, observed.status);
            return Err(AppointmentError::ConcurrentModification);
        }
        Ok(from_document(updated.swap_remove(0))?)
    }

    /// Best effort. The appointment is already cancelled; a slot that stays booked is
    /// picked up later by read-repair.
    async fn release_after_cancel(&self, slot_id: &str) {
        for attempt in 1..=SLOT_RELEASE_ATTEMPTS {
            match self.availability.release_slot(slot_id).await {
                Ok(released) => {
                    debug!("Slot {} release after cancel (changed: {})", slot_id, released);
                    return;
                }
                Err(e) if attempt < SLOT_RELEASE_ATTEMPTS => {
                    warn!("Releasing slot {} failed (attempt {}): {}; retrying", slot_id, attempt, e);
                }
                Err(e) => {
                    warn!("Releasing slot {} failed: {}; leaving it to read-repair", slot_id, e);
                }
            }
        }
    }

    async fn enrich(&self, appointment: Appointment) -> Result<AppointmentResponse, AppointmentError> {
        let doctor_user = self.find_user(&appointment.doctor_id).await?;
        let profile = self.doctors.find_profile(&appointment.doctor_id).await?;

        let doctor = doctor_user.map(|user| DoctorSummary {
            id: user.id,
            name: user.name,
            specializations: profile
                .as_ref()
                .map(|p| p.specializations.clone())
                .unwrap_or_default(),
            clinic_info: profile.as_ref().and_then(|p| p.clinic_info.clone()),
            consultation_fee: profile.as_ref().map(|p| p.fee_for(appointment.consultation_type)),
        });

        let patient = self
            .find_user(&appointment.patient_id)
            .await?
            .map(|user| PatientSummary {
                id: user.id,
                name: user.name,
                email: user.email,
                phone: user.phone,
            });

        Ok(AppointmentResponse {
            appointment,
            doctor,
            patient,
        })
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, AppointmentError> {
        let found = self
            .store
            .find_one(collections::USERS, &Filter::by_id(user_id))
            .await?;
        Ok(found.map(from_document).transpose()?)
    }
}
