// Read-repair between availability slots and the appointments that hold them.
//
// Appointment status is the source of truth. A slot left `booked` with no pending or
// confirmed appointment referencing it is released here.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};

use doctor_cell::models::SlotStatus;
use doctor_cell::services::AvailabilityService;
use shared_database::{collections, DocumentStore, Filter, StoreError};
use shared_models::auth::{User, UserRole};
use shared_utils::{authorize, AppState};

use crate::error::AppointmentError;
use crate::models::{AppointmentStatus, RepairReport};

/// A freshly claimed slot has no appointment until the booking's insert lands.
pub const DEFAULT_CLAIM_GRACE_SECONDS: i64 = 60;

pub struct SlotReconciler {
    store: Arc<dyn DocumentStore>,
    availability: AvailabilityService,
    claim_grace: Duration,
}

impl SlotReconciler {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            availability: AvailabilityService::new(state),
            claim_grace: Duration::seconds(DEFAULT_CLAIM_GRACE_SECONDS),
        }
    }

    pub fn with_claim_grace(mut self, grace: Duration) -> Self {
        self.claim_grace = grace;
        self
    }

    /// Releases the slot if it is booked but no active appointment holds it.
    /// Returns whether the slot was released.
    #[instrument(skip(self))]
    pub async fn repair_slot(&self, slot_id: &str) -> Result<bool, StoreError> {
        let Some(slot) = self.availability.get_slot(slot_id).await? else {
            return Ok(false);
        };

        if slot.status != SlotStatus::Booked {
            return Ok(false);
        }

        if let Some(booked_at) = slot.booked_at {
            if Utc::now() - booked_at < self.claim_grace {
                debug!("Slot {} was claimed recently; leaving it alone", slot_id);
                return Ok(false);
            }
        }

        let holders = self
            .store
            .count(
                collections::APPOINTMENTS,
                &Filter::new()
                    .eq("availability_slot_id", slot_id)
                    .in_list("status", AppointmentStatus::ACTIVE.iter().map(|s| s.as_str())),
            )
            .await?;

        if holders > 0 {
            return Ok(false);
        }

        let released = self.availability.release_slot(slot_id).await?;
        if released {
            info!("Read-repair released orphaned booked slot {}", slot_id);
        }
        Ok(released)
    }

    /// Repairs every booked slot the doctor owns.
    pub async fn repair_doctor_slots(&self, doctor: &User) -> Result<RepairReport, AppointmentError> {
        authorize(doctor, &[UserRole::Doctor])?;

        let booked = self.availability.booked_slots(&doctor.id).await?;
        let mut report = RepairReport {
            examined: booked.len(),
            released: Vec::new(),
        };

        for slot in booked {
            if self.repair_slot(&slot.id).await? {
                report.released.push(slot.id);
            }
        }

        info!(
            "Consistency repair for doctor {}: {} booked slots examined, {} released",
            doctor.id,
            report.examined,
            report.released.len()
        );
        Ok(report)
    }
}
