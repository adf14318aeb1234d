use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    collections, from_document, from_documents, to_document, DocumentStore, Filter, FindOptions,
    StoreError,
};
use shared_models::auth::{User, UserRole};
use shared_utils::{authorize, AppState};

use crate::error::AvailabilityError;
use crate::models::{parse_date, AvailabilitySlot, ClockTime, CreateSlotRequest, SlotQuery, SlotStatus};

/// Half-open interval overlap: `[a, b)` and `[c, d)` overlap iff `a < d` and `c < b`.
pub fn intervals_overlap(a: (ClockTime, ClockTime), b: (ClockTime, ClockTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn create_slot(
        &self,
        doctor: &User,
        request: CreateSlotRequest,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        authorize(doctor, &[UserRole::Doctor])?;
        debug!("Creating availability slot for doctor: {}", doctor.id);

        let date = parse_date(&request.date).map_err(AvailabilityError::InvalidDateFormat)?;
        let start_time: ClockTime = request
            .start_time
            .parse()
            .map_err(AvailabilityError::InvalidTimeFormat)?;
        let end_time: ClockTime = request
            .end_time
            .parse()
            .map_err(AvailabilityError::InvalidTimeFormat)?;

        if start_time >= end_time {
            return Err(AvailabilityError::InvalidRange);
        }

        let same_day: Vec<AvailabilitySlot> = from_documents(
            self.store
                .find(
                    collections::AVAILABILITY_SLOTS,
                    &Filter::new()
                        .eq("doctor_id", doctor.id.as_str())
                        .eq("date", date.to_string()),
                    &FindOptions::new(),
                )
                .await?,
        )?;

        if let Some(clash) = same_day
            .iter()
            .find(|slot| intervals_overlap((slot.start_time, slot.end_time), (start_time, end_time)))
        {
            warn!(
                "Rejected slot {}-{} on {} for doctor {}: overlaps slot {}",
                start_time, end_time, date, doctor.id, clash.id
            );
            return Err(AvailabilityError::OverlappingSlot {
                date: date.to_string(),
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }

        let slot = AvailabilitySlot {
            id: Uuid::new_v4().to_string(),
            doctor_id: doctor.id.clone(),
            date,
            start_time,
            end_time,
            consultation_type: request.consultation_type,
            status: SlotStatus::Available,
            booked_at: None,
            created_at: Utc::now(),
        };

        self.store
            .insert(collections::AVAILABILITY_SLOTS, to_document(&slot)?)
            .await?;

        info!("Created slot {} ({} {}-{}) for doctor {}", slot.id, date, start_time, end_time, doctor.id);
        Ok(slot)
    }

    /// Every slot the doctor owns, whatever its status.
    pub async fn list_own_slots(
        &self,
        doctor: &User,
        query: SlotQuery,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        authorize(doctor, &[UserRole::Doctor])?;

        let filter = date_range(Filter::new().eq("doctor_id", doctor.id.as_str()), &query)?;
        self.list(filter).await
    }

    /// Only available slots are ever shown to browsing patients.
    pub async fn list_public_slots(
        &self,
        doctor_id: &str,
        query: SlotQuery,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        let filter = Filter::new()
            .eq("doctor_id", doctor_id)
            .eq("status", SlotStatus::Available.as_str());
        let filter = date_range(filter, &query)?;
        self.list(filter).await
    }

    async fn list(&self, filter: Filter) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        let options = FindOptions::new().sort_asc("date").sort_asc("start_time");
        let documents = self
            .store
            .find(collections::AVAILABILITY_SLOTS, &filter, &options)
            .await?;
        Ok(from_documents(documents)?)
    }

    pub async fn delete_slot(&self, doctor: &User, slot_id: &str) -> Result<(), AvailabilityError> {
        authorize(doctor, &[UserRole::Doctor])?;

        let removed = self
            .store
            .delete(
                collections::AVAILABILITY_SLOTS,
                &Filter::by_id(slot_id).eq("doctor_id", doctor.id.as_str()),
            )
            .await?;

        if removed == 0 {
            return Err(AvailabilityError::NotFound);
        }

        info!("Doctor {} deleted slot {}", doctor.id, slot_id);
        Ok(())
    }

    pub async fn get_slot(&self, slot_id: &str) -> Result<Option<AvailabilitySlot>, StoreError> {
        let found = self
            .store
            .find_one(collections::AVAILABILITY_SLOTS, &Filter::by_id(slot_id))
            .await?;
        found.map(from_document).transpose()
    }

    /// The slot, only if it belongs to `doctor_id` and is still available.
    pub async fn available_slot(
        &self,
        slot_id: &str,
        doctor_id: &str,
    ) -> Result<Option<AvailabilitySlot>, StoreError> {
        let filter = Filter::by_id(slot_id)
            .eq("doctor_id", doctor_id)
            .eq("status", SlotStatus::Available.as_str());

        let found = self
            .store
            .find_one(collections::AVAILABILITY_SLOTS, &filter)
            .await?;
        found.map(from_document).transpose()
    }

    /// Flips `available -> booked` for the doctor's slot. `None` means the slot is not
    /// available to claim: missing, owned by another doctor, or already taken.
    pub async fn claim_slot(
        &self,
        slot_id: &str,
        doctor_id: &str,
    ) -> Result<Option<AvailabilitySlot>, StoreError> {
        let filter = Filter::by_id(slot_id)
            .eq("doctor_id", doctor_id)
            .eq("status", SlotStatus::Available.as_str());

        let mut claimed = self
            .store
            .update(
                collections::AVAILABILITY_SLOTS,
                &filter,
                json!({ "status": SlotStatus::Booked.as_str(), "booked_at": Utc::now() }),
            )
            .await?;

        if claimed.is_empty() {
            return Ok(None);
        }
        debug!("Slot {} claimed", slot_id);
        Ok(Some(from_document(claimed.swap_remove(0))?))
    }

    /// Flips `booked -> available`. Returns whether anything changed, so releasing an
    /// already-available slot is a no-op.
    pub async fn release_slot(&self, slot_id: &str) -> Result<bool, StoreError> {
        let filter = Filter::by_id(slot_id).eq("status", SlotStatus::Booked.as_str());

        let released = self
            .store
            .update(
                collections::AVAILABILITY_SLOTS,
                &filter,
                json!({ "status": SlotStatus::Available.as_str(), "booked_at": null }),
            )
            .await?;

        if !released.is_empty() {
            debug!("Slot {} released", slot_id);
        }
        Ok(!released.is_empty())
    }

    pub async fn booked_slots(&self, doctor_id: &str) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let documents = self
            .store
            .find(
                collections::AVAILABILITY_SLOTS,
                &Filter::new()
                    .eq("doctor_id", doctor_id)
                    .eq("status", SlotStatus::Booked.as_str()),
                &FindOptions::new().sort_asc("date").sort_asc("start_time"),
            )
            .await?;
        from_documents(documents)
    }
}

fn date_range(mut filter: Filter, query: &SlotQuery) -> Result<Filter, AvailabilityError> {
    if let Some(start) = query.start_date.as_deref() {
        let start: NaiveDate = parse_date(start).map_err(AvailabilityError::InvalidDateFormat)?;
        filter = filter.gte("date", start.to_string());
    }
    if let Some(end) = query.end_date.as_deref() {
        let end: NaiveDate = parse_date(end).map_err(AvailabilityError::InvalidDateFormat)?;
        filter = filter.lte("date", end.to_string());
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::models::ConsultationType;
    use shared_utils::test_utils::{memory_state, TestUser};
    use shared_utils::AccessError;

    fn t(value: &str) -> ClockTime {
        value.parse().unwrap()
    }

    fn slot_request(date: &str, start: &str, end: &str) -> CreateSlotRequest {
        CreateSlotRequest {
            date: date.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            consultation_type: ConsultationType::Online,
        }
    }

    #[test]
    fn test_intervals_overlap_is_half_open() {
        assert!(!intervals_overlap((t("09:00"), t("10:00")), (t("10:00"), t("11:00"))));
        assert!(!intervals_overlap((t("10:00"), t("11:00")), (t("09:00"), t("10:00"))));
        assert!(intervals_overlap((t("09:00"), t("10:00")), (t("09:30"), t("10:30"))));
        assert!(intervals_overlap((t("09:00"), t("12:00")), (t("10:00"), t("11:00"))));
        assert!(intervals_overlap((t("10:00"), t("11:00")), (t("09:00"), t("12:00"))));
        assert!(intervals_overlap((t("09:00"), t("10:00")), (t("09:00"), t("10:00"))));
        assert!(!intervals_overlap((t("08:00"), t("09:00")), (t("13:00"), t("14:00"))));
    }

    #[tokio::test]
    async fn test_adjacent_slots_are_accepted_and_overlaps_rejected() {
        let state = memory_state().await;
        let service = AvailabilityService::new(&state);
        let doctor = TestUser::doctor("doc@example.com").to_user();

        service.create_slot(&doctor, slot_request("2030-05-01", "09:00", "10:00")).await.unwrap();
        service.create_slot(&doctor, slot_request("2030-05-01", "10:00", "11:00")).await.unwrap();

        let overlapping = service
            .create_slot(&doctor, slot_request("2030-05-01", "09:30", "10:30"))
            .await;
        assert_matches!(overlapping, Err(AvailabilityError::OverlappingSlot { .. }));

        // Same interval on another day, or for another doctor, is fine.
        service.create_slot(&doctor, slot_request("2030-05-02", "09:30", "10:30")).await.unwrap();
        let other = TestUser::doctor("other@example.com").to_user();
        service.create_slot(&other, slot_request("2030-05-01", "09:30", "10:30")).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_slot_validates_input() {
        let state = memory_state().await;
        let service = AvailabilityService::new(&state);
        let doctor = TestUser::doctor("doc@example.com").to_user();

        assert_matches!(
            service.create_slot(&doctor, slot_request("01/05/2030", "09:00", "10:00")).await,
            Err(AvailabilityError::InvalidDateFormat(_))
        );
        assert_matches!(
            service.create_slot(&doctor, slot_request("2030-05-01", "9am", "10:00")).await,
            Err(AvailabilityError::InvalidTimeFormat(_))
        );
        assert_matches!(
            service.create_slot(&doctor, slot_request("2030-05-01", "10:00", "10:00")).await,
            Err(AvailabilityError::InvalidRange)
        );
        assert_matches!(
            service.create_slot(&doctor, slot_request("2030-05-01", "11:00", "10:00")).await,
            Err(AvailabilityError::InvalidRange)
        );

        let patient = TestUser::patient("p@example.com").to_user();
        assert_matches!(
            service.create_slot(&patient, slot_request("2030-05-01", "09:00", "10:00")).await,
            Err(AvailabilityError::Access(AccessError::Forbidden))
        );
    }

    #[tokio::test]
    async fn test_listings_sort_and_public_view_hides_booked() {
        let state = memory_state().await;
        let service = AvailabilityService::new(&state);
        let doctor = TestUser::doctor("doc@example.com").to_user();

        let later = service.create_slot(&doctor, slot_request("2030-05-02", "09:00", "10:00")).await.unwrap();
        let afternoon = service.create_slot(&doctor, slot_request("2030-05-01", "14:00", "15:00")).await.unwrap();
        let morning = service.create_slot(&doctor, slot_request("2030-05-01", "08:00", "09:00")).await.unwrap();

        let own = service.list_own_slots(&doctor, SlotQuery::default()).await.unwrap();
        let ids: Vec<&str> = own.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![morning.id.as_str(), afternoon.id.as_str(), later.id.as_str()]);

        service.claim_slot(&morning.id, &doctor.id).await.unwrap().unwrap();

        let public = service.list_public_slots(&doctor.id, SlotQuery::default()).await.unwrap();
        assert_eq!(public.len(), 2);
        assert!(public.iter().all(|s| s.status == SlotStatus::Available));

        let own = service.list_own_slots(&doctor, SlotQuery::default()).await.unwrap();
        assert_eq!(own.len(), 3);

        let first_day = service
            .list_public_slots(
                &doctor.id,
                SlotQuery { start_date: Some("2030-05-01".into()), end_date: Some("2030-05-01".into()) },
            )
            .await
            .unwrap();
        assert_eq!(first_day.len(), 1);
        assert_eq!(first_day[0].id, afternoon.id);

        assert_matches!(
            service
                .list_public_slots(&doctor.id, SlotQuery { start_date: Some("May 1".into()), end_date: None })
                .await,
            Err(AvailabilityError::InvalidDateFormat(_))
        );
    }

    #[tokio::test]
    async fn test_delete_only_own_slot() {
        let state = memory_state().await;
        let service = AvailabilityService::new(&state);
        let doctor = TestUser::doctor("doc@example.com").to_user();
        let other = TestUser::doctor("other@example.com").to_user();

        let slot = service.create_slot(&doctor, slot_request("2030-05-01", "09:00", "10:00")).await.unwrap();

        assert_matches!(service.delete_slot(&other, &slot.id).await, Err(AvailabilityError::NotFound));
        service.delete_slot(&doctor, &slot.id).await.unwrap();
        assert_matches!(service.delete_slot(&doctor, &slot.id).await, Err(AvailabilityError::NotFound));
        assert!(service.get_slot(&slot.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_and_release_are_conditional() {
        let state = memory_state().await;
        let service = AvailabilityService::new(&state);
        let doctor = TestUser::doctor("doc@example.com").to_user();
        let slot = service.create_slot(&doctor, slot_request("2030-05-01", "09:00", "10:00")).await.unwrap();

        assert!(service.claim_slot(&slot.id, "someone-else").await.unwrap().is_none());

        assert!(service.available_slot(&slot.id, "someone-else").await.unwrap().is_none());
        assert!(service.available_slot(&slot.id, &doctor.id).await.unwrap().is_some());

        let claimed = service.claim_slot(&slot.id, &doctor.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, SlotStatus::Booked);
        assert!(claimed.booked_at.is_some());
        assert!(service.available_slot(&slot.id, &doctor.id).await.unwrap().is_none());
        assert!(service.claim_slot(&slot.id, &doctor.id).await.unwrap().is_none());

        assert!(service.release_slot(&slot.id).await.unwrap());
        assert!(!service.release_slot(&slot.id).await.unwrap());
        let released = service.get_slot(&slot.id).await.unwrap().unwrap();
        assert_eq!(released.status, SlotStatus::Available);
        assert!(released.booked_at.is_none());
    }
}
