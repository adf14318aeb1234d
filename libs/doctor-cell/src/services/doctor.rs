use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    collections, from_document, from_documents, to_document, DocumentStore, Filter, FindOptions,
    StoreError,
};
use shared_models::auth::{User, UserRole};
use shared_utils::{authorize, AppState};

use crate::error::DoctorError;
use crate::models::{
    ConsultationType, CreateDoctorProfileRequest, DoctorProfile, DoctorProfileResponse,
    DoctorSearchQuery, UpdateDoctorProfileRequest,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Create the calling doctor's profile. A doctor has at most one.
    pub async fn create_profile(
        &self,
        doctor: &User,
        request: CreateDoctorProfileRequest,
    ) -> Result<DoctorProfileResponse, DoctorError> {
        authorize(doctor, &[UserRole::Doctor])?;
        debug!("Creating doctor profile for user: {}", doctor.id);

        if self.find_profile(&doctor.id).await?.is_some() {
            return Err(DoctorError::ProfileAlreadyExists);
        }

        validate_fee("consultation_fee_online", request.consultation_fee_online)?;
        validate_fee("consultation_fee_clinic", request.consultation_fee_clinic)?;

        let now = Utc::now();
        let profile = DoctorProfile {
            id: Uuid::new_v4().to_string(),
            user_id: doctor.id.clone(),
            bio: request.bio,
            specializations: dedup(request.specializations),
            qualifications: request.qualifications,
            experience_years: request.experience_years,
            license_number: request.license_number,
            consultation_fee_online: request.consultation_fee_online,
            consultation_fee_clinic: request.consultation_fee_clinic,
            consultation_types: dedup(request.consultation_types),
            profile_image: request.profile_image,
            clinic_info: request.clinic_info,
            rating: 0.0,
            total_reviews: 0,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(collections::DOCTOR_PROFILES, to_document(&profile)?)
            .await
            .map_err(|e| {
                if e.is_unique_violation_on(collections::DOCTOR_PROFILES, "user_id") {
                    DoctorError::ProfileAlreadyExists
                } else {
                    DoctorError::Store(e)
                }
            })?;

        info!("Created doctor profile {} for user {}", profile.id, doctor.id);
        Ok(compose(profile, doctor))
    }

    pub async fn get_own_profile(&self, doctor: &User) -> Result<DoctorProfileResponse, DoctorError> {
        authorize(doctor, &[UserRole::Doctor])?;

        let profile = self
            .find_profile(&doctor.id)
            .await?
            .ok_or(DoctorError::ProfileNotFound)?;
        Ok(compose(profile, doctor))
    }

    pub async fn update_profile(
        &self,
        doctor: &User,
        request: UpdateDoctorProfileRequest,
    ) -> Result<DoctorProfileResponse, DoctorError> {
        authorize(doctor, &[UserRole::Doctor])?;
        debug!("Updating doctor profile for user: {}", doctor.id);

        let mut changes = Map::new();

        if let Some(bio) = request.bio {
            changes.insert("bio".to_string(), json!(bio));
        }
        if let Some(specializations) = request.specializations {
            changes.insert("specializations".to_string(), json!(dedup(specializations)));
        }
        if let Some(qualifications) = request.qualifications {
            changes.insert("qualifications".to_string(), json!(qualifications));
        }
        if let Some(years) = request.experience_years {
            changes.insert("experience_years".to_string(), json!(years));
        }
        if let Some(license) = request.license_number {
            changes.insert("license_number".to_string(), json!(license));
        }
        if let Some(fee) = request.consultation_fee_online {
            validate_fee("consultation_fee_online", fee)?;
            changes.insert("consultation_fee_online".to_string(), json!(fee));
        }
        if let Some(fee) = request.consultation_fee_clinic {
            validate_fee("consultation_fee_clinic", fee)?;
            changes.insert("consultation_fee_clinic".to_string(), json!(fee));
        }
        if let Some(types) = request.consultation_types {
            changes.insert("consultation_types".to_string(), json!(dedup(types)));
        }
        if let Some(image) = request.profile_image {
            changes.insert("profile_image".to_string(), json!(image));
        }
        if let Some(clinic_info) = request.clinic_info {
            changes.insert("clinic_info".to_string(), to_document(&clinic_info)?);
        }

        changes.insert("updated_at".to_string(), json!(Utc::now()));

        let mut updated = self
            .store
            .update(
                collections::DOCTOR_PROFILES,
                &Filter::new().eq("user_id", doctor.id.as_str()),
                Value::Object(changes),
            )
            .await?;

        if updated.is_empty() {
            return Err(DoctorError::ProfileNotFound);
        }

        let profile: DoctorProfile = from_document(updated.swap_remove(0))?;
        Ok(compose(profile, doctor))
    }

    /// Public lookup by the doctor's user id. Both the profile and the user must exist.
    pub async fn get_profile_by_doctor_id(
        &self,
        doctor_id: &str,
    ) -> Result<DoctorProfileResponse, DoctorError> {
        debug!("Fetching public profile for doctor: {}", doctor_id);

        let profile = self.find_profile(doctor_id).await?.ok_or(DoctorError::NotFound)?;
        let user = self.find_user(doctor_id).await?.ok_or(DoctorError::NotFound)?;

        Ok(compose(profile, &user))
    }

    /// Profiles whose owning user is missing are left out rather than failing the listing.
    pub async fn list_doctors(
        &self,
        query: DoctorSearchQuery,
    ) -> Result<Vec<DoctorProfileResponse>, DoctorError> {
        debug!("Listing doctors with filters: {:?}", query);

        let mut filter = Filter::new();
        if let Some(specialization) = query.specialization.filter(|s| !s.is_empty()) {
            filter = filter.contains("specializations", specialization);
        }
        if let Some(city) = query.city.filter(|c| !c.is_empty()) {
            filter = filter.eq("clinic_info.city", city);
        }
        if let Some(consultation_type) = query.consultation_type {
            filter = match consultation_type {
                ConsultationType::Online | ConsultationType::Clinic => filter.overlaps(
                    "consultation_types",
                    [consultation_type.as_str(), ConsultationType::Both.as_str()],
                ),
                ConsultationType::Both => {
                    filter.contains("consultation_types", ConsultationType::Both.as_str())
                }
            };
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let options = FindOptions::new()
            .sort_desc("rating")
            .sort_asc("created_at")
            .skip(query.skip.unwrap_or(0))
            .limit(limit);

        let profiles: Vec<DoctorProfile> = from_documents(
            self.store
                .find(collections::DOCTOR_PROFILES, &filter, &options)
                .await?,
        )?;

        let mut results = Vec::with_capacity(profiles.len());
        for profile in profiles {
            match self.find_user(&profile.user_id).await? {
                Some(user) => results.push(compose(profile, &user)),
                None => warn!("Skipping doctor profile {} with no user record", profile.id),
            }
        }

        Ok(results)
    }

    pub async fn find_profile(&self, user_id: &str) -> Result<Option<DoctorProfile>, StoreError> {
        let found = self
            .store
            .find_one(collections::DOCTOR_PROFILES, &Filter::new().eq("user_id", user_id))
            .await?;
        found.map(from_document).transpose()
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, DoctorError> {
        let found = self
            .store
            .find_one(collections::USERS, &Filter::by_id(user_id))
            .await?;
        Ok(found.map(from_document).transpose()?)
    }
}

fn compose(profile: DoctorProfile, user: &User) -> DoctorProfileResponse {
    DoctorProfileResponse {
        profile,
        name: user.name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
    }
}

fn validate_fee(field: &'static str, fee: f64) -> Result<(), DoctorError> {
    if fee.is_finite() && fee >= 0.0 {
        Ok(())
    } else {
        Err(DoctorError::InvalidField {
            field,
            reason: "must be a non-negative amount".to_string(),
        })
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}
