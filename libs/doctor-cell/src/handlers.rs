use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    AvailabilitySlot, CreateDoctorProfileRequest, CreateSlotRequest, DoctorProfileResponse,
    DoctorSearchQuery, SlotQuery, UpdateDoctorProfileRequest,
};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Vec<DoctorProfileResponse>>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service.list_doctors(query).await?;

    Ok(Json(doctors))
}

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorProfileResponse>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.get_profile_by_doctor_id(&doctor_id).await?;

    Ok(Json(doctor))
}

#[axum::debug_handler]
pub async fn get_doctor_availability_public(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<AvailabilitySlot>>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    let slots = availability_service.list_public_slots(&doctor_id, query).await?;

    Ok(Json(slots))
}

// ==============================================================================
// PROFILE HANDLERS (DOCTOR ONLY)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorProfileRequest>,
) -> Result<(StatusCode, Json<DoctorProfileResponse>), AppError> {
    let doctor_service = DoctorService::new(&state);
    let profile = doctor_service.create_profile(&user, request).await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<DoctorProfileResponse>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let profile = doctor_service.get_own_profile(&user).await?;

    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<DoctorProfileResponse>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let profile = doctor_service.update_profile(&user, request).await?;

    Ok(Json(profile))
}

// ==============================================================================
// AVAILABILITY HANDLERS (DOCTOR ONLY)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<AvailabilitySlot>), AppError> {
    let availability_service = AvailabilityService::new(&state);
    let slot = availability_service.create_slot(&user, request).await?;

    Ok((StatusCode::CREATED, Json(slot)))
}

#[axum::debug_handler]
pub async fn list_own_slots(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<AvailabilitySlot>>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    let slots = availability_service.list_own_slots(&user, query).await?;

    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    availability_service.delete_slot(&user, &slot_id).await?;

    Ok(Json(json!({
        "message": "Availability slot deleted",
        "slot_id": slot_id
    })))
}
