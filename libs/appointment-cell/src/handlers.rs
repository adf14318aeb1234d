use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    AppointmentQuery, AppointmentResponse, BookAppointmentRequest, CancelAppointmentQuery,
    RepairReport, UpdateStatusRequest,
};
use crate::services::{AppointmentBookingService, SlotReconciler};

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(&user, request).await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_appointments(&user, query).await?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(&user, &appointment_id).await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_status(&user, &appointment_id, request)
        .await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Query(query): Query<CancelAppointmentQuery>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .cancel_appointment(&user, &appointment_id, query.reason)
        .await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn repair_slot_consistency(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<RepairReport>, AppError> {
    let reconciler = SlotReconciler::new(&state);
    let report = reconciler.repair_doctor_slots(&user).await?;

    Ok(Json(report))
}
