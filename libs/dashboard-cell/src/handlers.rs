use axum::{
    extract::{Extension, State},
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{AdminDashboard, DoctorDashboard, PatientDashboard};
use crate::services::DashboardService;

#[axum::debug_handler]
pub async fn patient_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<PatientDashboard>, AppError> {
    let dashboard = DashboardService::new(&state).patient_dashboard(&user).await?;
    Ok(Json(dashboard))
}

#[axum::debug_handler]
pub async fn doctor_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<DoctorDashboard>, AppError> {
    let dashboard = DashboardService::new(&state).doctor_dashboard(&user).await?;
    Ok(Json(dashboard))
}

#[axum::debug_handler]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<AdminDashboard>, AppError> {
    let dashboard = DashboardService::new(&state).admin_dashboard(&user).await?;
    Ok(Json(dashboard))
}
