use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{LoginRequest, RegisterRequest, SetAccountStatusRequest, UpdateProfileRequest};
use crate::services::IdentityService;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let service = IdentityService::new(&state);
    let response = service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let service = IdentityService::new(&state);
    let response = service.login(request).await?;

    Ok(Json(response))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

pub async fn me(Extension(user): Extension<User>) -> Result<Json<User>, AppError> {
    debug!("Returning profile for user {}", user.id);
    Ok(Json(user))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let service = IdentityService::new(&state);
    let updated = service.update_profile(&user, request).await?;

    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<User>>, AppError> {
    let service = IdentityService::new(&state);
    let users = service.list_users(&user).await?;

    Ok(Json(users))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<User>, AppError> {
    let service = IdentityService::new(&state);
    let found = service.get_user(&user, &user_id).await?;

    Ok(Json(found))
}

#[axum::debug_handler]
pub async fn set_account_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAccountStatusRequest>,
) -> Result<Json<User>, AppError> {
    let service = IdentityService::new(&state);
    let updated = service
        .set_account_status(&user, &user_id, request.is_active)
        .await?;

    Ok(Json(updated))
}
