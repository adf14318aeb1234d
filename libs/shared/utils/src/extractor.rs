use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

use shared_database::{collections, from_document, Filter};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::access::AccessError;
use crate::jwt::validate_token;
use crate::state::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Result<String, AccessError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| AccessError::Unauthenticated("Missing or malformed authorization header".to_string()))
}

/// Resolves a bearer token to the stored user it names. Fails when the signature or
/// expiry is invalid, the user no longer exists, or the account is disabled.
pub async fn resolve_user(state: &AppState, token: &str) -> Result<User, AccessError> {
    let claims = validate_token(token, &state.config.jwt_secret).map_err(AccessError::Unauthenticated)?;

    let document = state
        .store
        .find_one(collections::USERS, &Filter::by_id(&claims.sub))
        .await?
        .ok_or_else(|| AccessError::Unauthenticated("User no longer exists".to_string()))?;

    let user: User = from_document(document)?;
    if !user.is_active {
        return Err(AccessError::AccountDisabled);
    }

    debug!("Resolved token to user {} ({})", user.id, user.role);
    Ok(user)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let user = resolve_user(&state, &token).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
