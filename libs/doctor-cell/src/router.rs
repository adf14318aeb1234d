use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

/// Mounted at `/doctors`.
pub fn doctor_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor_public))
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability_public));

    let protected_routes = Router::new()
        .route(
            "/profile",
            get(handlers::get_own_profile)
                .post(handlers::create_profile)
                .put(handlers::update_profile),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Mounted at `/availability`. The doctor's own slots.
pub fn availability_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::list_own_slots).post(handlers::create_slot))
        .route("/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
