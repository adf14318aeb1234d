use axum::{middleware, routing::get, Router};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

/// Mounted at `/dashboard`; one view per role.
pub fn dashboard_routes(state: AppState) -> Router {
    Router::new()
        .route("/patient", get(handlers::patient_dashboard))
        .route("/doctor", get(handlers::doctor_dashboard))
        .route("/admin", get(handlers::admin_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
