use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use auth_cell::router::{auth_routes, user_routes};
use dashboard_cell::router::dashboard_routes;
use doctor_cell::router::{availability_routes, doctor_routes};
use shared_utils::AppState;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state));

    Router::new().nest("/api", api)
}

async fn banner() -> Json<Value> {
    Json(json!({ "message": "DocEase Healthcare Platform API" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now() }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use shared_utils::test_utils::memory_state;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_banner_and_health() {
        let app = create_router(memory_state().await);

        let (status, body) = send(&app, Request::get("/api").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "DocEase Healthcare Platform API");

        let (status, body) = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_cells_are_mounted_under_api() {
        let app = create_router(memory_state().await);

        let register = Request::post("/api/auth/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "email": "nora@example.com",
                    "password": "Sup3rSecret",
                    "name": "Nora Das",
                    "role": "patient"
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&app, register).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Request::get("/api/doctors").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());

        let dashboard = Request::get("/api/dashboard/patient")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, dashboard).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "nora@example.com");

        let (status, _) = send(&app, Request::get("/api/appointments").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
