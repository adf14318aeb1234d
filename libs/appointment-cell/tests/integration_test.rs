use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::{availability_routes, doctor_routes};
use shared_utils::test_utils::memory_state;
use shared_utils::AppState;

fn create_test_app(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, email: &str, name: &str, role: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "Sup3rSecret", "name": name, "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

struct Scenario {
    app: Router,
    doctor_token: String,
    patient_token: String,
    slot: Value,
}

async fn scenario() -> Scenario {
    let app = create_test_app(memory_state().await);
    let (doctor_token, _) = register(&app, "dr.shah@example.com", "Dr. Neha Shah", "doctor").await;
    let (patient_token, _) = register(&app, "kiran@example.com", "Kiran Patil", "patient").await;

    let (status, _) = call(
        &app,
        "POST",
        "/doctors/profile",
        Some(&doctor_token),
        Some(json!({
            "specializations": ["General Medicine"],
            "consultation_fee_online": 300.0,
            "consultation_fee_clinic": 450.0,
            "consultation_types": ["online", "clinic"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let tomorrow = (Utc::now().date_naive() + Duration::days(1)).to_string();
    let (status, slot) = call(
        &app,
        "POST",
        "/availability",
        Some(&doctor_token),
        Some(json!({ "date": tomorrow, "start_time": "09:00", "end_time": "10:00", "consultation_type": "online" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    Scenario { app, doctor_token, patient_token, slot }
}

fn booking(slot: &Value) -> Value {
    json!({
        "doctor_id": slot["doctor_id"],
        "availability_slot_id": slot["id"],
        "consultation_type": slot["consultation_type"],
        "appointment_date": slot["date"],
        "start_time": slot["start_time"],
        "end_time": slot["end_time"],
        "reason": "Persistent cough"
    })
}

#[tokio::test]
async fn test_book_confirm_complete_then_cancel_is_rejected() {
    let s = scenario().await;

    let (status, appointment) = call(&s.app, "POST", "/appointments", Some(&s.patient_token), Some(booking(&s.slot))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", appointment);
    assert_eq!(appointment["status"], "pending");
    assert_eq!(appointment["doctor"]["name"], "Dr. Neha Shah");
    assert_eq!(appointment["doctor"]["consultation_fee"], 300.0);
    assert_eq!(appointment["patient"]["email"], "kiran@example.com");
    let id = appointment["id"].as_str().unwrap().to_string();

    let doctor_id = s.slot["doctor_id"].as_str().unwrap();
    let (_, public_slots) = call(&s.app, "GET", &format!("/doctors/{}/availability", doctor_id), None, None).await;
    assert!(public_slots.as_array().unwrap().is_empty());

    let (status, confirmed) = call(
        &s.app,
        "PUT",
        &format!("/appointments/{}/status", id),
        Some(&s.doctor_token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");
    assert!(confirmed["confirmed_at"].is_string());

    let (status, completed) = call(
        &s.app,
        "PUT",
        &format!("/appointments/{}/status", id),
        Some(&s.doctor_token),
        Some(json!({ "status": "completed", "notes": "Prescribed rest" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].is_string());
    assert_eq!(completed["notes"], "Prescribed rest");

    let (status, error) = call(&s.app, "DELETE", &format!("/appointments/{}", id), Some(&s.patient_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "AlreadyFinal");
}

#[tokio::test]
async fn test_second_patient_is_turned_away() {
    let s = scenario().await;
    let (second_token, _) = register(&s.app, "meena@example.com", "Meena Joshi", "patient").await;

    let (status, first) = call(&s.app, "POST", "/appointments", Some(&s.patient_token), Some(booking(&s.slot))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = call(&s.app, "POST", "/appointments", Some(&second_token), Some(booking(&s.slot))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "SlotUnavailable");

    let (_, own_slots) = call(&s.app, "GET", "/availability", Some(&s.doctor_token), None).await;
    assert_eq!(own_slots[0]["status"], "booked");

    let (_, doctor_view) = call(&s.app, "GET", "/appointments", Some(&s.doctor_token), None).await;
    let appointments = doctor_view.as_array().unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["id"], first["id"]);
}

#[tokio::test]
async fn test_patient_cannot_confirm_and_cancel_frees_slot() {
    let s = scenario().await;
    let (_, appointment) = call(&s.app, "POST", "/appointments", Some(&s.patient_token), Some(booking(&s.slot))).await;
    let id = appointment["id"].as_str().unwrap().to_string();

    let (status, error) = call(
        &s.app,
        "PUT",
        &format!("/appointments/{}/status", id),
        Some(&s.patient_token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["kind"], "authorization");

    let (status, cancelled) = call(
        &s.app,
        "DELETE",
        &format!("/appointments/{}?reason=Feeling%20better", id),
        Some(&s.patient_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "Feeling better");

    let (_, own_slots) = call(&s.app, "GET", "/availability", Some(&s.doctor_token), None).await;
    assert_eq!(own_slots[0]["status"], "available");
}

#[tokio::test]
async fn test_consistency_repair_endpoint() {
    let s = scenario().await;

    let (status, report) = call(&s.app, "POST", "/appointments/consistency/repair", Some(&s.doctor_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["examined"], 0);

    let (status, _) = call(&s.app, "POST", "/appointments/consistency/repair", Some(&s.patient_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&s.app, "GET", "/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
