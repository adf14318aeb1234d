use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, DatabaseBackend};
use shared_database::{collections, DocumentStore, MemoryStore, COLLECTION_INDEXES};
use shared_models::auth::{User, UserRole};

use crate::jwt::issue_token;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_backend: DatabaseBackend::Memory,
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_days: 30,
            cors_origins: vec!["*".to_string()],
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

/// An `AppState` over a fresh in-memory store with the collection indexes registered.
pub async fn memory_state() -> AppState {
    let store = MemoryStore::new();
    store
        .ensure_indexes(COLLECTION_INDEXES)
        .await
        .expect("memory store accepts index registration");
    AppState::new(TestConfig::default().to_app_config(), Arc::new(store))
}

/// Inserts the user directly into the store and returns a valid token for it.
pub async fn seed_user(state: &AppState, user: &TestUser) -> String {
    let mut document = serde_json::to_value(user.to_user()).expect("user serializes");
    document["password_hash"] = json!("not-a-real-hash");
    state
        .store
        .insert(collections::USERS, document)
        .await
        .expect("seeded user is unique");
    JwtTestUtils::create_test_token(user, &state.config.jwt_secret, None)
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", UserRole::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: format!("Test {}", role),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, UserRole::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, UserRole::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, UserRole::Admin)
    }

    pub fn to_user(&self) -> User {
        let now = Utc::now();
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            phone: Some("+1-555-0100".to_string()),
            gender: None,
            age: Some(35),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        issue_token(&user.id, user.role, secret, Duration::hours(exp_hours.unwrap_or(24)))
            .expect("test secret is not empty")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
