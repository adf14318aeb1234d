use serde::{Deserialize, Serialize};

use shared_models::auth::{User, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile edit. Role is deliberately absent: it cannot change after registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAccountStatusRequest {
    pub is_active: bool,
}

/// A `users` document: the public user plus its password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}
