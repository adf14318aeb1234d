use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    collections, from_document, from_documents, to_document, DocumentStore, Filter, FindOptions,
    StoreError,
};
use shared_models::auth::{TokenResponse, User, UserRole};
use shared_utils::access::authorize;
use shared_utils::extractor::resolve_user;
use shared_utils::jwt::issue_token;
use shared_utils::AppState;

use crate::error::AuthError;
use crate::models::{LoginRequest, RegisterRequest, StoredUser, UpdateProfileRequest};
use crate::services::password::PasswordService;

pub struct IdentityService {
    state: AppState,
}

impl IdentityService {
    pub fn new(state: &AppState) -> Self {
        Self { state: state.clone() }
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.state.store
    }

    fn issue(&self, user: User) -> Result<TokenResponse, AuthError> {
        let token = issue_token(&user.id, user.role, &self.state.config.jwt_secret, self.state.token_ttl())
            .map_err(AuthError::TokenIssue)?;
        Ok(TokenResponse::bearer(token, user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, AuthError> {
        let found = self
            .store()
            .find_one(collections::USERS, &Filter::new().eq("email", email))
            .await?;
        Ok(found.map(from_document).transpose()?)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<TokenResponse, AuthError> {
        debug!("Registering new {} account for: {}", request.role, request.email);

        validate_email(&request.email)?;
        validate_name(&request.name)?;

        if self.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        if !PasswordService::is_strong_enough(&request.password) {
            return Err(AuthError::WeakPassword);
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let now = Utc::now();
        let stored = StoredUser {
            user: User {
                id: Uuid::new_v4().to_string(),
                email: request.email,
                name: request.name.trim().to_string(),
                role: request.role,
                phone: request.phone,
                gender: request.gender,
                age: request.age,
                created_at: now,
                updated_at: now,
                is_active: true,
            },
            password_hash,
        };

        // The pre-check above can race; the unique index is the final word.
        self.store()
            .insert(collections::USERS, to_document(&stored)?)
            .await
            .map_err(duplicate_email_or)?;

        info!("Registered user {} as {}", stored.user.id, stored.user.role);
        self.issue(stored.user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        debug!("Login attempt for: {}", request.email);

        let stored = self
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = PasswordService::verify_password(&request.password, &stored.password_hash)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        if !valid {
            warn!("Failed login for user {}", stored.user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !stored.user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.issue(stored.user)
    }

    pub async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        Ok(resolve_user(&self.state, token).await?)
    }

    pub fn authorize<'a>(&self, user: &'a User, allowed: &[UserRole]) -> Result<&'a User, AuthError> {
        Ok(authorize(user, allowed)?)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        request: UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        debug!("Updating profile for user: {}", user.id);

        let mut changes = Map::new();

        if let Some(name) = request.name {
            validate_name(&name)?;
            changes.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(email) = request.email {
            if email != user.email {
                validate_email(&email)?;
                if self.find_by_email(&email).await?.is_some() {
                    return Err(AuthError::DuplicateEmail);
                }
            }
            changes.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = request.phone {
            changes.insert("phone".to_string(), json!(phone));
        }
        if let Some(gender) = request.gender {
            changes.insert("gender".to_string(), json!(gender));
        }
        if let Some(age) = request.age {
            changes.insert("age".to_string(), json!(age));
        }

        changes.insert("updated_at".to_string(), json!(Utc::now()));

        let mut updated = self
            .store()
            .update(collections::USERS, &Filter::by_id(&user.id), Value::Object(changes))
            .await
            .map_err(duplicate_email_or)?;

        if updated.is_empty() {
            return Err(AuthError::NotFound);
        }

        Ok(from_document(updated.swap_remove(0))?)
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, AuthError> {
        self.authorize(actor, &[UserRole::Admin])?;

        let documents = self
            .store()
            .find(collections::USERS, &Filter::new(), &FindOptions::new().sort_asc("created_at"))
            .await?;
        Ok(from_documents(documents)?)
    }

    pub async fn get_user(&self, actor: &User, user_id: &str) -> Result<User, AuthError> {
        self.authorize(actor, &[UserRole::Admin, UserRole::Doctor])?;

        let document = self
            .store()
            .find_one(collections::USERS, &Filter::by_id(user_id))
            .await?
            .ok_or(AuthError::NotFound)?;
        Ok(from_document(document)?)
    }

    /// Enables or disables an account. Disabled accounts cannot log in and their
    /// outstanding tokens stop resolving.
    pub async fn set_account_status(
        &self,
        actor: &User,
        user_id: &str,
        is_active: bool,
    ) -> Result<User, AuthError> {
        self.authorize(actor, &[UserRole::Admin])?;

        let mut updated = self
            .store()
            .update(
                collections::USERS,
                &Filter::by_id(user_id),
                json!({ "is_active": is_active, "updated_at": Utc::now() }),
            )
            .await?;

        if updated.is_empty() {
            return Err(AuthError::NotFound);
        }

        info!("Admin {} set user {} active={}", actor.id, user_id, is_active);
        Ok(from_document(updated.swap_remove(0))?)
    }
}

fn duplicate_email_or(err: StoreError) -> AuthError {
    if err.is_unique_violation_on(collections::USERS, "email") {
        AuthError::DuplicateEmail
    } else {
        AuthError::Store(err)
    }
}

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

fn validate_email(email: &str) -> Result<(), AuthError> {
    let pattern = EMAIL_PATTERN.as_ref().ok_or_else(|| AuthError::InvalidField {
        field: "email",
        reason: "email pattern failed to compile".to_string(),
    })?;

    if pattern.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidField {
            field: "email",
            reason: "not a valid email address".to_string(),
        })
    }
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::InvalidField {
            field: "name",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use shared_utils::test_utils::memory_state;
    use shared_utils::AccessError;

    fn registration(email: &str, password: &str, role: UserRole) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: "Asha Rao".to_string(),
            role,
            phone: Some("+91-9800000000".to_string()),
            gender: Some("female".to_string()),
            age: Some(34),
        }
    }

    #[tokio::test]
    async fn test_register_returns_token_for_new_user() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);

        let response = service
            .register(registration("asha@example.com", "Passw0rdX", UserRole::Doctor))
            .await
            .unwrap();

        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.user.role, UserRole::Doctor);
        assert!(response.user.is_active);

        let resolved = service.resolve_token(&response.access_token).await.unwrap();
        assert_eq!(resolved.id, response.user.id);
    }

    #[tokio::test]
    async fn test_second_registration_with_same_email_conflicts() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);

        service
            .register(registration("dup@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();
        let second = service
            .register(registration("dup@example.com", "Another1pass", UserRole::Doctor))
            .await;

        assert_matches!(second, Err(AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_weak_passwords_are_rejected() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);

        for (i, weak) in ["short1", "lettersonly", "1234567890"].iter().enumerate() {
            let result = service
                .register(registration(&format!("weak{}@example.com", i), weak, UserRole::Patient))
                .await;
            assert_matches!(result, Err(AuthError::WeakPassword));
        }

        assert_eq!(state.store.count(collections::USERS, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_password_hash_is_not_the_password() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);
        service
            .register(registration("hash@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();

        let stored = state
            .store
            .find_one(collections::USERS, &Filter::new().eq("email", "hash@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored["password_hash"], "Passw0rdX");
        assert!(stored["password_hash"].as_str().unwrap().starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_login_errors_do_not_reveal_which_part_was_wrong() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);
        service
            .register(registration("login@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();

        let wrong_password = service
            .login(LoginRequest { email: "login@example.com".into(), password: "Wrong0pass".into() })
            .await
            .unwrap_err();
        let wrong_email = service
            .login(LoginRequest { email: "nobody@example.com".into(), password: "Passw0rdX".into() })
            .await
            .unwrap_err();

        assert_matches!(wrong_password, AuthError::InvalidCredentials);
        assert_matches!(wrong_email, AuthError::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), wrong_email.to_string());

        let ok = service
            .login(LoginRequest { email: "login@example.com".into(), password: "Passw0rdX".into() })
            .await
            .unwrap();
        assert_eq!(ok.user.email, "login@example.com");
    }

    #[tokio::test]
    async fn test_disabled_account_cannot_login_or_use_token() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);
        let admin = service
            .register(registration("root@example.com", "Passw0rdX", UserRole::Admin))
            .await
            .unwrap();
        let patient = service
            .register(registration("off@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();

        service
            .set_account_status(&admin.user, &patient.user.id, false)
            .await
            .unwrap();

        let login = service
            .login(LoginRequest { email: "off@example.com".into(), password: "Passw0rdX".into() })
            .await;
        assert_matches!(login, Err(AuthError::AccountDisabled));

        let resolved = service.resolve_token(&patient.access_token).await;
        assert_matches!(resolved, Err(AuthError::Access(AccessError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_profile_update_keeps_role_and_checks_email() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);
        let first = service
            .register(registration("first@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();
        service
            .register(registration("second@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();

        let clash = service
            .update_profile(
                &first.user,
                UpdateProfileRequest { email: Some("second@example.com".into()), ..Default::default() },
            )
            .await;
        assert_matches!(clash, Err(AuthError::DuplicateEmail));

        let updated = service
            .update_profile(
                &first.user,
                UpdateProfileRequest { name: Some("Asha R.".into()), age: Some(35), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Asha R.");
        assert_eq!(updated.age, Some(35));
        assert_eq!(updated.role, UserRole::Patient);
        assert!(updated.updated_at >= first.user.updated_at);
    }

    #[tokio::test]
    async fn test_user_administration_is_role_gated() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);
        let admin = service
            .register(registration("admin@example.com", "Passw0rdX", UserRole::Admin))
            .await
            .unwrap();
        let doctor = service
            .register(registration("doc@example.com", "Passw0rdX", UserRole::Doctor))
            .await
            .unwrap();
        let patient = service
            .register(registration("pat@example.com", "Passw0rdX", UserRole::Patient))
            .await
            .unwrap();

        assert_eq!(service.list_users(&admin.user).await.unwrap().len(), 3);
        assert_matches!(
            service.list_users(&doctor.user).await,
            Err(AuthError::Access(AccessError::Forbidden))
        );

        let seen = service.get_user(&doctor.user, &patient.user.id).await.unwrap();
        assert_eq!(seen.email, "pat@example.com");
        assert_matches!(
            service.get_user(&patient.user, &doctor.user.id).await,
            Err(AuthError::Access(AccessError::Forbidden))
        );
        assert_matches!(service.get_user(&admin.user, "missing").await, Err(AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_invalid_email_is_a_validation_error() {
        let state = memory_state().await;
        let service = IdentityService::new(&state);

        let result = service
            .register(registration("not-an-email", "Passw0rdX", UserRole::Patient))
            .await;
        assert_matches!(result, Err(AuthError::InvalidField { field: "email", .. }));
    }

    #[test]
    fn test_email_pattern_is_reused_across_calls() {
        for email in ["a@b.co", "dr.rao@clinic.example.in"] {
            assert!(validate_email(email).is_ok());
        }
        for email in ["plain", "two@@signs.com", "space @x.io", "no-dot@host"] {
            assert_matches!(validate_email(email), Err(AuthError::InvalidField { field: "email", .. }));
        }
        assert!(EMAIL_PATTERN.is_some());
    }
}
