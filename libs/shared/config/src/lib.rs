use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Supabase,
    Memory,
}

impl FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "supabase" | "postgrest" => Ok(DatabaseBackend::Supabase),
            "memory" | "in-memory" => Ok(DatabaseBackend::Memory),
            other => Err(format!("Unknown database backend: {}", other)),
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Supabase => write!(f, "supabase"),
            DatabaseBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_backend: DatabaseBackend,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub cors_origins: Vec<String>,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_backend = env::var("DATABASE_BACKEND")
            .ok()
            .and_then(|value| match value.parse::<DatabaseBackend>() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    warn!("{}, falling back to memory", e);
                    None
                }
            })
            .unwrap_or_else(|| {
                warn!("DATABASE_BACKEND not set, using in-memory store");
                DatabaseBackend::Memory
            });

        let config = Self {
            database_backend,
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            token_ttl_days: env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|days| days.parse::<i64>().ok())
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_DAYS),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| parse_origins(&origins))
                .unwrap_or_else(|_| vec!["*".to_string()]),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.database_backend {
            DatabaseBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
            DatabaseBackend::Memory => true,
        };

        store_ready && !self.jwt_secret.is_empty()
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
