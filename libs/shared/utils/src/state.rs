use std::sync::Arc;

use chrono::Duration;

use shared_config::AppConfig;
use shared_database::DocumentStore;

/// Per-process context handed to every router: configuration plus the store handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::days(self.config.token_ttl_days)
    }
}
