pub mod memory;
pub mod postgrest;
pub mod store;
pub mod supabase;

use std::sync::Arc;

use shared_config::{AppConfig, DatabaseBackend};

pub use memory::MemoryStore;
pub use postgrest::SupabaseStore;
pub use store::{
    collections, from_document, from_documents, to_document, DocumentStore, Filter, FindOptions,
    IndexSpec, SortOrder, StoreError, COLLECTION_INDEXES,
};

/// Builds the store selected by configuration and registers the collection indexes.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match config.database_backend {
        DatabaseBackend::Supabase => Arc::new(SupabaseStore::new(config)),
        DatabaseBackend::Memory => Arc::new(MemoryStore::new()),
    };

    store.ensure_indexes(COLLECTION_INDEXES).await?;
    tracing::info!("Document store ready ({})", config.database_backend);
    Ok(store)
}
