pub mod config;
pub mod error;
pub mod find;
pub mod save;

pub use config::{RetryPolicy, StoreConfig};
pub use error::EngineError;
pub use save::SaveState;

use std::sync::Arc;

use imagemeta_core::ModelUuid;
use imagemeta_storage::Collection;

/// Cloud image metadata cache for one model.
///
/// Holds no lock of its own: conflicting saves are serialized by the
/// collection's transaction assertions. Cloning shares the collection.
pub struct MetadataStore<C: Collection> {
    config: StoreConfig,
    collection: Arc<C>,
}

impl<C: Collection> Clone for MetadataStore<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            collection: Arc::clone(&self.collection),
        }
    }
}

impl<C: Collection> MetadataStore<C> {
    pub fn new(config: StoreConfig, collection: Arc<C>) -> Self {
        Self { config, collection }
    }

    pub fn model_uuid(&self) -> ModelUuid {
        self.config.model_uuid
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }
}
