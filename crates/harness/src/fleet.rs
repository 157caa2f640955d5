use std::sync::Arc;

use imagemeta_core::ModelUuid;
use imagemeta_engine::{MetadataStore, RetryPolicy, StoreConfig};
use imagemeta_storage::Collection;

/// Several independent stores (one per provisioning worker) over a single
/// shared collection and model.
pub struct TestFleet<C: Collection> {
    collection: Arc<C>,
    workers: Vec<MetadataStore<C>>,
    model_uuid: ModelUuid,
    retry: RetryPolicy,
}

impl<C: Collection> TestFleet<C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection: Arc::new(collection),
            workers: Vec::new(),
            model_uuid: ModelUuid::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Policy for workers added after this call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn add_worker(&mut self) -> usize {
        let store = MetadataStore::new(
            StoreConfig::new(self.model_uuid).with_retry(self.retry.clone()),
            Arc::clone(&self.collection),
        );
        let index = self.workers.len();
        self.workers.push(store);
        index
    }

    pub fn worker(&self, index: usize) -> &MetadataStore<C> {
        &self.workers[index]
    }

    pub fn workers(&self) -> &[MetadataStore<C>] {
        &self.workers
    }
}
