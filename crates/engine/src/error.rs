use std::time::Duration;

use imagemeta_core::{Criteria, KeyToken};
use imagemeta_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("matching cloud image metadata not found")]
    NotFound { criteria: Criteria },

    #[error("cannot save cloud image metadata {key}: still conflicting after {attempts} attempts")]
    RetryExhausted { key: KeyToken, attempts: u32 },

    #[error("cannot save cloud image metadata {key}: deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { key: KeyToken, elapsed: Duration },
}

impl EngineError {
    /// Nothing cached yet for the requested attributes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// Backend failure or a spent retry budget. Never retried by the store.
    pub fn is_fatal(&self) -> bool {
        !self.is_not_found()
    }
}
