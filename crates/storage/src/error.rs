use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction aborted: assertion failed on {doc_id}")]
    Aborted { doc_id: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl StorageError {
    /// True when a transaction was rejected because a document changed
    /// between read and commit. Callers may re-read and resubmit.
    pub fn is_aborted(&self) -> bool {
        matches!(self, StorageError::Aborted { .. })
    }
}
