use std::ops::Deref;
use std::sync::Arc;

use imagemeta_core::{Metadata, MetadataAttributes, ModelUuid};
use imagemeta_engine::{EngineError, MetadataStore, RetryPolicy, StoreConfig};
use imagemeta_storage::{Collection, MemoryCollection, SqliteCollection, StorageError};
use tempfile::TempDir;

/// The fully populated tuple used throughout the scenario tests.
pub fn scenario_attrs() -> MetadataAttributes {
    MetadataAttributes {
        stream: "stream".into(),
        region: "region-test".into(),
        series: "series".into(),
        arch: "arch".into(),
        virtual_type: "virtType-test".into(),
        root_storage_type: "rootStorageType-test".into(),
        root_storage_size: "rootStorageSize-test".into(),
    }
}

/// Only stream, series and arch set; the rest stay empty literals.
pub fn short_attrs(stream: &str) -> MetadataAttributes {
    MetadataAttributes {
        stream: stream.into(),
        series: "series".into(),
        arch: "arch".into(),
        ..Default::default()
    }
}

/// A store over a fresh collection, plus whatever keeps that collection alive.
pub struct TestStore<C: Collection> {
    store: MetadataStore<C>,
    dir: Option<TempDir>,
}

impl TestStore<MemoryCollection> {
    pub fn memory() -> Self {
        Self::memory_with(RetryPolicy::default())
    }

    pub fn memory_with(policy: RetryPolicy) -> Self {
        Self {
            store: MetadataStore::new(
                StoreConfig::new(ModelUuid::new()).with_retry(policy),
                Arc::new(MemoryCollection::new()),
            ),
            dir: None,
        }
    }
}

impl TestStore<SqliteCollection> {
    pub fn sqlite() -> Result<Self, StorageError> {
        Ok(Self {
            store: MetadataStore::new(
                StoreConfig::new(ModelUuid::new()),
                Arc::new(SqliteCollection::open_in_memory()?),
            ),
            dir: None,
        })
    }

    pub fn sqlite_on_disk() -> Result<Self, StorageError> {
        let dir = tempfile::tempdir()
            .map_err(|e| StorageError::Unavailable(format!("tempdir: {e}")))?;
        let store = MetadataStore::new(
            StoreConfig::new(ModelUuid::new()),
            Arc::new(SqliteCollection::open(&db_path(&dir)?)?),
        );
        Ok(Self {
            store,
            dir: Some(dir),
        })
    }

    /// A store for the same model over a fresh connection to the same file.
    pub fn reopen(&self) -> Result<MetadataStore<SqliteCollection>, StorageError> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("in-memory store cannot be reopened".into()))?;
        Ok(MetadataStore::new(
            StoreConfig::new(self.store.model_uuid()),
            Arc::new(SqliteCollection::open(&db_path(dir)?)?),
        ))
    }
}

fn db_path(dir: &TempDir) -> Result<String, StorageError> {
    dir.path()
        .join("cloudimagemetadata.db")
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| StorageError::Unavailable("non-utf8 temp path".into()))
}

impl<C: Collection> TestStore<C> {
    pub fn save(&self, attrs: &MetadataAttributes, image_id: &str) -> Result<(), EngineError> {
        self.store.save_metadata(&Metadata::new(attrs.clone(), image_id))
    }

    pub fn find_all(&self) -> Result<Vec<Metadata>, EngineError> {
        self.store.find_metadata(&MetadataAttributes::default())
    }

    /// A second handle on the same collection and model, e.g. for another thread.
    pub fn handle(&self) -> MetadataStore<C> {
        self.store.clone()
    }
}

impl<C: Collection> Deref for TestStore<C> {
    type Target = MetadataStore<C>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Order-insensitive comparison; find results are a set.
pub fn same_contents(mut got: Vec<Metadata>, mut want: Vec<Metadata>) -> bool {
    let key = |m: &Metadata| {
        let mut parts: Vec<String> = m.attributes.iter().map(|(_, v)| v.to_string()).collect();
        parts.push(m.image_id.clone());
        parts
    };
    got.sort_by_key(key);
    want.sort_by_key(key);
    got == want
}
