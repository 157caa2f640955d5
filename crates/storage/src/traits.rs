use serde::{Deserialize, Serialize};

use imagemeta_core::{Criteria, KeyToken, Metadata, MetadataAttributes, ModelUuid};

use crate::error::StorageError;

/// Persisted shape of one cached image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDoc {
    pub id: String,
    pub model_uuid: ModelUuid,
    pub attributes: MetadataAttributes,
    pub image_id: String,
}

impl ImageDoc {
    pub fn doc_id(model_uuid: ModelUuid, key: &KeyToken) -> String {
        format!("{model_uuid}:{key}")
    }

    pub fn new(model_uuid: ModelUuid, key: &KeyToken, metadata: &Metadata) -> Self {
        Self {
            id: Self::doc_id(model_uuid, key),
            model_uuid,
            attributes: metadata.attributes.clone(),
            image_id: metadata.image_id.clone(),
        }
    }

    pub fn into_metadata(self) -> Metadata {
        Metadata {
            attributes: self.attributes,
            image_id: self.image_id,
        }
    }
}

/// A document as read back, with the revision the collection assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDoc {
    pub doc: ImageDoc,
    pub revision: u64,
}

/// Precondition on a document's state at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assertion {
    DocMissing,
    Revision(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocChange {
    Insert(ImageDoc),
    /// Replaces the attribute fields and image id; bumps the revision.
    Update(ImageDoc),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnOp {
    pub doc_id: String,
    pub assert: Assertion,
    pub change: DocChange,
}

impl TxnOp {
    pub fn insert(doc: ImageDoc) -> Self {
        Self {
            doc_id: doc.id.clone(),
            assert: Assertion::DocMissing,
            change: DocChange::Insert(doc),
        }
    }

    pub fn update(doc: ImageDoc, revision: u64) -> Self {
        Self {
            doc_id: doc.id.clone(),
            assert: Assertion::Revision(revision),
            change: DocChange::Update(doc),
        }
    }
}

/// Scan filter: documents of one model whose fields satisfy `criteria`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub model_uuid: ModelUuid,
    pub criteria: Criteria,
}

/// A document collection whose only write primitive is an all-or-nothing
/// transaction guarded by per-operation assertions.
///
/// `run` must check every assertion against the state prior to the
/// transaction and return [`StorageError::Aborted`] without applying anything
/// if any of them fails.
pub trait Collection: Send + Sync {
    fn get(&self, doc_id: &str) -> Result<Option<StoredDoc>, StorageError>;

    fn find(&self, filter: &Filter) -> Result<Vec<StoredDoc>, StorageError>;

    fn run(&self, ops: &[TxnOp]) -> Result<(), StorageError>;
}

impl<C: Collection + ?Sized> Collection for std::sync::Arc<C> {
    fn get(&self, doc_id: &str) -> Result<Option<StoredDoc>, StorageError> {
        (**self).get(doc_id)
    }

    fn find(&self, filter: &Filter) -> Result<Vec<StoredDoc>, StorageError> {
        (**self).find(filter)
    }

    fn run(&self, ops: &[TxnOp]) -> Result<(), StorageError> {
        (**self).run(ops)
    }
}
