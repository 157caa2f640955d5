use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use crate::error::StorageError;
use crate::traits::{Assertion, Collection, DocChange, Filter, ImageDoc, StoredDoc, TxnOp};

/// Runs once, just before a transaction's assertions are checked.
pub type BeforeHook = Box<dyn FnOnce() + Send>;

pub fn before_hook<F: FnOnce() + Send + 'static>(f: F) -> BeforeHook {
    Box::new(f)
}

struct Slot {
    bytes: Vec<u8>,
    revision: u64,
}

/// In-process collection. Documents are held msgpack-encoded so every read
/// hands out a fresh copy.
///
/// Hooks queued with [`MemoryCollection::set_before_hooks`] let tests slip a
/// competing write in between a writer's read and its commit.
#[derive(Default)]
pub struct MemoryCollection {
    docs: RwLock<BTreeMap<String, Slot>>,
    hooks: Mutex<VecDeque<BeforeHook>>,
    failures: Mutex<VecDeque<String>>,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue hooks; each `run` pops and executes at most one.
    pub fn set_before_hooks(&self, hooks: Vec<BeforeHook>) -> Result<(), StorageError> {
        let mut queue = self
            .hooks
            .lock()
            .map_err(|_| StorageError::Poisoned("hook queue"))?;
        queue.extend(hooks);
        Ok(())
    }

    /// Make the next `run` fail with [`StorageError::Unavailable`].
    pub fn fail_next_run(&self, reason: impl Into<String>) -> Result<(), StorageError> {
        self.failures
            .lock()
            .map_err(|_| StorageError::Poisoned("failure queue"))?
            .push_back(reason.into());
        Ok(())
    }

    pub fn pending_hooks(&self) -> usize {
        self.hooks.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_hook(&self) -> Result<Option<BeforeHook>, StorageError> {
        Ok(self
            .hooks
            .lock()
            .map_err(|_| StorageError::Poisoned("hook queue"))?
            .pop_front())
    }

    fn next_failure(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .failures
            .lock()
            .map_err(|_| StorageError::Poisoned("failure queue"))?
            .pop_front())
    }
}

fn encode(doc: &ImageDoc) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(doc).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode(slot: &Slot) -> Result<StoredDoc, StorageError> {
    let doc: ImageDoc =
        rmp_serde::from_slice(&slot.bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(StoredDoc {
        doc,
        revision: slot.revision,
    })
}

impl Collection for MemoryCollection {
    fn get(&self, doc_id: &str) -> Result<Option<StoredDoc>, StorageError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::Poisoned("documents"))?;
        docs.get(doc_id).map(decode).transpose()
    }

    fn find(&self, filter: &Filter) -> Result<Vec<StoredDoc>, StorageError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::Poisoned("documents"))?;

        let mut result = Vec::new();
        for slot in docs.values() {
            let stored = decode(slot)?;
            if stored.doc.model_uuid == filter.model_uuid
                && filter.criteria.matches(&stored.doc.attributes)
            {
                result.push(stored);
            }
        }
        Ok(result)
    }

    fn run(&self, ops: &[TxnOp]) -> Result<(), StorageError> {
        // Hooks run without any lock held: they usually write to this collection.
        if let Some(hook) = self.next_hook()? {
            hook();
        }
        if let Some(reason) = self.next_failure()? {
            return Err(StorageError::Unavailable(reason));
        }

        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::Poisoned("documents"))?;

        for op in ops {
            let current = docs.get(&op.doc_id).map(|s| s.revision);
            let holds = match (op.assert, current) {
                (Assertion::DocMissing, None) => true,
                (Assertion::Revision(want), Some(have)) => want == have,
                _ => false,
            };
            if !holds {
                self.aborted.fetch_add(1, Ordering::SeqCst);
                debug!(doc_id = %op.doc_id, ?current, assert = ?op.assert, "assertion failed");
                return Err(StorageError::Aborted {
                    doc_id: op.doc_id.clone(),
                });
            }
        }

        // Stage every write against the pre-transaction state plus earlier
        // staged writes; the live map is only touched once all ops are valid.
        let mut staged: BTreeMap<&str, Slot> = BTreeMap::new();
        for op in ops {
            let existing = staged
                .get(op.doc_id.as_str())
                .map(|s| s.revision)
                .or_else(|| docs.get(&op.doc_id).map(|s| s.revision));
            let slot = match (&op.change, existing) {
                (DocChange::Insert(doc), None) => Slot {
                    bytes: encode(doc)?,
                    revision: 1,
                },
                (DocChange::Update(doc), Some(revision)) => Slot {
                    bytes: encode(doc)?,
                    revision: revision + 1,
                },
                (DocChange::Insert(_), Some(_)) => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "insert of existing document {}",
                        op.doc_id
                    )));
                }
                (DocChange::Update(_), None) => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "update of missing document {}",
                        op.doc_id
                    )));
                }
            };
            staged.insert(op.doc_id.as_str(), slot);
        }

        for (doc_id, slot) in staged {
            docs.insert(doc_id.to_string(), slot);
        }
        self.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
