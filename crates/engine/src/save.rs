//! Save-or-replace over a compare-and-swap-only collection.
//!
//! The insert-vs-update choice is made from a point read and then guarded by
//! an assertion on that read. A failed assertion means another writer got to
//! the same document first; the loop re-reads and applies this caller's
//! payload over whatever is there now.

use std::time::Instant;

use imagemeta_core::{Metadata, derive_key};
use imagemeta_storage::{Collection, ImageDoc, StoredDoc, TxnOp};
use tracing::{debug, warn};

use crate::MetadataStore;
use crate::error::EngineError;

/// States of one `save_metadata` call.
#[derive(Debug)]
pub enum SaveState {
    ReadCurrent,
    BuildOps(Option<StoredDoc>),
    Submit(Vec<TxnOp>),
    Retry,
    Done,
    Fatal(EngineError),
}

/// Decide the transaction for `doc` given what was read. An empty list means
/// the stored document already carries this payload.
pub(crate) fn build_ops(doc: &ImageDoc, current: Option<StoredDoc>) -> Vec<TxnOp> {
    match current {
        None => vec![TxnOp::insert(doc.clone())],
        Some(stored) if stored.doc == *doc => Vec::new(),
        Some(stored) => vec![TxnOp::update(doc.clone(), stored.revision)],
    }
}

impl<C: Collection> MetadataStore<C> {
    /// Insert `metadata`, or replace the image id of the record with the same
    /// attributes.
    ///
    /// Conflicts with concurrent writers are retried internally and never
    /// returned. Errors are either [`EngineError::Storage`] or a spent retry
    /// budget.
    pub fn save_metadata(&self, metadata: &Metadata) -> Result<(), EngineError> {
        let key = derive_key(&metadata.attributes);
        let doc = ImageDoc::new(self.config.model_uuid, &key, metadata);
        let policy = &self.config.retry;
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut state = SaveState::ReadCurrent;

        loop {
            state = match state {
                SaveState::ReadCurrent => {
                    if attempt >= policy.attempts() {
                        SaveState::Fatal(EngineError::RetryExhausted { key, attempts: attempt })
                    } else if attempt > 0
                        && policy
                            .deadline()
                            .is_some_and(|limit| started.elapsed() >= limit)
                    {
                        SaveState::Fatal(EngineError::DeadlineExceeded {
                            key,
                            elapsed: started.elapsed(),
                        })
                    } else {
                        attempt += 1;
                        match self.collection.get(&doc.id) {
                            Ok(current) => SaveState::BuildOps(current),
                            Err(e) => SaveState::Fatal(e.into()),
                        }
                    }
                }

                SaveState::BuildOps(current) => {
                    let ops = build_ops(&doc, current);
                    if ops.is_empty() {
                        debug!(target: "imagemeta::save", %key, "image id unchanged, nothing to write");
                        SaveState::Done
                    } else {
                        SaveState::Submit(ops)
                    }
                }

                SaveState::Submit(ops) => match self.collection.run(&ops) {
                    Ok(()) => SaveState::Done,
                    Err(e) if e.is_aborted() => SaveState::Retry,
                    Err(e) => SaveState::Fatal(e.into()),
                },

                SaveState::Retry => {
                    debug!(target: "imagemeta::save", %key, attempt, "write conflict, re-reading");
                    let delay = policy.delay_for(attempt - 1);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    SaveState::ReadCurrent
                }

                SaveState::Done => {
                    debug!(
                        target: "imagemeta::save",
                        %key,
                        model_uuid = %self.config.model_uuid,
                        image_id = %metadata.image_id,
                        attempt,
                        "saved cloud image metadata"
                    );
                    return Ok(());
                }

                SaveState::Fatal(err) => {
                    warn!(target: "imagemeta::save", %key, attempt, error = %err, "save failed");
                    return Err(err);
                }
            };
        }
    }
}
