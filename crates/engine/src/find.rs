use imagemeta_core::{Criteria, Metadata, MetadataAttributes};
use imagemeta_storage::{Collection, Filter};
use tracing::debug;

use crate::MetadataStore;
use crate::error::EngineError;

impl<C: Collection> MetadataStore<C> {
    /// Records whose attributes equal every non-empty field of `criteria`.
    /// Empty fields match anything. Order of results is unspecified.
    ///
    /// Zero matches is [`EngineError::NotFound`], never an empty `Ok`.
    pub fn find_metadata(
        &self,
        criteria: &MetadataAttributes,
    ) -> Result<Vec<Metadata>, EngineError> {
        self.find_matching(Criteria::from_attributes(criteria))
    }

    /// Same as [`Self::find_metadata`] but with an explicit per-field filter,
    /// which can also ask for a literal empty value.
    pub fn find_matching(&self, criteria: Criteria) -> Result<Vec<Metadata>, EngineError> {
        let filter = Filter {
            model_uuid: self.config.model_uuid,
            criteria,
        };
        let docs = self.collection.find(&filter)?;

        debug!(
            target: "imagemeta::find",
            model_uuid = %filter.model_uuid,
            wildcard = filter.criteria.is_wildcard(),
            clauses = filter.criteria.clauses().len(),
            matched = docs.len(),
            "searched cloud image metadata"
        );

        if docs.is_empty() {
            return Err(EngineError::NotFound {
                criteria: filter.criteria,
            });
        }
        Ok(docs.into_iter().map(|s| s.doc.into_metadata()).collect())
    }
}
