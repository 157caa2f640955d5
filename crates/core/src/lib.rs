pub mod attributes;
pub mod criteria;
pub mod error;
pub mod ids;
pub mod key;

pub use attributes::{AttributeField, Metadata, MetadataAttributes};
pub use criteria::{Criteria, FieldMatch};
pub use error::CoreError;
pub use ids::ModelUuid;
pub use key::{KeyToken, derive_key};
