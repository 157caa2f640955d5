use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven-field descriptor of where a cloud image applies.
///
/// In a save every field is a literal value, including the empty string.
/// In a query an empty field is a wildcard; see [`crate::criteria::Criteria`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataAttributes {
    pub stream: String,
    pub region: String,
    pub series: String,
    pub arch: String,
    pub virtual_type: String,
    pub root_storage_type: String,
    pub root_storage_size: String,
}

impl MetadataAttributes {
    pub fn get(&self, field: AttributeField) -> &str {
        match field {
            AttributeField::Stream => &self.stream,
            AttributeField::Region => &self.region,
            AttributeField::Series => &self.series,
            AttributeField::Arch => &self.arch,
            AttributeField::VirtualType => &self.virtual_type,
            AttributeField::RootStorageType => &self.root_storage_type,
            AttributeField::RootStorageSize => &self.root_storage_size,
        }
    }

    pub fn set(&mut self, field: AttributeField, value: impl Into<String>) {
        let slot = match field {
            AttributeField::Stream => &mut self.stream,
            AttributeField::Region => &mut self.region,
            AttributeField::Series => &mut self.series,
            AttributeField::Arch => &mut self.arch,
            AttributeField::VirtualType => &mut self.virtual_type,
            AttributeField::RootStorageType => &mut self.root_storage_type,
            AttributeField::RootStorageSize => &mut self.root_storage_size,
        };
        *slot = value.into();
    }

    /// Builder-style setter, mostly for tests and fixtures.
    pub fn with(mut self, field: AttributeField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Fields in canonical order, paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeField, &str)> {
        AttributeField::ALL.iter().map(move |f| (*f, self.get(*f)))
    }
}

/// One cached image: the attribute tuple it applies to and the provider's image id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub attributes: MetadataAttributes,
    pub image_id: String,
}

impl Metadata {
    pub fn new(attributes: MetadataAttributes, image_id: impl Into<String>) -> Self {
        Self {
            attributes,
            image_id: image_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeField {
    Stream,
    Region,
    Series,
    Arch,
    VirtualType,
    RootStorageType,
    RootStorageSize,
}

impl AttributeField {
    /// Canonical order. The key codec and filter builder both depend on it.
    pub const ALL: [AttributeField; 7] = [
        AttributeField::Stream,
        AttributeField::Region,
        AttributeField::Series,
        AttributeField::Arch,
        AttributeField::VirtualType,
        AttributeField::RootStorageType,
        AttributeField::RootStorageSize,
    ];

    /// Column / document field name used by the backing stores.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Region => "region",
            Self::Series => "series",
            Self::Arch => "arch",
            Self::VirtualType => "virtual_type",
            Self::RootStorageType => "root_storage_type",
            Self::RootStorageSize => "root_storage_size",
        }
    }
}

impl fmt::Display for AttributeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
