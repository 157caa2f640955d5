use crate::attributes::{AttributeField, MetadataAttributes};

/// Per-field match state of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldMatch {
    #[default]
    Any,
    Exactly(String),
}

impl FieldMatch {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            FieldMatch::Any => true,
            FieldMatch::Exactly(want) => want == value,
        }
    }
}

/// Equality filter over the seven attribute fields.
///
/// Built from a caller's partial [`MetadataAttributes`], where an empty field
/// means "any value". Internally each field is an explicit [`FieldMatch`], so
/// an empty-string literal can still be expressed with [`Criteria::with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    fields: [FieldMatch; 7],
}

impl Criteria {
    /// Matches every record.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_attributes(attrs: &MetadataAttributes) -> Self {
        let mut criteria = Self::any();
        for (field, value) in attrs.iter() {
            if !value.is_empty() {
                criteria = criteria.with(field, value);
            }
        }
        criteria
    }

    pub fn with(mut self, field: AttributeField, value: impl Into<String>) -> Self {
        self.fields[index(field)] = FieldMatch::Exactly(value.into());
        self
    }

    pub fn field(&self, field: AttributeField) -> &FieldMatch {
        &self.fields[index(field)]
    }

    pub fn is_wildcard(&self) -> bool {
        self.fields.iter().all(|m| *m == FieldMatch::Any)
    }

    /// Constrained fields in canonical order.
    pub fn clauses(&self) -> Vec<(AttributeField, &str)> {
        AttributeField::ALL
            .iter()
            .filter_map(|f| match self.field(*f) {
                FieldMatch::Any => None,
                FieldMatch::Exactly(v) => Some((*f, v.as_str())),
            })
            .collect()
    }

    pub fn matches(&self, attrs: &MetadataAttributes) -> bool {
        AttributeField::ALL
            .iter()
            .all(|f| self.field(*f).accepts(attrs.get(*f)))
    }
}

fn index(field: AttributeField) -> usize {
    match field {
        AttributeField::Stream => 0,
        AttributeField::Region => 1,
        AttributeField::Series => 2,
        AttributeField::Arch => 3,
        AttributeField::VirtualType => 4,
        AttributeField::RootStorageType => 5,
        AttributeField::RootStorageSize => 6,
    }
}
