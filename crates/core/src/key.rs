use std::fmt;

use crate::attributes::MetadataAttributes;

/// Deterministic address of an attribute tuple's storage slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyToken(blake3::Hash);

impl KeyToken {
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Debug for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyToken({})", &self.0.to_hex()[..8])
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// Hash the seven fields in canonical order. Each value is length-prefixed so
/// that no two distinct tuples share an encoding.
pub fn derive_key(attrs: &MetadataAttributes) -> KeyToken {
    let mut hasher = blake3::Hasher::new();
    for (_, value) in attrs.iter() {
        hasher.update(&(value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    KeyToken(hasher.finalize())
}
