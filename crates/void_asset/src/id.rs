//! Asset identity
//!
//! An [`AssetId`] is a stable, content-free key: the 4-character type tag of
//! the asset type that created it plus a hash of a human readable name.
//! Two ids built independently from the same type and name are the same asset.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use void_core::hash_str;

/// Four-character ASCII magic identifying a concrete asset type
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(pub u32);

impl TypeTag {
    /// Build a tag from its four ASCII characters
    pub const fn new(code: [u8; 4]) -> Self {
        TypeTag(u32::from_le_bytes(code))
    }

    /// The four characters as stored at the head of a compiled asset file
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Parse the leading tag of a compiled asset
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        TypeTag(u32::from_le_bytes(bytes))
    }

    /// Lower-case extension used for compiled files of this type
    pub fn extension(self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self)
    }
}

/// Implemented by every concrete asset type
pub trait AssetType {
    /// Magic code written at the head of compiled files of this type
    const TYPE_TAG: TypeTag;
}

/// Stable identity of an asset.
///
/// Equality and hashing only look at `(type_id, name_hash)`; `name` is kept
/// for diagnostics.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AssetId {
    type_id: u64,
    name: String,
    name_hash: u64,
}

impl AssetId {
    /// Create an id for an asset of type `T` named `name`
    pub fn create<T: AssetType>(name: impl Into<String>) -> Self {
        Self::with_tag(T::TYPE_TAG, name)
    }

    /// Create an id from a runtime type tag
    pub fn with_tag(tag: TypeTag, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_id: tag.0 as u64,
            name_hash: hash_str(&name),
            name,
        }
    }

    /// The "no asset" id
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Check that both identity fields are set
    pub fn is_valid(&self) -> bool {
        self.type_id != 0 && self.name_hash != 0
    }

    pub fn type_id(&self) -> u64 {
        self.type_id
    }

    /// Type tag of the creating asset type
    pub fn type_tag(&self) -> TypeTag {
        TypeTag(self.type_id as u32)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    /// File name of the compiled record, e.g. `3fa2...e1.mesh`
    pub fn file_name(&self) -> String {
        format!("{:016x}.{}", self.name_hash, self.type_tag().extension())
    }
}

/// Combine both identity fields into a single map key
pub fn hash_value(id: &AssetId) -> u64 {
    id.type_id
        .rotate_left(32)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ id.name_hash
}

impl PartialEq for AssetId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name_hash == other.name_hash
    }
}

impl Eq for AssetId {}

impl Hash for AssetId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_value(self));
    }
}

impl PartialOrd for AssetId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssetId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.type_id, self.name_hash).cmp(&(other.type_id, other.name_hash))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "<invalid>");
        }
        if self.name.is_empty() {
            write!(f, "{}:{:016x}", self.type_tag(), self.name_hash)
        } else {
            write!(f, "{}:{}", self.type_tag(), self.name)
        }
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self)
    }
}
