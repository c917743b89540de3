//! Asset constructors - type tag to concrete type registry
//!
//! Deserialization reads the leading type tag of a compiled file and asks this
//! table for an empty instance of the matching type, which then fills itself
//! from the archive. The registry is an ordinary value built at start-up and
//! handed to the [`AssetManager`](crate::AssetManager).

use std::collections::BTreeMap;

use crate::archive::Archive;
use crate::asset::Asset;
use crate::error::{AssetError, AssetResult};
use crate::id::{AssetType, TypeTag};
use crate::types::{Material, Mesh, SubScene, Texture};

type Constructor = fn() -> Box<dyn Asset>;

fn construct<T: Asset + Default>() -> Box<dyn Asset> {
    Box::new(T::default())
}

/// Registry of zero-argument constructors keyed by type tag
#[derive(Clone, Default)]
pub struct AssetConstructors {
    table: BTreeMap<TypeTag, (&'static str, Constructor)>,
}

impl AssetConstructors {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in asset type
    pub fn with_builtin() -> Self {
        let mut constructors = Self::new();
        constructors
            .register::<Mesh>()
            .register::<Material>()
            .register::<Texture>()
            .register::<SubScene>();
        constructors
    }

    /// Register a concrete type. Re-registering a tag replaces the constructor.
    pub fn register<T: Asset + AssetType + Default>(&mut self) -> &mut Self {
        let name = std::any::type_name::<T>();
        let ctor: Constructor = construct::<T>;
        if let Some((previous, _)) = self.table.insert(T::TYPE_TAG, (name, ctor)) {
            if previous != name {
                log::warn!("Type tag '{}' re-registered: {} replaces {}", T::TYPE_TAG, name, previous);
            }
        }
        self
    }

    /// Create an empty instance for `tag`, or `None` if the tag is unknown
    pub fn create(&self, tag: TypeTag) -> Option<Box<dyn Asset>> {
        self.table.get(&tag).map(|(_, ctor)| ctor())
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.table.contains_key(&tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.table.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Rebuild an asset from its compiled bytes
    pub fn decode(&self, data: &[u8]) -> AssetResult<Box<dyn Asset>> {
        let mut ar = Archive::reader(data);
        let mut tag = [0u8; 4];
        ar.tag(&mut tag)?;
        let tag = TypeTag::from_bytes(tag);

        let mut asset = self.create(tag).ok_or(AssetError::NoLoaderFound(tag))?;
        asset.base_mut().serialize(&mut ar)?;
        asset.serialize(&mut ar)?;

        if ar.remaining() != 0 {
            log::warn!(
                "{} bytes left over after decoding {}",
                ar.remaining(),
                asset.base().id
            );
        }
        Ok(asset)
    }
}
