//! The polymorphic asset interface
//!
//! Every concrete asset (mesh, texture, material, sub-scene, ...) embeds an
//! [`AssetBase`] and implements [`Asset`]. The asset manager owns assets as
//! `Box<dyn Asset>` and persists them through [`Asset::serialize`].

use std::any::Any;
use std::fmt;

use crate::archive::Archive;
use crate::error::AssetResult;
use crate::id::{AssetId, TypeTag};

/// Lifecycle of a live asset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetState {
    /// Known but not in memory
    #[default]
    Unloaded,
    /// Deserialized, dependencies still loading
    Loading,
    /// Fully loaded with all dependencies
    Loaded,
    /// Uploaded by a downstream consumer (GPU residency)
    Installed,
    /// Loading failed, terminal
    LoadingFailed,
}

impl AssetState {
    /// Check if the asset can be used
    pub fn is_ready(self) -> bool {
        matches!(self, AssetState::Loaded | AssetState::Installed)
    }
}

/// Fields shared by every asset
#[derive(Clone, Debug, Default)]
pub struct AssetBase {
    pub id: AssetId,
    pub state: AssetState,
    pub name: String,
    dependencies: Vec<AssetId>,
}

impl AssetBase {
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            id,
            state: AssetState::Unloaded,
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Assets that must be loaded before this one is usable
    pub fn dependencies(&self) -> &[AssetId] {
        &self.dependencies
    }

    /// Record a dependency. Invalid ids and duplicates are ignored.
    pub fn add_dependency(&mut self, id: AssetId) -> bool {
        if !id.is_valid() || self.dependencies.contains(&id) {
            return false;
        }
        self.dependencies.push(id);
        true
    }

    /// Persist `id`, `name` and `dependencies`, in that order
    pub fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()> {
        ar.value(&mut self.id)?;
        ar.value(&mut self.name)?;
        ar.value(&mut self.dependencies)?;

        if !ar.is_writing() {
            // Keep the set invariant even for hand-edited files
            let mut seen = Vec::with_capacity(self.dependencies.len());
            self.dependencies.retain(|id| {
                if seen.contains(id) {
                    false
                } else {
                    seen.push(id.clone());
                    true
                }
            });
        }
        Ok(())
    }
}

/// Load state is runtime-only and does not take part in equality
impl PartialEq for AssetBase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.dependencies == other.dependencies
    }
}

/// Capability set of a concrete asset type
pub trait Asset: Any + Send + Sync + fmt::Debug {
    /// Magic code of the concrete type
    fn type_tag(&self) -> TypeTag;

    /// Human readable type name
    fn type_name(&self) -> &'static str;

    fn base(&self) -> &AssetBase;

    fn base_mut(&mut self) -> &mut AssetBase;

    /// Persist the type-specific fields (the base is handled by the caller)
    fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Asset {
    pub fn id(&self) -> &AssetId {
        &self.base().id
    }

    pub fn state(&self) -> AssetState {
        self.base().state
    }

    pub fn dependencies(&self) -> &[AssetId] {
        self.base().dependencies()
    }

    pub fn downcast_ref<T: Asset>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Asset>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Serialize a whole asset: type tag, base fields, then type fields
pub fn encode_asset(asset: &mut dyn Asset) -> AssetResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut ar = Archive::writer(&mut out);
    let mut tag = asset.type_tag().to_bytes();
    ar.tag(&mut tag)?;
    asset.base_mut().serialize(&mut ar)?;
    asset.serialize(&mut ar)?;
    Ok(out)
}

/// Implements the boilerplate half of [`Asset`] for a type with a `base` field
#[macro_export]
macro_rules! impl_asset_common {
    ($ty:ty, $name:literal) => {
        fn type_tag(&self) -> $crate::TypeTag {
            <$ty as $crate::AssetType>::TYPE_TAG
        }

        fn type_name(&self) -> &'static str {
            $name
        }

        fn base(&self) -> &$crate::AssetBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::AssetBase {
            &mut self.base
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::AssetType;

    #[derive(Debug)]
    struct Dummy;
    impl AssetType for Dummy {
        const TYPE_TAG: TypeTag = TypeTag::new(*b"DUMY");
    }

    #[test]
    fn test_dependencies_are_a_set() {
        let mut base = AssetBase::new(AssetId::create::<Dummy>("a"), "a");
        let dep = AssetId::create::<Dummy>("b");

        assert!(base.add_dependency(dep.clone()));
        assert!(!base.add_dependency(dep));
        assert!(!base.add_dependency(AssetId::invalid()));
        assert_eq!(base.dependencies().len(), 1);
    }

    #[test]
    fn test_state_is_not_part_of_equality() {
        let mut a = AssetBase::new(AssetId::create::<Dummy>("a"), "a");
        let b = a.clone();
        a.state = AssetState::Loaded;
        assert_eq!(a, b);
        assert!(a.state.is_ready());
        assert!(!b.state.is_ready());
    }
}
