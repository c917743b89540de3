//! # void_importers - Source format importers
//!
//! Concrete [`Importer`](void_asset::Importer)s for the asset pipeline:
//! - **glTF / GLB** scenes with PBR materials and embedded images
//! - **KTX2** GPU textures (uncompressed containers)
//! - **PNG** images, decoded to RGBA8 with optional mip chain
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use void_asset::{AssetConstructors, AssetManager, AssetManagerConfig};
//!
//! let mut manager = AssetManager::new(
//!     AssetManagerConfig::with_root("assets"),
//!     AssetConstructors::with_builtin(),
//!     Arc::new(void_importers::default_importers()?),
//! )?;
//! manager.refresh()?;
//! ```

pub mod error;
pub mod gltf;
pub mod ktx2;
pub mod png;

pub use error::DecodeError;
pub use gltf::{GltfImporter, GltfSettings};
pub use ktx2::{Ktx2Importer, Ktx2Settings};
pub use png::{PngImporter, PngSettings};

use void_asset::{AssetResult, ImporterRegistry};

/// Registry with every built-in importer. Order decides ties: glTF, then
/// KTX2, then PNG.
pub fn default_importers() -> AssetResult<ImporterRegistry> {
    let mut registry = ImporterRegistry::new();
    registry.register(GltfImporter)?;
    registry.register(Ktx2Importer)?;
    registry.register(PngImporter)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let registry = default_importers().unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["gltf", "ktx2", "png"]);
    }
}
