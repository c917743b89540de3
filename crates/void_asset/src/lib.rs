//! # void_asset - Incremental Asset Pipeline
//!
//! Turns source files (scenes, images, meshes) into typed, dependency-linked
//! binary assets and re-imports only what changed:
//! - Content-hash change detection with parallel hashing
//! - Pluggable importers (first matching signature wins)
//! - Stable asset ids derived from per-resource uuids in `.meta` side-cars
//! - Depth-first dependency loading from the compiled store
//! - Optional hot-reload through a file watcher
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use void_asset::prelude::*;
//!
//! let mut importers = ImporterRegistry::new();
//! importers.register(MyPngImporter)?;
//!
//! let mut manager = AssetManager::new(
//!     AssetManagerConfig::with_root("assets"),
//!     AssetConstructors::with_builtin(),
//!     Arc::new(importers),
//! )?;
//!
//! manager.load_all_metas()?;
//! let report = manager.refresh()?;
//!
//! let id = manager.load_resource("assets/wall.png".as_ref())?;
//! let texture: &Texture = manager.get_asset_as(&id)?;
//! ```

pub mod archive;
pub mod asset;
pub mod config;
pub mod constructors;
pub mod database;
pub mod error;
pub mod id;
pub mod importer;
pub mod jobs;
pub mod manager;
pub mod meta;
pub mod types;
pub mod watcher;

pub use archive::Archive;
pub use asset::{encode_asset, Asset, AssetBase, AssetState};
pub use config::AssetManagerConfig;
pub use constructors::AssetConstructors;
pub use database::{AssetDatabase, AssetRecord, Resource, ScanOptions, ScanStats};
pub use error::{AssetError, AssetResult, DecoderError};
pub use id::{hash_value, AssetId, AssetType, TypeTag};
pub use importer::{
    FormatImporter, ImportContext, Importer, ImporterData, ImporterRegistry, MAX_IMPORTERS,
};
pub use jobs::JobPool;
pub use manager::{AssetManager, ImportReport};
pub use meta::{meta_path_for, AssetMeta, ResourceMeta};
pub use types::{
    Material, Mesh, SubMesh, SubScene, Texture, TextureExtension, TextureFormat, UvTransform,
};
pub use watcher::{FileChange, FileChangeKind, FileWatcher};

pub use void_core::{FileHash, Handle, Hash128};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::asset::{Asset, AssetState};
    pub use crate::config::AssetManagerConfig;
    pub use crate::constructors::AssetConstructors;
    pub use crate::error::{AssetError, AssetResult};
    pub use crate::id::{AssetId, AssetType, TypeTag};
    pub use crate::importer::{FormatImporter, ImportContext, Importer, ImporterRegistry};
    pub use crate::manager::{AssetManager, ImportReport};
    pub use crate::types::{Material, Mesh, SubScene, Texture, TextureFormat};
}
