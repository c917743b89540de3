//! Importers - pluggable source format decoders
//!
//! Importers are registered once, in priority order, when the asset manager
//! is built. For every source file the registry probes `can_import` in
//! registration order and the first match decodes the file into one or more
//! assets through an [`ImportContext`].
//!
//! Most importers implement the typed [`FormatImporter`] trait; the blanket
//! impl erases it into the object-safe [`Importer`] stored by the registry.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::asset::Asset;
use crate::error::{AssetError, AssetResult};
use crate::id::{AssetId, AssetType};

/// Maximum number of importers a registry accepts
pub const MAX_IMPORTERS: usize = 16;

/// Embedded resources nested deeper than this are rejected
const MAX_EMBED_DEPTH: usize = 8;

/// Opaque importer-specific settings stored in a resource meta file
pub trait ImporterData: Send + Sync + fmt::Debug + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T> ImporterData for T
where
    T: Serialize + Send + Sync + fmt::Debug + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Object-safe importer interface
pub trait Importer: Send + Sync + 'static {
    /// Stable name recorded in meta files
    fn name(&self) -> &'static str;

    /// Cheap signature test. Must not assume the file is otherwise valid.
    fn can_import(&self, bytes: &[u8]) -> bool;

    /// Decode `bytes` into assets, returning the id of the main asset
    fn import(
        &self,
        ctx: &mut ImportContext<'_>,
        bytes: &[u8],
        settings: &dyn ImporterData,
    ) -> AssetResult<AssetId>;

    /// Settings used for a resource seen for the first time
    fn create_default_importer_data(&self) -> Box<dyn ImporterData>;

    /// Parse settings from the `settings` object of a meta file
    fn read_data_json(&self, value: &serde_json::Value) -> AssetResult<Box<dyn ImporterData>>;

    /// Encode settings for the `settings` object of a meta file
    fn write_data_json(&self, data: &dyn ImporterData) -> AssetResult<serde_json::Value>;
}

/// Typed importer with serde-backed settings
pub trait FormatImporter: Send + Sync + 'static {
    type Settings: Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static;

    const NAME: &'static str;

    fn can_import(&self, bytes: &[u8]) -> bool;

    fn import(
        &self,
        ctx: &mut ImportContext<'_>,
        bytes: &[u8],
        settings: &Self::Settings,
    ) -> AssetResult<AssetId>;
}

fn settings_of<T: FormatImporter>(data: &dyn ImporterData) -> AssetResult<&T::Settings> {
    data.as_any()
        .downcast_ref::<T::Settings>()
        .ok_or_else(|| AssetError::InvalidSettings {
            importer: T::NAME,
            message: format!("expected {}, got {:?}", std::any::type_name::<T::Settings>(), data),
        })
}

impl<T: FormatImporter> Importer for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn can_import(&self, bytes: &[u8]) -> bool {
        FormatImporter::can_import(self, bytes)
    }

    fn import(
        &self,
        ctx: &mut ImportContext<'_>,
        bytes: &[u8],
        settings: &dyn ImporterData,
    ) -> AssetResult<AssetId> {
        let settings = settings_of::<T>(settings)?;
        FormatImporter::import(self, ctx, bytes, settings)
    }

    fn create_default_importer_data(&self) -> Box<dyn ImporterData> {
        Box::new(T::Settings::default())
    }

    fn read_data_json(&self, value: &serde_json::Value) -> AssetResult<Box<dyn ImporterData>> {
        if value.is_null() {
            return Ok(self.create_default_importer_data());
        }
        let settings: T::Settings =
            serde_json::from_value(value.clone()).map_err(|e| AssetError::InvalidSettings {
                importer: T::NAME,
                message: e.to_string(),
            })?;
        Ok(Box::new(settings))
    }

    fn write_data_json(&self, data: &dyn ImporterData) -> AssetResult<serde_json::Value> {
        let settings = settings_of::<T>(data)?;
        serde_json::to_value(settings).map_err(AssetError::Json)
    }
}

/// Ordered, bounded list of importers. Read-only once the manager is built.
#[derive(Default)]
pub struct ImporterRegistry {
    importers: Vec<Box<dyn Importer>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an importer. Earlier registrations win ties in [`find_importer`](Self::find_importer).
    pub fn register<I: Importer>(&mut self, importer: I) -> AssetResult<usize> {
        self.register_boxed(Box::new(importer))
    }

    pub fn register_boxed(&mut self, importer: Box<dyn Importer>) -> AssetResult<usize> {
        if self.importers.len() >= MAX_IMPORTERS {
            return Err(AssetError::RegistryFull(MAX_IMPORTERS));
        }
        if self.index_of(importer.name()).is_some() {
            log::warn!("Importer '{}' registered twice; the first one wins", importer.name());
        }
        self.importers.push(importer);
        Ok(self.importers.len() - 1)
    }

    /// Index of the first importer, in registration order, that accepts `bytes`
    pub fn find_importer(&self, bytes: &[u8]) -> Option<usize> {
        self.importers.iter().position(|i| i.can_import(bytes))
    }

    /// Index of the importer with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.importers.iter().position(|i| i.name() == name)
    }

    pub fn get(&self, index: usize) -> Option<&dyn Importer> {
        self.importers.get(index).map(|i| &**i)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.importers.iter().map(|i| i.name())
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }
}

/// The manager's facade handed to an importer for the duration of one import.
///
/// Assets added here are staged; the manager persists and registers them only
/// when the top-level import returns successfully.
pub struct ImportContext<'a> {
    registry: &'a ImporterRegistry,
    resource_uuid: Uuid,
    resource_path: &'a Path,
    scope: Vec<String>,
    staged: Vec<Box<dyn Asset>>,
}

impl<'a> ImportContext<'a> {
    pub fn new(registry: &'a ImporterRegistry, resource_uuid: Uuid, resource_path: &'a Path) -> Self {
        Self {
            registry,
            resource_uuid,
            resource_path,
            scope: Vec::new(),
            staged: Vec::new(),
        }
    }

    pub fn resource_uuid(&self) -> Uuid {
        self.resource_uuid
    }

    pub fn resource_path(&self) -> &Path {
        self.resource_path
    }

    /// Directory used to resolve relative references inside the resource
    pub fn base_dir(&self) -> &Path {
        self.resource_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Display name of the resource (file name)
    pub fn resource_name(&self) -> String {
        self.resource_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Stable id for a sub-asset. Derived from the resource uuid, so it
    /// survives re-imports and renames of the source file.
    pub fn sub_asset_id<T: AssetType>(&self, local_name: &str) -> AssetId {
        let mut name = self.resource_uuid.to_string();
        for part in &self.scope {
            name.push('/');
            name.push_str(part);
        }
        name.push('/');
        name.push_str(local_name);
        AssetId::create::<T>(name)
    }

    /// Stage an asset created by the importer
    pub fn add_asset<T: Asset>(&mut self, asset: T) -> AssetId {
        self.add_boxed(Box::new(asset))
    }

    pub fn add_boxed(&mut self, asset: Box<dyn Asset>) -> AssetId {
        let id = asset.base().id.clone();
        if let Some(existing) = self.staged.iter_mut().find(|a| a.base().id == id) {
            log::warn!("Importer produced {} twice, keeping the last one", id);
            *existing = asset;
        } else {
            self.staged.push(asset);
        }
        id
    }

    /// Look up an asset staged earlier in this import
    pub fn staged_asset(&self, id: &AssetId) -> Option<&dyn Asset> {
        self.staged.iter().find(|a| a.base().id == *id).map(|a| &**a)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Import a sub-resource embedded in the current one (e.g. an image
    /// inside a binary glTF) with its importer's default settings.
    pub fn import_embedded(&mut self, name: &str, bytes: &[u8]) -> AssetResult<AssetId> {
        if self.scope.len() >= MAX_EMBED_DEPTH {
            return Err(AssetError::import("embedded", format!("'{}' nested too deeply", name)));
        }

        let registry = self.registry;
        let index = registry
            .find_importer(bytes)
            .ok_or_else(|| AssetError::NoImporterFound {
                path: self.embedded_path(name),
            })?;
        let Some(importer) = registry.get(index) else {
            return Err(AssetError::NoImporterFound {
                path: self.embedded_path(name),
            });
        };

        log::debug!("Importing embedded '{}' with {}", name, importer.name());
        let settings = importer.create_default_importer_data();

        self.scope.push(name.to_string());
        let result = importer.import(self, bytes, &*settings);
        self.scope.pop();
        result
    }

    fn embedded_path(&self, name: &str) -> PathBuf {
        let mut path = self.resource_path.as_os_str().to_owned();
        path.push("#");
        path.push(name);
        PathBuf::from(path)
    }

    /// Hand the staged assets over to the manager
    pub fn into_assets(self) -> Vec<Box<dyn Asset>> {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Texture;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct PrefixSettings {
        label: String,
    }

    struct PrefixImporter {
        prefix: &'static [u8],
        name: &'static str,
    }

    struct Named<const N: usize>(PrefixImporter);

    impl<const N: usize> FormatImporter for Named<N> {
        type Settings = PrefixSettings;
        const NAME: &'static str = if N == 0 { "first" } else { "second" };

        fn can_import(&self, bytes: &[u8]) -> bool {
            bytes.starts_with(self.0.prefix)
        }

        fn import(&self, ctx: &mut ImportContext<'_>, _bytes: &[u8], settings: &PrefixSettings) -> AssetResult<AssetId> {
            let id = ctx.sub_asset_id::<Texture>(self.0.name);
            Ok(ctx.add_asset(Texture::new(id, settings.label.clone())))
        }
    }

    fn registry() -> ImporterRegistry {
        let mut registry = ImporterRegistry::new();
        registry
            .register(Named::<0>(PrefixImporter { prefix: b"AB", name: "a" }))
            .unwrap();
        registry
            .register(Named::<1>(PrefixImporter { prefix: b"A", name: "b" }))
            .unwrap();
        registry
    }

    #[test]
    fn test_first_registered_match_wins() {
        let registry = registry();
        assert_eq!(registry.find_importer(b"ABC"), Some(0));
        assert_eq!(registry.find_importer(b"AXY"), Some(1));
        assert_eq!(registry.find_importer(&[0u8; 16]), None);
        // Stable across repeated probes
        for _ in 0..10 {
            assert_eq!(registry.find_importer(b"AB"), Some(0));
        }
    }

    #[test]
    fn test_registry_is_bounded() {
        let mut registry = ImporterRegistry::new();
        for _ in 0..MAX_IMPORTERS {
            registry
                .register(Named::<0>(PrefixImporter { prefix: b"x", name: "x" }))
                .unwrap();
        }
        let err = registry
            .register(Named::<1>(PrefixImporter { prefix: b"y", name: "y" }))
            .unwrap_err();
        assert!(matches!(err, AssetError::RegistryFull(MAX_IMPORTERS)));
    }

    #[test]
    fn test_settings_json_roundtrip() {
        let registry = registry();
        let importer = registry.get(0).unwrap();

        let value = serde_json::json!({ "label": "hero" });
        let data = importer.read_data_json(&value).unwrap();
        assert_eq!(importer.write_data_json(&*data).unwrap(), value);

        let defaults = importer.read_data_json(&serde_json::Value::Null).unwrap();
        assert_eq!(
            defaults.as_any().downcast_ref::<PrefixSettings>(),
            Some(&PrefixSettings::default())
        );
    }

    #[test]
    fn test_wrong_settings_type_is_rejected() {
        let registry = registry();
        let importer = registry.get(0).unwrap();
        let err = importer.write_data_json(&42u32).unwrap_err();
        assert!(matches!(err, AssetError::InvalidSettings { importer: "first", .. }));
    }

    #[test]
    fn test_embedded_assets_are_scoped_and_staged() {
        let registry = registry();
        let uuid = Uuid::new_v4();
        let path = PathBuf::from("assets/crate.glb");
        let mut ctx = ImportContext::new(&registry, uuid, &path);

        let outer = ctx.import_embedded("image0", b"ABxx").unwrap();
        let plain = ctx.sub_asset_id::<Texture>("a");
        assert_ne!(outer, plain);
        assert_eq!(outer.name(), format!("{}/image0/a", uuid));
        assert!(ctx.staged_asset(&outer).is_some());

        let err = ctx.import_embedded("zeros", &[0u8; 4]).unwrap_err();
        assert!(matches!(err, AssetError::NoImporterFound { .. }));
        assert_eq!(ctx.into_assets().len(), 1);
    }
}
