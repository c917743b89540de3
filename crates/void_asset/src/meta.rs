//! Meta files - JSON side-cars persisting resource identity and settings
//!
//! A meta file lives next to its source (`textures/wall.png.meta`) and is
//! rewritten after every successful import. Its uuid is what keeps sub-asset
//! ids stable when the source is edited or moved.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use void_core::FileHash;

use crate::error::{AssetError, AssetResult};
use crate::id::AssetId;

/// Default side-car extension
pub const META_EXTENSION: &str = "meta";

/// One asset produced by a resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub id: AssetId,
    pub display_name: String,
    /// Hash of the compiled bytes
    #[serde(default)]
    pub asset_hash: FileHash,
}

/// Contents of a `.meta` file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
    /// Name of the importer that produced the assets
    #[serde(default)]
    pub importer: String,
    /// Importer specific settings, interpreted by the importer
    #[serde(default)]
    pub settings: serde_json::Value,
    /// Source hash at the last successful import
    #[serde(default)]
    pub content_hash: FileHash,
    #[serde(default)]
    pub main_asset: Option<AssetId>,
    #[serde(default)]
    pub assets: Vec<AssetMeta>,
}

impl ResourceMeta {
    pub fn new(uuid: Uuid, display_name: impl Into<String>, importer: impl Into<String>) -> Self {
        Self {
            uuid: uuid.to_string(),
            display_name: display_name.into(),
            importer: importer.into(),
            ..Default::default()
        }
    }

    /// Parsed resource uuid
    pub fn uuid(&self) -> AssetResult<Uuid> {
        Uuid::parse_str(&self.uuid).map_err(|source| AssetError::InvalidUuid {
            value: self.uuid.clone(),
            source,
        })
    }

    pub fn read(path: &Path) -> AssetResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
        let meta: ResourceMeta =
            serde_json::from_str(&text).map_err(|source| AssetError::ParsingError {
                path: path.to_path_buf(),
                source,
            })?;
        // Reject bad ids early rather than on first import
        meta.uuid()?;
        Ok(meta)
    }

    pub fn write(&self, path: &Path) -> AssetResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(AssetError::Json)?;
        fs::write(path, text).map_err(|e| AssetError::io(path, e))
    }
}

/// `wall.png` -> `wall.png.meta`
pub fn meta_path_for(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Check if `path` is a side-car rather than a source file
pub fn is_meta_file(path: &Path, extension: &str) -> bool {
    path.extension().map_or(false, |e| e == extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Texture;

    #[test]
    fn test_meta_path() {
        let path = meta_path_for(Path::new("textures/wall.png"), META_EXTENSION);
        assert_eq!(path, PathBuf::from("textures/wall.png.meta"));
        assert!(is_meta_file(&path, META_EXTENSION));
        assert!(!is_meta_file(Path::new("textures/wall.png"), META_EXTENSION));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png.meta");

        let uuid = Uuid::new_v4();
        let texture = AssetId::create::<Texture>(format!("{}/texture", uuid));
        let mut meta = ResourceMeta::new(uuid, "wall.png", "png");
        meta.settings = serde_json::json!({ "srgb": true });
        meta.content_hash = FileHash(7);
        meta.main_asset = Some(texture.clone());
        meta.assets.push(AssetMeta {
            id: texture,
            display_name: "wall".into(),
            asset_hash: FileHash(9),
        });
        meta.write(&path).unwrap();

        let read = ResourceMeta::read(&path).unwrap();
        assert_eq!(read, meta);
        assert_eq!(read.uuid().unwrap(), uuid);
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.meta");
        fs::write(&path, "{ not json").unwrap();

        let err = ResourceMeta::read(&path).unwrap_err();
        assert!(matches!(err, AssetError::ParsingError { .. }));
    }

    #[test]
    fn test_invalid_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.meta");
        fs::write(&path, r#"{ "uuid": "not-a-uuid", "importer": "png" }"#).unwrap();

        let err = ResourceMeta::read(&path).unwrap_err();
        assert!(matches!(err, AssetError::InvalidUuid { ref value, .. } if value == "not-a-uuid"));
    }
}
