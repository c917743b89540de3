//! Asset manager configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `VOID_ASSET_RESOURCES`, `VOID_ASSET_COMPILED`,
//!    `VOID_ASSET_WORKERS`
//! 2. Config file passed to [`AssetManagerConfig::load`]
//! 3. Built-in defaults
//!
//! # Example Config File
//!
//! ```toml
//! resource_dir = "assets"
//! compiled_dir = "assets/.compiled"
//! meta_extension = "meta"
//! hash_workers = 0        # 0 = one per core
//! hot_reload = true
//! watch_debounce_ms = 100
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};
use crate::meta::META_EXTENSION;

/// Where sources live, where compiled assets go, and how the scan runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Root of the source tree
    pub resource_dir: PathBuf,
    /// Flat directory holding compiled assets
    pub compiled_dir: PathBuf,
    /// Side-car extension, without the dot
    pub meta_extension: String,
    /// Hashing threads, 0 for one per core
    pub hash_workers: usize,
    /// Watch `resource_dir` for changes
    pub hot_reload: bool,
    /// Events for the same path closer together than this are merged
    pub watch_debounce_ms: u64,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("assets"),
            compiled_dir: PathBuf::from("assets/.compiled"),
            meta_extension: META_EXTENSION.to_string(),
            hash_workers: 0,
            hot_reload: false,
            watch_debounce_ms: 100,
        }
    }
}

impl AssetManagerConfig {
    /// Config rooted at `resource_dir`, compiling into `<resource_dir>/.compiled`
    pub fn with_root(resource_dir: impl Into<PathBuf>) -> Self {
        let resource_dir = resource_dir.into();
        Self {
            compiled_dir: resource_dir.join(".compiled"),
            resource_dir,
            ..Default::default()
        }
    }

    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> AssetResult<Self> {
        let mut config = match path {
            Some(path) => {
                let config = Self::load_from_file(path)?;
                log::info!("Loaded asset config from {}", path.display());
                config
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn load_from_file(path: &Path) -> AssetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
        Self::from_toml(&content).map_err(|message| AssetError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Override fields from `VOID_ASSET_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("VOID_ASSET_RESOURCES") {
            if !dir.is_empty() {
                self.resource_dir = PathBuf::from(dir);
                log::info!("Resource dir from env: {}", self.resource_dir.display());
            }
        }

        if let Ok(dir) = std::env::var("VOID_ASSET_COMPILED") {
            if !dir.is_empty() {
                self.compiled_dir = PathBuf::from(dir);
                log::info!("Compiled dir from env: {}", self.compiled_dir.display());
            }
        }

        if let Ok(workers) = std::env::var("VOID_ASSET_WORKERS") {
            match workers.parse() {
                Ok(n) => self.hash_workers = n,
                Err(_) => log::warn!("Ignoring VOID_ASSET_WORKERS={}", workers),
            }
        }
    }
}
