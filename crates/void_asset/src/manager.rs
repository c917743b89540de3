//! Asset manager - import orchestration and the live asset map
//!
//! The manager is the only writer of the [`AssetDatabase`] and the only owner
//! of live assets. Everything runs on the caller's thread except file hashing
//! during scans, which fans out on the [`JobPool`].
//!
//! Import flow for one resource:
//!
//! 1. read or create the `.meta` side-car (uuid, importer, settings)
//! 2. run the importer against the source bytes, staging every asset
//! 3. encode and write each staged asset to the compiled store
//! 4. register the assets, advance the content hash, rewrite the meta file
//!
//! Nothing from steps 3 and 4 happens unless step 2 succeeds, so a failed
//! import leaves the resource outdated for the next scan.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use void_core::{FileHash, Handle};
use walkdir::WalkDir;

use crate::asset::{encode_asset, Asset, AssetState};
use crate::config::AssetManagerConfig;
use crate::constructors::AssetConstructors;
use crate::database::{AssetDatabase, AssetRecord, Resource, ScanOptions, ScanStats};
use crate::error::{AssetError, AssetResult};
use crate::id::AssetId;
use crate::importer::{ImportContext, Importer, ImporterData, ImporterRegistry};
use crate::jobs::JobPool;
use crate::meta::{is_meta_file, meta_path_for, AssetMeta, ResourceMeta};
use crate::watcher::FileWatcher;

/// Outcome of importing a batch of outdated resources
#[derive(Debug, Default)]
pub struct ImportReport {
    pub scan: ScanStats,
    /// Source path and main asset of every successful import
    pub imported: Vec<(PathBuf, AssetId)>,
    pub failed: Vec<(PathBuf, AssetError)>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AssetManager {
    config: AssetManagerConfig,
    constructors: AssetConstructors,
    importers: Arc<ImporterRegistry>,
    database: AssetDatabase,
    assets: HashMap<AssetId, Box<dyn Asset>>,
    jobs: JobPool,
    watcher: Option<FileWatcher>,
}

impl AssetManager {
    /// Create a manager. The compiled store directory is created if missing.
    pub fn new(
        config: AssetManagerConfig,
        constructors: AssetConstructors,
        importers: Arc<ImporterRegistry>,
    ) -> AssetResult<Self> {
        fs::create_dir_all(&config.compiled_dir)
            .map_err(|e| AssetError::io(&config.compiled_dir, e))?;

        log::info!(
            "Asset manager: {} importers, {} asset types, sources in {}",
            importers.len(),
            constructors.len(),
            config.resource_dir.display()
        );

        Ok(Self {
            jobs: JobPool::new(config.hash_workers),
            config,
            constructors,
            importers,
            database: AssetDatabase::new(),
            assets: HashMap::new(),
            watcher: None,
        })
    }

    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    pub fn database(&self) -> &AssetDatabase {
        &self.database
    }

    pub fn importers(&self) -> &ImporterRegistry {
        &self.importers
    }

    /// Where the compiled form of `id` lives
    pub fn compiled_path(&self, id: &AssetId) -> PathBuf {
        self.config.compiled_dir.join(id.file_name())
    }

    pub fn meta_path(&self, resource_path: &Path) -> PathBuf {
        meta_path_for(resource_path, &self.config.meta_extension)
    }

    /// First registered importer accepting `bytes`
    pub fn find_importer(&self, bytes: &[u8], path: &Path) -> AssetResult<usize> {
        self.importers
            .find_importer(bytes)
            .ok_or_else(|| AssetError::NoImporterFound {
                path: path.to_path_buf(),
            })
    }

    fn importer_at(&self, index: usize, path: &Path) -> AssetResult<&dyn Importer> {
        self.importers
            .get(index)
            .ok_or_else(|| AssetError::NoImporterFound {
                path: path.to_path_buf(),
            })
    }

    // ---- Meta files ----

    /// Give a resource seen for the first time a uuid, importer and default
    /// settings, and write its meta file.
    pub fn create_resource_meta(
        &mut self,
        handle: Handle<Resource>,
        bytes: &[u8],
    ) -> AssetResult<(ResourceMeta, usize)> {
        let path = self.database.resource(handle).resource_path.clone();
        let index = self.find_importer(bytes, &path)?;
        let importer = self.importer_at(index, &path)?;

        let uuid = Uuid::new_v4();
        let mut meta = ResourceMeta::new(uuid, display_name(&path), importer.name());
        meta.settings = importer.write_data_json(&*importer.create_default_importer_data())?;

        self.save_resource_meta(handle, &meta)?;
        log::debug!("Created meta for {} ({})", path.display(), uuid);
        Ok((meta, index))
    }

    /// Read an existing meta file. The recorded importer is used when it is
    /// still registered, otherwise the bytes are probed again.
    pub fn load_resource_meta(
        &mut self,
        handle: Handle<Resource>,
        bytes: &[u8],
    ) -> AssetResult<(ResourceMeta, usize)> {
        let path = self.database.resource(handle).resource_path.clone();
        let mut meta = ResourceMeta::read(&self.meta_path(&path))?;
        let uuid = meta.uuid()?;

        let index = match self.importers.index_of(&meta.importer) {
            Some(index) => index,
            None => {
                let index = self.find_importer(bytes, &path)?;
                let importer = self.importer_at(index, &path)?;
                log::warn!(
                    "Importer '{}' recorded for {} is not registered, using '{}'",
                    meta.importer,
                    path.display(),
                    importer.name()
                );
                meta.importer = importer.name().to_string();
                meta.settings = serde_json::Value::Null;
                index
            }
        };

        let resource = self.database.resource_mut(handle);
        resource.uuid = Some(uuid);
        resource.importer = Some(meta.importer.clone());
        Ok((meta, index))
    }

    pub fn save_resource_meta(&mut self, handle: Handle<Resource>, meta: &ResourceMeta) -> AssetResult<()> {
        let uuid = meta.uuid()?;
        let path = self.meta_path(&self.database.resource(handle).resource_path);
        meta.write(&path)?;

        let resource = self.database.resource_mut(handle);
        resource.uuid = Some(uuid);
        resource.importer = Some(meta.importer.clone());
        Ok(())
    }

    /// Register every meta file under the resource directory without
    /// importing anything. Resources whose compiled files are all present
    /// are considered imported at the hash recorded in their meta.
    pub fn load_all_metas(&mut self) -> AssetResult<usize> {
        let root = self.config.resource_dir.clone();
        if !root.is_dir() {
            return Err(AssetError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "resource directory not found"),
            ));
        }

        let compiled = self.config.compiled_dir.clone();
        let mut loaded = 0;
        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !e.path().starts_with(&compiled))
            .filter_map(Result::ok)
        {
            let meta_path = entry.path();
            if !entry.file_type().is_file() || !is_meta_file(meta_path, &self.config.meta_extension) {
                continue;
            }

            let meta = match ResourceMeta::read(meta_path) {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("Skipping {}: {}", meta_path.display(), e);
                    continue;
                }
            };

            let source = meta_path.with_extension("");
            if !source.exists() {
                log::debug!("Meta {} has no source, keeping for rename detection", meta_path.display());
            }
            let handle = self.database.get_resource_from_path(&source);
            self.register_from_meta(handle, &meta)?;
            loaded += 1;
        }

        log::info!("Loaded {} meta files from {}", loaded, root.display());
        Ok(loaded)
    }

    fn register_from_meta(&mut self, handle: Handle<Resource>, meta: &ResourceMeta) -> AssetResult<()> {
        let uuid = meta.uuid()?;
        for asset in &meta.assets {
            self.database.insert_asset(AssetRecord {
                meta: asset.clone(),
                resource: handle,
            });
        }
        let ids: Vec<AssetId> = meta.assets.iter().map(|a| a.id.clone()).collect();
        self.retire_stale_assets(handle, &ids, false);

        let complete = meta.main_asset.is_some()
            && ids.iter().all(|id| self.compiled_path(id).exists());

        let resource = self.database.resource_mut(handle);
        resource.uuid = Some(uuid);
        resource.importer = Some(meta.importer.clone());
        resource.asset_id = meta.main_asset.clone().unwrap_or_default();
        resource.assets = ids;

        if complete {
            self.database.mark_imported(handle, meta.content_hash);
        } else {
            self.database.mark_imported(handle, FileHash::ZERO);
        }
        Ok(())
    }

    // ---- Import ----

    /// Run importer `importer_index` on `bytes` and commit every asset it
    /// produced. Returns the main asset.
    pub fn import_resource(
        &mut self,
        handle: Handle<Resource>,
        resource_uuid: Uuid,
        bytes: &[u8],
        settings: &dyn ImporterData,
        importer_index: usize,
    ) -> AssetResult<AssetId> {
        let path = self.database.resource(handle).resource_path.clone();
        let registry = Arc::clone(&self.importers);
        let importer = registry
            .get(importer_index)
            .ok_or_else(|| AssetError::NoImporterFound { path: path.clone() })?;

        let mut ctx = ImportContext::new(&registry, resource_uuid, &path);
        let main = importer.import(&mut ctx, bytes, settings)?;
        let staged = ctx.into_assets();

        if !staged.iter().any(|a| a.base().id == main) {
            return Err(AssetError::MissingMainAsset { path, id: main });
        }

        // Encode everything before touching the disk
        let mut encoded = Vec::with_capacity(staged.len());
        for mut asset in staged {
            let data = encode_asset(&mut *asset)?;
            encoded.push((asset, data));
        }

        fs::create_dir_all(&self.config.compiled_dir)
            .map_err(|e| AssetError::io(&self.config.compiled_dir, e))?;
        for (asset, data) in &encoded {
            let target = self.compiled_path(&asset.base().id);
            fs::write(&target, data).map_err(|e| AssetError::io(&target, e))?;
        }

        let ids: Vec<AssetId> = encoded.iter().map(|(a, _)| a.base().id.clone()).collect();
        self.retire_stale_assets(handle, &ids, true);

        for (mut asset, data) in encoded {
            let id = asset.base().id.clone();
            if let Some(owner) = self.database.get_asset(&id).map(|r| r.resource) {
                if owner != handle {
                    let other = self.database.resource(owner);
                    log::warn!(
                        "{} was produced by {} as well (shared uuid {:?}); the latest import wins",
                        id,
                        other.resource_path.display(),
                        other.uuid
                    );
                }
            }

            self.database.insert_asset(AssetRecord {
                meta: AssetMeta {
                    id: id.clone(),
                    display_name: asset.base().name.clone(),
                    asset_hash: FileHash::of_bytes(&data),
                },
                resource: handle,
            });
            asset.base_mut().state = AssetState::Loaded;
            self.assets.insert(id, asset);
        }

        let resource = self.database.resource_mut(handle);
        resource.asset_id = main.clone();
        resource.assets = ids;
        resource.importer = Some(importer.name().to_string());

        log::info!(
            "Imported {} with '{}' ({} assets)",
            path.display(),
            importer.name(),
            self.database.resource(handle).assets.len()
        );
        Ok(main)
    }

    /// Bring one resource up to date: reuse compiled output when the meta
    /// matches the file, otherwise import it. Returns the main asset.
    pub fn load_or_import_resource(&mut self, handle: Handle<Resource>) -> AssetResult<AssetId> {
        let path = self.database.resource(handle).resource_path.clone();
        let bytes = fs::read(&path).map_err(|e| AssetError::io(&path, e))?;
        let hash = FileHash::of_bytes(&bytes);

        let (mut meta, index) = if self.meta_path(&path).exists() {
            self.load_resource_meta(handle, &bytes)?
        } else {
            self.create_resource_meta(handle, &bytes)?
        };

        if meta.content_hash == hash && self.compiled_up_to_date(&meta) {
            if let Some(main) = meta.main_asset.clone() {
                self.register_from_meta(handle, &meta)?;
                log::debug!("{} is up to date", path.display());
                return Ok(main);
            }
        }

        let registry = Arc::clone(&self.importers);
        let importer = registry
            .get(index)
            .ok_or_else(|| AssetError::NoImporterFound { path: path.clone() })?;
        let settings = importer.read_data_json(&meta.settings)?;
        let uuid = meta.uuid()?;

        let main = self.import_resource(handle, uuid, &bytes, &*settings, index)?;

        meta.importer = importer.name().to_string();
        meta.settings = importer.write_data_json(&*settings)?;
        meta.content_hash = hash;
        meta.main_asset = Some(main.clone());
        meta.assets = self
            .database
            .resource(handle)
            .assets
            .iter()
            .filter_map(|id| self.database.get_asset(id).map(|r| r.meta.clone()))
            .collect();
        self.save_resource_meta(handle, &meta)?;
        self.database.mark_imported(handle, hash);

        Ok(main)
    }

    fn compiled_up_to_date(&self, meta: &ResourceMeta) -> bool {
        meta.main_asset.is_some()
            && !meta.assets.is_empty()
            && meta.assets.iter().all(|a| self.compiled_path(&a.id).exists())
    }

    /// Drop index entries (and optionally compiled files) of assets the
    /// resource no longer produces
    fn retire_stale_assets(&mut self, handle: Handle<Resource>, keep: &[AssetId], delete_files: bool) {
        let keep: HashSet<&AssetId> = keep.iter().collect();
        let stale: Vec<AssetId> = self
            .database
            .resource(handle)
            .assets
            .iter()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();

        for id in stale {
            // Claimed by another resource since; it owns the live copy and the file now
            if let Some(owner) = self.database.get_asset(&id).map(|r| r.resource) {
                if owner != handle {
                    continue;
                }
            }
            log::debug!("Retiring {}", id);
            self.database.remove_asset(&id);
            self.assets.remove(&id);
            if delete_files {
                let path = self.compiled_path(&id);
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Failed to delete {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    // ---- Scanning ----

    /// Diff the resource directory against the database
    pub fn scan(&mut self) -> AssetResult<(Vec<Handle<Resource>>, ScanStats)> {
        let options = ScanOptions {
            meta_extension: self.config.meta_extension.clone(),
            ignored_dirs: vec![self.config.compiled_dir.clone()],
        };
        let mut outdated = Vec::new();
        let stats = self.database.track_resource_changes(
            &self.config.resource_dir,
            &options,
            &self.jobs,
            &mut outdated,
        )?;
        Ok((outdated, stats))
    }

    /// Import every listed resource, continuing past failures
    pub fn import_outdated(&mut self, outdated: &[Handle<Resource>]) -> ImportReport {
        let mut report = ImportReport::default();
        for &handle in outdated {
            let path = self.database.resource(handle).resource_path.clone();
            match self.load_or_import_resource(handle) {
                Ok(main) => report.imported.push((path, main)),
                Err(e) => {
                    log::warn!("Failed to import {}: {}", path.display(), e);
                    report.failed.push((path, e));
                }
            }
        }
        report
    }

    /// Scan, then import everything that changed
    pub fn refresh(&mut self) -> AssetResult<ImportReport> {
        let (outdated, stats) = self.scan()?;
        let mut report = self.import_outdated(&outdated);
        report.scan = stats;

        let orphaned = self.database.orphaned();
        if !orphaned.is_empty() {
            for &handle in &orphaned {
                log::debug!("Orphaned: {}", self.database.resource(handle).resource_path.display());
            }
            log::warn!("{} resources have no source file, their assets are kept", orphaned.len());
        }

        if !report.imported.is_empty() || !report.failed.is_empty() {
            log::info!(
                "Refresh: {} imported, {} failed, {} renamed",
                report.imported.len(),
                report.failed.len(),
                stats.renamed
            );
        }
        Ok(report)
    }

    // ---- Live assets ----

    /// Main asset of the resource at `path`, imported if needed and loaded
    /// with all its dependencies
    pub fn load_resource(&mut self, path: &Path) -> AssetResult<AssetId> {
        if !path.is_file() {
            return Err(AssetError::UnknownResource {
                path: path.to_path_buf(),
            });
        }
        let handle = self.database.get_resource_from_path(path);
        let current = FileHash::of_file(path).map_err(|e| AssetError::io(path, e))?;

        let up_to_date = {
            let resource = self.database.resource(handle);
            (resource.is_imported()
                && resource.last_imported_hash == current
                && resource.asset_id.is_valid())
            .then(|| resource.asset_id.clone())
        };
        let main = match up_to_date {
            Some(main) => main,
            None => self.load_or_import_resource(handle)?,
        };

        self.load_asset(&main)?;
        Ok(main)
    }

    pub fn get_asset(&self, id: &AssetId) -> Option<&dyn Asset> {
        self.assets.get(id).map(|a| &**a)
    }

    /// Live asset downcast to its concrete type
    pub fn get_asset_as<T: Asset>(&self, id: &AssetId) -> AssetResult<&T> {
        let asset = self
            .get_asset(id)
            .ok_or_else(|| AssetError::AssetNotFound(id.clone()))?;
        asset.downcast_ref::<T>().ok_or_else(|| AssetError::TypeMismatch {
            id: id.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Mutable access for edits that are persisted with [`save_asset`](Self::save_asset)
    pub fn get_asset_mut_as<T: Asset>(&mut self, id: &AssetId) -> AssetResult<&mut T> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| AssetError::AssetNotFound(id.clone()))?;
        asset.downcast_mut::<T>().ok_or_else(|| AssetError::TypeMismatch {
            id: id.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn asset_state(&self, id: &AssetId) -> AssetState {
        self.assets
            .get(id)
            .map_or(AssetState::Unloaded, |a| a.base().state)
    }

    /// Metadata of every known asset, live or not, ordered by id
    pub fn get_assets_metadata(&self) -> Vec<AssetMeta> {
        let mut metas: Vec<AssetMeta> = self.database.assets().map(|r| r.meta.clone()).collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        metas
    }

    /// Write a live asset to the compiled store, returning the hash of the bytes
    pub fn save_asset(&mut self, id: &AssetId) -> AssetResult<FileHash> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| AssetError::AssetNotFound(id.clone()))?;
        let data = encode_asset(&mut **asset)?;

        let target = self.config.compiled_dir.join(id.file_name());
        fs::write(&target, &data).map_err(|e| AssetError::io(&target, e))?;

        let hash = FileHash::of_bytes(&data);
        if let Some(record) = self.database.get_asset_mut(id) {
            record.meta.asset_hash = hash;
        }
        Ok(hash)
    }

    /// Make `id` and, depth first, all of its dependencies live.
    ///
    /// Already loaded assets are left untouched. A dependency chain that
    /// leads back to an asset still being loaded fails with
    /// [`AssetError::DependencyCycle`]; every asset on a failed chain ends
    /// up `LoadingFailed`.
    pub fn load_asset(&mut self, id: &AssetId) -> AssetResult<()> {
        let mut chain = Vec::new();
        self.load_asset_recursive(id, &mut chain)
    }

    fn load_asset_recursive(&mut self, id: &AssetId, chain: &mut Vec<AssetId>) -> AssetResult<()> {
        match self.asset_state(id) {
            state if state.is_ready() => return Ok(()),
            AssetState::Loading => {
                let start = chain.iter().position(|c| c == id).unwrap_or(0);
                let mut cycle = chain[start..].to_vec();
                cycle.push(id.clone());
                return Err(AssetError::DependencyCycle(cycle));
            }
            _ => {}
        }

        let mut asset = self.read_compiled(id)?;
        asset.base_mut().state = AssetState::Loading;
        let dependencies = asset.base().dependencies().to_vec();
        self.assets.insert(id.clone(), asset);

        chain.push(id.clone());
        for dependency in &dependencies {
            if let Err(e) = self.load_asset_recursive(dependency, chain) {
                chain.pop();
                self.set_state(id, AssetState::LoadingFailed);
                log::warn!("Failed to load {}: {}", id, e);
                return Err(e);
            }
        }
        chain.pop();

        self.set_state(id, AssetState::Loaded);
        log::debug!("Loaded {}", id);
        Ok(())
    }

    fn read_compiled(&self, id: &AssetId) -> AssetResult<Box<dyn Asset>> {
        let path = self.compiled_path(id);
        if !path.is_file() {
            return Err(AssetError::AssetNotFound(id.clone()));
        }
        let data = fs::read(&path).map_err(|e| AssetError::io(&path, e))?;
        let asset = self.constructors.decode(&data)?;
        if asset.base().id != *id {
            return Err(AssetError::IdMismatch {
                expected: id.clone(),
                found: asset.base().id.clone(),
            });
        }
        Ok(asset)
    }

    fn set_state(&mut self, id: &AssetId, state: AssetState) {
        if let Some(asset) = self.assets.get_mut(id) {
            asset.base_mut().state = state;
        }
    }

    /// Record that a downstream consumer uploaded the asset
    pub fn mark_installed(&mut self, id: &AssetId) -> AssetResult<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| AssetError::AssetNotFound(id.clone()))?;
        if asset.base().state == AssetState::Loaded {
            asset.base_mut().state = AssetState::Installed;
        }
        Ok(())
    }

    /// Drop a live asset. Dependents are not unloaded.
    pub fn unload_asset(&mut self, id: &AssetId) -> Option<Box<dyn Asset>> {
        let asset = self.assets.remove(id);
        if asset.is_some() {
            log::debug!("Unloaded {}", id);
        }
        asset
    }

    pub fn live_asset_count(&self) -> usize {
        self.assets.len()
    }

    // ---- Hot reload ----

    /// Start watching the resource directory
    pub fn setup_file_watcher(&mut self) -> AssetResult<()> {
        let mut watcher = FileWatcher::new(self.config.meta_extension.clone())?;
        watcher.set_debounce(Duration::from_millis(self.config.watch_debounce_ms));
        watcher.ignore(self.config.compiled_dir.clone());
        if let Ok(compiled) = self.config.compiled_dir.canonicalize() {
            watcher.ignore(compiled);
        }
        watcher.watch(&self.config.resource_dir)?;
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Re-import whatever changed since the last poll. Returns `None` when
    /// the watcher saw nothing.
    pub fn process_file_changes(&mut self) -> AssetResult<Option<ImportReport>> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(None);
        };
        let changes = watcher.poll();
        if changes.is_empty() {
            return Ok(None);
        }

        for change in &changes {
            log::debug!("{:?} {}", change.kind, change.path.display());
        }
        self.refresh().map(Some)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
