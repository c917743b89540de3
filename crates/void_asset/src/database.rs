//! Asset database - source file records and lookup indices
//!
//! Resources live in a generational [`Pool`] so handles stay valid while the
//! table grows. Three indices sit next to it:
//!
//! - path -> resource (one record per source path)
//! - last imported content hash -> resource (rename detection)
//! - asset id -> [`AssetRecord`] (which resource produced an asset)
//!
//! The database never owns live assets; those belong to the asset manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;
use void_core::{FileHash, Handle, Pool};
use walkdir::WalkDir;

use crate::error::{AssetError, AssetResult};
use crate::id::AssetId;
use crate::jobs::JobPool;
use crate::meta::{is_meta_file, meta_path_for, AssetMeta, META_EXTENSION};

/// One source file on disk
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    /// Main asset produced by the last import, invalid before that
    pub asset_id: AssetId,
    pub resource_path: PathBuf,
    /// Content hash at the last successful import, zero if never imported
    pub last_imported_hash: FileHash,
    /// Identity from the meta file, once read or created
    pub uuid: Option<Uuid>,
    pub importer: Option<String>,
    /// Every asset produced by the last import
    pub assets: Vec<AssetId>,
}

impl Resource {
    fn placeholder(path: &Path) -> Self {
        Self {
            resource_path: path.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn is_imported(&self) -> bool {
        !self.last_imported_hash.is_zero()
    }
}

/// Index entry tying an asset to the resource that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRecord {
    pub meta: AssetMeta,
    pub resource: Handle<Resource>,
}

/// What a directory scan looks at
#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub meta_extension: String,
    /// Directories skipped entirely (the compiled store)
    pub ignored_dirs: Vec<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            meta_extension: META_EXTENSION.to_string(),
            ignored_dirs: Vec::new(),
        }
    }
}

/// Counters from one scan
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub outdated: usize,
    pub renamed: usize,
    pub unreadable: usize,
}

#[derive(Default)]
pub struct AssetDatabase {
    resources: Pool<Resource>,
    path_map: HashMap<PathBuf, Handle<Resource>>,
    content_map: HashMap<FileHash, Handle<Resource>>,
    asset_map: HashMap<AssetId, AssetRecord>,
}

impl AssetDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `path`, inserting a never-imported placeholder on first sight
    pub fn get_resource_from_path(&mut self, path: &Path) -> Handle<Resource> {
        if let Some(&handle) = self.path_map.get(path) {
            return handle;
        }
        let handle = self.resources.insert(Resource::placeholder(path));
        self.path_map.insert(path.to_path_buf(), handle);
        log::debug!("Discovered resource {}", path.display());
        handle
    }

    /// Record for `path` without inserting
    pub fn find_resource(&self, path: &Path) -> Option<Handle<Resource>> {
        self.path_map.get(path).copied()
    }

    /// Resource whose last successful import saw this content
    pub fn get_resource_from_content(&self, hash: FileHash) -> Option<Handle<Resource>> {
        if hash.is_zero() {
            return None;
        }
        self.content_map.get(&hash).copied()
    }

    /// Panics on a handle that did not come from this database
    pub fn resource(&self, handle: Handle<Resource>) -> &Resource {
        &self.resources[handle]
    }

    pub fn resource_mut(&mut self, handle: Handle<Resource>) -> &mut Resource {
        &mut self.resources[handle]
    }

    pub fn resources(&self) -> impl Iterator<Item = (Handle<Resource>, &Resource)> {
        self.resources.iter()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Advance the content hash after a successful import
    pub fn mark_imported(&mut self, handle: Handle<Resource>, hash: FileHash) {
        let previous = std::mem::replace(&mut self.resources[handle].last_imported_hash, hash);
        if self.content_map.get(&previous) == Some(&handle) {
            self.content_map.remove(&previous);
        }
        if !hash.is_zero() {
            self.content_map.insert(hash, handle);
        }
    }

    /// Move a record to a new path, keeping its identity and import state
    pub fn rename_resource(&mut self, handle: Handle<Resource>, new_path: &Path) {
        let old_path = std::mem::replace(
            &mut self.resources[handle].resource_path,
            new_path.to_path_buf(),
        );
        if self.path_map.get(&old_path) == Some(&handle) {
            self.path_map.remove(&old_path);
        }
        self.path_map.insert(new_path.to_path_buf(), handle);
    }

    /// Resources whose source file no longer exists
    pub fn orphaned(&self) -> Vec<Handle<Resource>> {
        self.resources
            .iter()
            .filter(|(_, r)| !r.resource_path.exists())
            .map(|(h, _)| h)
            .collect()
    }

    /// Register an asset in the lookup index, replacing any previous record
    pub fn insert_asset(&mut self, record: AssetRecord) {
        self.asset_map.insert(record.meta.id.clone(), record);
    }

    pub fn get_asset(&self, id: &AssetId) -> Option<&AssetRecord> {
        self.asset_map.get(id)
    }

    pub fn get_asset_mut(&mut self, id: &AssetId) -> Option<&mut AssetRecord> {
        self.asset_map.get_mut(id)
    }

    pub fn remove_asset(&mut self, id: &AssetId) -> Option<AssetRecord> {
        self.asset_map.remove(id)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRecord> {
        self.asset_map.values()
    }

    /// Walk `dir`, hash every source file and collect the ones whose content
    /// differs from their last import.
    ///
    /// Never advances stored hashes; that only happens once an import
    /// succeeds. A new path carrying the exact content of a resource whose
    /// file has disappeared is treated as a rename: the old record (and its
    /// meta file) moves to the new path and is not reported.
    pub fn track_resource_changes(
        &mut self,
        dir: &Path,
        options: &ScanOptions,
        jobs: &JobPool,
        outdated: &mut Vec<Handle<Resource>>,
    ) -> AssetResult<ScanStats> {
        let files = collect_source_files(dir, options)?;
        let mut stats = ScanStats {
            files: files.len(),
            ..Default::default()
        };

        let hashes = jobs.parallel_map(&files, |path| FileHash::of_file(path));

        for (path, hash) in files.iter().zip(hashes) {
            let hash = match hash {
                Ok(hash) => hash,
                Err(e) => {
                    log::warn!("Cannot hash {}: {}", path.display(), e);
                    stats.unreadable += 1;
                    continue;
                }
            };

            if let Some(handle) = self.find_resource(path) {
                if self.resources[handle].last_imported_hash != hash {
                    outdated.push(handle);
                    stats.outdated += 1;
                }
                continue;
            }

            if let Some(handle) = self.renamed_from(hash) {
                let old_path = self.resources[handle].resource_path.clone();
                log::info!("Detected rename {} -> {}", old_path.display(), path.display());
                move_meta(&old_path, path, &options.meta_extension);
                self.rename_resource(handle, path);
                stats.renamed += 1;
                continue;
            }

            outdated.push(self.get_resource_from_path(path));
            stats.outdated += 1;
        }

        log::debug!(
            "Scanned {}: {} files, {} outdated, {} renamed",
            dir.display(),
            stats.files,
            stats.outdated,
            stats.renamed
        );
        Ok(stats)
    }

    fn renamed_from(&self, hash: FileHash) -> Option<Handle<Resource>> {
        let handle = self.get_resource_from_content(hash)?;
        // A live original means this is a copy, not a move
        if self.resources[handle].resource_path.exists() {
            return None;
        }
        Some(handle)
    }
}

/// Every source file below `dir`, sorted
fn collect_source_files(dir: &Path, options: &ScanOptions) -> AssetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AssetError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "resource directory not found"),
        ));
    }

    // Ignored dirs may be spelled relative or absolute independently of `dir`
    let canonical_ignored: Vec<PathBuf> = options
        .ignored_dirs
        .iter()
        .filter_map(|d| d.canonicalize().ok())
        .collect();
    let is_ignored = |entry: &walkdir::DirEntry| {
        if options.ignored_dirs.iter().any(|d| entry.path().starts_with(d)) {
            return true;
        }
        entry.file_type().is_dir()
            && !canonical_ignored.is_empty()
            && entry
                .path()
                .canonicalize()
                .is_ok_and(|p| canonical_ignored.contains(&p))
    };

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && !is_meta_file(entry.path(), &options.meta_extension) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn move_meta(old_path: &Path, new_path: &Path, extension: &str) {
    let from = meta_path_for(old_path, extension);
    if !from.exists() {
        return;
    }
    let to = meta_path_for(new_path, extension);
    if let Err(e) = std::fs::rename(&from, &to) {
        log::warn!("Failed to move {} to {}: {}", from.display(), to.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scan(db: &mut AssetDatabase, dir: &Path) -> Vec<Handle<Resource>> {
        let mut outdated = Vec::new();
        let options = ScanOptions {
            ignored_dirs: vec![dir.join(".compiled")],
            ..Default::default()
        };
        db.track_resource_changes(dir, &options, &JobPool::new(2), &mut outdated)
            .unwrap();
        outdated
    }

    #[test]
    fn test_placeholder_is_stable() {
        let mut db = AssetDatabase::new();
        let a = db.get_resource_from_path(Path::new("a.png"));
        let b = db.get_resource_from_path(Path::new("a.png"));
        assert_eq!(a, b);
        assert_eq!(db.resource_count(), 1);
        assert!(!db.resource(a).is_imported());
        assert!(db.get_resource_from_content(FileHash::ZERO).is_none());
    }

    #[test]
    fn test_change_detection() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"one").unwrap();

        let mut db = AssetDatabase::new();
        let outdated = scan(&mut db, dir.path());
        assert_eq!(outdated.len(), 1);

        // Scanning does not advance the hash
        assert_eq!(scan(&mut db, dir.path()), outdated);

        db.mark_imported(outdated[0], FileHash::of_bytes(b"one"));
        assert!(scan(&mut db, dir.path()).is_empty());

        // Same bytes rewritten
        fs::write(&file, b"one").unwrap();
        assert!(scan(&mut db, dir.path()).is_empty());

        fs::write(&file, b"two").unwrap();
        assert_eq!(scan(&mut db, dir.path()), outdated);
    }

    #[test]
    fn test_meta_and_compiled_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"a").unwrap();
        fs::write(dir.path().join("a.bin.meta"), b"{}").unwrap();
        fs::create_dir_all(dir.path().join(".compiled")).unwrap();
        fs::write(dir.path().join(".compiled/0123.mesh"), b"MESH").unwrap();

        let mut db = AssetDatabase::new();
        let outdated = scan(&mut db, dir.path());
        assert_eq!(outdated.len(), 1);
        assert_eq!(db.resource(outdated[0]).resource_path, dir.path().join("a.bin"));
    }

    #[test]
    fn test_compiled_skipped_when_spelled_differently() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".compiled")).unwrap();
        fs::write(dir.path().join("a.bin"), b"a").unwrap();
        fs::write(dir.path().join(".compiled/0123.mesh"), b"MESH").unwrap();

        let options = ScanOptions {
            ignored_dirs: vec![dir.path().join("sub/../.compiled")],
            ..Default::default()
        };
        let mut db = AssetDatabase::new();
        let mut outdated = Vec::new();
        let stats = db
            .track_resource_changes(dir.path(), &options, &JobPool::new(2), &mut outdated)
            .unwrap();

        assert_eq!(stats.files, 1);
        assert_eq!(db.resource(outdated[0]).resource_path, dir.path().join("a.bin"));
    }

    #[test]
    fn test_rename_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.bin");
        let new = dir.path().join("new.bin");
        fs::write(&old, b"payload").unwrap();
        fs::write(meta_path_for(&old, META_EXTENSION), b"{}").unwrap();

        let mut db = AssetDatabase::new();
        let handle = scan(&mut db, dir.path())[0];
        db.mark_imported(handle, FileHash::of_bytes(b"payload"));

        fs::rename(&old, &new).unwrap();
        assert!(scan(&mut db, dir.path()).is_empty());
        assert_eq!(db.find_resource(&new), Some(handle));
        assert_eq!(db.find_resource(&old), None);
        assert!(meta_path_for(&new, META_EXTENSION).exists());
    }

    #[test]
    fn test_copy_is_not_a_rename() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.bin");
        fs::write(&original, b"same").unwrap();

        let mut db = AssetDatabase::new();
        let handle = scan(&mut db, dir.path())[0];
        db.mark_imported(handle, FileHash::of_bytes(b"same"));

        fs::write(dir.path().join("b.bin"), b"same").unwrap();
        let outdated = scan(&mut db, dir.path());
        assert_eq!(outdated.len(), 1);
        assert_ne!(outdated[0], handle);
    }

    #[test]
    fn test_asset_index() {
        let mut db = AssetDatabase::new();
        let resource = db.get_resource_from_path(Path::new("a.png"));
        let id = AssetId::with_tag(crate::TypeTag::new(*b"TXTR"), "a");
        db.insert_asset(AssetRecord {
            meta: AssetMeta {
                id: id.clone(),
                display_name: "a".into(),
                asset_hash: FileHash(1),
            },
            resource,
        });

        assert_eq!(db.get_asset(&id).map(|r| r.resource), Some(resource));
        assert!(db.remove_asset(&id).is_some());
        assert!(db.get_asset(&id).is_none());
    }

    #[test]
    fn test_missing_directory() {
        let mut db = AssetDatabase::new();
        let mut outdated = Vec::new();
        let err = db
            .track_resource_changes(
                Path::new("/definitely/not/here"),
                &ScanOptions::default(),
                &JobPool::serial(),
                &mut outdated,
            )
            .unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
