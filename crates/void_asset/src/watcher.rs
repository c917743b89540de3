//! File system watcher for hot-reload
//!
//! `notify` delivers events on its own thread; they are queued on a channel
//! and only turned into [`FileChange`]s when the asset manager polls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(feature = "hot-reload")]
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::error::{AssetError, AssetResult};
use crate::meta::is_meta_file;

/// A file change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Watches the resource tree, ignoring side-cars and the compiled store
pub struct FileWatcher {
    #[cfg(feature = "hot-reload")]
    watcher: notify::RecommendedWatcher,
    #[cfg(feature = "hot-reload")]
    rx: crossbeam_channel::Receiver<notify::Result<Event>>,

    /// Last time each path was reported
    debounce: HashMap<PathBuf, Instant>,
    debounce_duration: Duration,
    meta_extension: String,
    ignored_dirs: Vec<PathBuf>,
    watch_dirs: Vec<PathBuf>,
}

impl FileWatcher {
    #[cfg(feature = "hot-reload")]
    pub fn new(meta_extension: impl Into<String>) -> AssetResult<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| AssetError::Watch(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            watcher,
            rx,
            debounce: HashMap::new(),
            debounce_duration: Duration::from_millis(100),
            meta_extension: meta_extension.into(),
            ignored_dirs: Vec::new(),
            watch_dirs: Vec::new(),
        })
    }

    /// Inert watcher when built without `hot-reload`
    #[cfg(not(feature = "hot-reload"))]
    pub fn new(meta_extension: impl Into<String>) -> AssetResult<Self> {
        Ok(Self {
            debounce: HashMap::new(),
            debounce_duration: Duration::from_millis(100),
            meta_extension: meta_extension.into(),
            ignored_dirs: Vec::new(),
            watch_dirs: Vec::new(),
        })
    }

    /// Watch a directory recursively
    #[cfg(feature = "hot-reload")]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> AssetResult<()> {
        let path = dir.as_ref().to_path_buf();

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| AssetError::io(&path, e))?;
        }

        self.watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| AssetError::Watch(format!("Failed to watch {}: {}", path.display(), e)))?;

        log::info!("Watching directory: {}", path.display());
        self.watch_dirs.push(path);
        Ok(())
    }

    #[cfg(not(feature = "hot-reload"))]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> AssetResult<()> {
        self.watch_dirs.push(dir.as_ref().to_path_buf());
        Ok(())
    }

    /// Never report events below `dir`
    pub fn ignore(&mut self, dir: impl Into<PathBuf>) {
        self.ignored_dirs.push(dir.into());
    }

    /// Drain pending events
    #[cfg(feature = "hot-reload")]
    pub fn poll(&mut self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        let now = Instant::now();

        while let Ok(result) = self.rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watcher error: {}", e);
                    continue;
                }
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileChangeKind::Created,
                EventKind::Modify(_) => FileChangeKind::Modified,
                EventKind::Remove(_) => FileChangeKind::Deleted,
                _ => continue,
            };

            for path in event.paths {
                if path.is_dir() || !self.is_source_file(&path) {
                    continue;
                }

                if let Some(last) = self.debounce.get(&path) {
                    if now.duration_since(*last) < self.debounce_duration {
                        continue;
                    }
                }

                self.debounce.insert(path.clone(), now);
                changes.push(FileChange { path, kind });
            }
        }

        self.debounce
            .retain(|_, time| now.duration_since(*time) < Duration::from_secs(5));

        changes
    }

    #[cfg(not(feature = "hot-reload"))]
    pub fn poll(&mut self) -> Vec<FileChange> {
        Vec::new()
    }

    /// Check if a path is a source the manager cares about
    pub fn is_source_file(&self, path: &Path) -> bool {
        if is_meta_file(path, &self.meta_extension) {
            return false;
        }
        if self.ignored_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        // Editor swap and temp files
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        !(name.starts_with('.') || name.ends_with('~') || name.ends_with(".tmp"))
    }

    pub fn watch_dirs(&self) -> &[PathBuf] {
        &self.watch_dirs
    }

    pub fn set_debounce(&mut self, duration: Duration) {
        self.debounce_duration = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_filter() {
        let mut watcher = FileWatcher::new("meta").unwrap();
        watcher.ignore("/game/assets/.compiled");

        assert!(watcher.is_source_file(Path::new("/game/assets/wall.png")));
        assert!(!watcher.is_source_file(Path::new("/game/assets/wall.png.meta")));
        assert!(!watcher.is_source_file(Path::new("/game/assets/.compiled/00ff.txtr")));
        assert!(!watcher.is_source_file(Path::new("/game/assets/wall.png~")));
    }

    #[test]
    fn test_watch_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new");
        let mut watcher = FileWatcher::new("meta").unwrap();
        watcher.watch(&target).unwrap();
        assert_eq!(watcher.watch_dirs(), &[target.clone()]);
        #[cfg(feature = "hot-reload")]
        assert!(target.is_dir());
    }
}
