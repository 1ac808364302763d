//! Per-folder write-back cache
//!
//! The cache owns the authoritative in-memory copy of every folder touched
//! in a session. Folders are loaded lazily (a missing directory is an empty
//! folder) and written back only when marked dirty and flushed.
//!
//! # Durability
//!
//! [`DiskCache::flush_all`] is the only durability boundary. There is no
//! write-ahead log and nothing is flushed on drop: writes made after the last
//! successful flush are lost if the process ends abnormally. Callers decide
//! when to flush (clean shutdown, after long batch runs).
//!
//! # Concurrency
//!
//! Each cached folder is an `Arc<RwLock<Folder>>`, which is the per-path lock
//! for callers that mutate folders from worker threads. Mutators must release
//! the folder guard before calling [`DiskCache::mark_dirty`]; flush takes the
//! dirty set first and then folder locks in path order. There is no
//! cross-process locking: two processes sharing one store root are not
//! supported.

use crate::core::element::{Document, JsonCodec, RecordCodec};
use crate::core::folder::{Folder, FolderPath, UnreadableDocument};
use crate::core::manifest::FolderManifest;
use crate::core::validation::{document_file_name, escape_segment, unescape_segment};
use crate::error::{Result, StoreError};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A cached folder; the same instance is returned for a path all session long
pub type SharedFolder = Arc<RwLock<Folder>>;

/// On-disk layout options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    /// Longest document file name before hashing kicks in
    pub max_file_name_len: usize,
    /// Write a child manifest into every flushed folder
    pub write_manifests: bool,
}

impl Default for DiskLayout {
    fn default() -> Self {
        DiskLayout {
            max_file_name_len: 120,
            write_manifests: true,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Folders read from disk
    pub loads: u64,
    /// `get_folder` calls served from memory
    pub hits: u64,
    /// Folders written back
    pub folder_writes: u64,
    /// Document files written
    pub document_writes: u64,
    /// Document files deleted
    pub document_removals: u64,
    /// Folders currently resident
    pub cached_folders: usize,
    /// Folders currently marked dirty
    pub dirty_folders: usize,
}

impl CacheStats {
    /// Disk writes of any kind so far
    pub fn total_writes(&self) -> u64 {
        self.folder_writes + self.document_writes + self.document_removals
    }
}

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicU64,
    hits: AtomicU64,
    folder_writes: AtomicU64,
    document_writes: AtomicU64,
    document_removals: AtomicU64,
}

/// Write-back cache of folders under one root directory
pub struct DiskCache {
    root: PathBuf,
    codec: Arc<dyn RecordCodec>,
    layout: DiskLayout,
    folders: Mutex<HashMap<FolderPath, SharedFolder>>,
    dirty: Mutex<BTreeSet<FolderPath>>,
    counters: Counters,
}

impl DiskCache {
    /// Cache over `root` with the JSON codec and default layout
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_codec(root, Arc::new(JsonCodec), DiskLayout::default())
    }

    pub fn with_codec(
        root: impl Into<PathBuf>,
        codec: Arc<dyn RecordCodec>,
        layout: DiskLayout,
    ) -> Self {
        let root = root.into();
        debug!("Opening disk cache at {}", root.display());
        DiskCache {
            root,
            codec,
            layout,
            folders: Mutex::new(HashMap::new()),
            dirty: Mutex::new(BTreeSet::new()),
            counters: Counters::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> &dyn RecordCodec {
        self.codec.as_ref()
    }

    /// Directory of a folder path
    pub fn dir_of(&self, path: &FolderPath) -> Result<PathBuf> {
        let mut dir = self.root.clone();
        for segment in path.segments() {
            dir.push(escape_segment(segment)?);
        }
        Ok(dir)
    }

    /// Folder at `path`, loading it on first access
    ///
    /// A folder with no directory on disk is empty, not an error. Mutations
    /// through the returned handle change cache state directly; call
    /// [`mark_dirty`](Self::mark_dirty) afterwards to have them written back.
    pub fn get_folder(&self, path: &FolderPath) -> Result<SharedFolder> {
        let mut folders = self.folders.lock();
        if let Some(folder) = folders.get(path) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(folder));
        }

        let folder = Arc::new(RwLock::new(self.load_folder(path)?));
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        folders.insert(path.clone(), Arc::clone(&folder));
        Ok(folder)
    }

    pub fn is_cached(&self, path: &FolderPath) -> bool {
        self.folders.lock().contains_key(path)
    }

    /// Make `path` eligible for write-back
    pub fn mark_dirty(&self, path: &FolderPath) {
        self.dirty.lock().insert(path.clone());
    }

    pub fn is_dirty(&self, path: &FolderPath) -> bool {
        self.dirty.lock().contains(path)
    }

    /// Dirty paths in ascending order
    pub fn dirty_paths(&self) -> Vec<FolderPath> {
        self.dirty.lock().iter().cloned().collect()
    }

    /// Load `path` and register it as a child of each of its ancestors
    ///
    /// Ancestors whose child list grows are marked dirty, so a flush of
    /// `path` also writes the manifests that lead to it.
    pub fn attach(&self, path: &FolderPath) -> Result<SharedFolder> {
        let ancestry = path.ancestry();
        for pair in ancestry.windows(2) {
            let (parent, child) = (&pair[0], &pair[1]);
            let name = child.name().unwrap_or_default().to_string();
            let parent_folder = self.get_folder(parent)?;
            let added = parent_folder.write().add_child(name);
            if added {
                self.mark_dirty(parent);
            }
        }
        self.get_folder(path)
    }

    /// Child segment names of `path`, ascending
    ///
    /// Resident folders answer from memory (unflushed children included).
    /// Otherwise the folder's manifest is read, or its directory scanned;
    /// documents are not loaded.
    pub fn list_children(&self, path: &FolderPath) -> Result<Vec<String>> {
        let resident = self.folders.lock().get(path).cloned();
        if let Some(folder) = resident {
            return Ok(folder.read().children().map(str::to_string).collect());
        }

        let dir = self.dir_of(path)?;
        let children = self.read_children(&dir)?;
        Ok(children.into_iter().collect())
    }

    /// Write back the dirty folders on `path`'s ancestry
    ///
    /// Returns the number of folders written. On failure nothing is marked
    /// clean, so calling it again retries every write.
    pub fn flush(&self, path: &FolderPath) -> Result<usize> {
        let mut dirty = self.dirty.lock();
        let targets: Vec<FolderPath> = path
            .ancestry()
            .into_iter()
            .filter(|p| dirty.contains(p))
            .collect();
        self.write_back(&mut dirty, targets)
    }

    /// Write back every dirty folder; a no-op when nothing is dirty
    pub fn flush_all(&self) -> Result<usize> {
        let mut dirty = self.dirty.lock();
        let targets: Vec<FolderPath> = dirty.iter().cloned().collect();
        let written = self.write_back(&mut dirty, targets)?;
        if written > 0 {
            info!("Flushed {} folders under {}", written, self.root.display());
        }
        Ok(written)
    }

    /// Flush `path` and drop it from memory
    pub fn evict(&self, path: &FolderPath) -> Result<()> {
        self.flush(path)?;
        self.folders.lock().remove(path);
        debug!("Evicted folder {}", path);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        // One lock at a time: flush holds `dirty` while it takes `folders`
        let cached_folders = self.folders.lock().len();
        let dirty_folders = self.dirty.lock().len();
        CacheStats {
            loads: self.counters.loads.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            folder_writes: self.counters.folder_writes.load(Ordering::Relaxed),
            document_writes: self.counters.document_writes.load(Ordering::Relaxed),
            document_removals: self.counters.document_removals.load(Ordering::Relaxed),
            cached_folders,
            dirty_folders,
        }
    }

    fn write_back(&self, dirty: &mut BTreeSet<FolderPath>, targets: Vec<FolderPath>) -> Result<usize> {
        if targets.is_empty() {
            return Ok(0);
        }

        let handles: Vec<(FolderPath, SharedFolder)> = {
            let folders = self.folders.lock();
            targets
                .into_iter()
                .filter_map(|p| folders.get(&p).cloned().map(|f| (p, f)))
                .collect()
        };

        // Targets come from a BTreeSet walk, so locks are taken in path order
        let mut guards: Vec<_> = handles.iter().map(|(p, f)| (p, f.write())).collect();

        let mut overwritten = Vec::with_capacity(guards.len());
        for (path, folder) in &guards {
            overwritten.push(self.write_folder(path, folder)?);
        }

        for ((path, folder), file_names) in guards.iter_mut().zip(overwritten) {
            folder.mark_clean();
            folder.forget_unreadable(&file_names);
            dirty.remove(*path);
        }

        Ok(guards.len())
    }

    /// File name the document with identity `key` is stored under
    pub fn document_file_name(&self, key: &str) -> Result<String> {
        document_file_name(key, self.codec.file_extension(), self.layout.max_file_name_len)
    }

    /// Returns the names of the unreadable documents that were overwritten
    fn write_folder(&self, path: &FolderPath, folder: &Folder) -> Result<Vec<String>> {
        let dir = self.dir_of(path)?;
        fs::create_dir_all(&dir)?;

        let mut written = 0usize;
        let mut overwritten = Vec::new();

        for key in folder.pending_keys() {
            let Some(element) = folder.get(key) else {
                continue;
            };
            let file_name = self.document_file_name(key)?;
            let bytes = self.codec.encode(&Document {
                key: key.to_string(),
                element: element.clone(),
            })?;
            write_atomic(&dir, &file_name, &bytes)?;
            self.counters.document_writes.fetch_add(1, Ordering::Relaxed);
            written += 1;
            if folder.unreadable().iter().any(|d| d.file_name == file_name) {
                overwritten.push(file_name);
            }
        }

        for key in folder.removed_keys() {
            let file_name = self.document_file_name(key)?;
            match fs::remove_file(dir.join(&file_name)) {
                Ok(()) => {
                    self.counters.document_removals.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let manifest_path = dir.join(FolderManifest::FILE_NAME);
        if self.layout.write_manifests {
            let manifest = FolderManifest::new(
                folder.children().map(str::to_string).collect(),
                folder.len(),
            );
            write_atomic(&dir, FolderManifest::FILE_NAME, &manifest.to_bytes()?)?;
        } else if manifest_path.exists() {
            // A stale manifest would hide children created from now on
            fs::remove_file(&manifest_path)?;
        }

        self.counters.folder_writes.fetch_add(1, Ordering::Relaxed);
        debug!("Flushed folder {} ({} documents written)", path, written);
        Ok(overwritten)
    }

    fn load_folder(&self, path: &FolderPath) -> Result<Folder> {
        let dir = self.dir_of(path)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Folder {} not on disk, starting empty", path);
                return Ok(Folder::new());
            }
            Err(e) => return Err(e.into()),
        };

        let extension = self.codec.file_extension();
        let mut documents = BTreeMap::new();
        let mut unreadable = Vec::new();

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Manifest, temp files: escaped names never start with '.'
            if file_name.starts_with('.') {
                continue;
            }
            if Path::new(&file_name).extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }

            let bytes = fs::read(entry.path())?;
            match self.codec.decode(&file_name, &bytes) {
                Ok(document) => {
                    documents.insert(document.key, document.element);
                }
                Err(e) if e.is_decode() => {
                    warn!("Unreadable document {} in {}: {}", file_name, path, e);
                    unreadable.push(UnreadableDocument {
                        file_name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        unreadable.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let children = self.read_children(&dir)?;
        debug!(
            "Loaded folder {} ({} documents, {} children)",
            path,
            documents.len(),
            children.len()
        );
        Ok(Folder::loaded(documents, unreadable, children))
    }

    fn read_children(&self, dir: &Path) -> Result<BTreeSet<String>> {
        match FolderManifest::read(dir) {
            Ok(Some(manifest)) => return Ok(manifest.children.into_iter().collect()),
            Ok(None) => {}
            Err(e) if e.is_decode() => {
                warn!("Ignoring manifest in {}: {}", dir.display(), e);
            }
            Err(e) => return Err(e),
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut children = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let raw = entry.file_name().to_string_lossy().into_owned();
            match unescape_segment(&raw) {
                Ok(name) => {
                    children.insert(name);
                }
                Err(StoreError::InvalidSegment(reason)) => {
                    warn!("Skipping directory {} in {}: {}", raw, dir.display(), reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(children)
    }
}

/// Write through a temp file so a crash never leaves a half-written document
fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!(".tmp-{}", file_name));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, dir.join(file_name))?;
    Ok(())
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::Element;
    use tempfile::TempDir;

    fn path(segments: &[&str]) -> FolderPath {
        FolderPath::new(segments.iter().copied()).unwrap()
    }

    #[test]
    fn test_missing_folder_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let folder = cache.get_folder(&path(&["nowhere"]))?;
        assert!(folder.read().is_empty());
        assert_eq!(cache.stats().loads, 1);
        Ok(())
    }

    #[test]
    fn test_same_instance_per_path() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let a = cache.get_folder(&path(&["x"]))?;
        let b = cache.get_folder(&path(&["x"]))?;
        assert!(Arc::ptr_eq(&a, &b));

        a.write().insert("k", Element::new("star"));
        assert!(b.read().contains("k"));
        assert_eq!(cache.stats().hits, 1);
        Ok(())
    }

    #[test]
    fn test_mutation_needs_mark_dirty() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let p = path(&["a"]);
        cache.get_folder(&p)?.write().insert("k", Element::new("star"));

        assert_eq!(cache.flush_all()?, 0);
        assert_eq!(cache.stats().total_writes(), 0);

        cache.mark_dirty(&p);
        assert_eq!(cache.flush_all()?, 1);
        assert!(!cache.is_dirty(&p));
        Ok(())
    }

    #[test]
    fn test_attach_registers_ancestors() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let p = path(&["2024", "03", "15"]);
        cache.attach(&p)?;

        assert_eq!(cache.list_children(&FolderPath::root())?, vec!["2024"]);
        assert_eq!(cache.list_children(&path(&["2024"]))?, vec!["03"]);
        assert_eq!(
            cache.dirty_paths(),
            vec![FolderPath::root(), path(&["2024"]), path(&["2024", "03"])]
        );
        Ok(())
    }

    #[test]
    fn test_flush_only_follows_ancestry() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        for p in [path(&["a", "1"]), path(&["b", "2"])] {
            cache.attach(&p)?.write().insert("k", Element::new("star"));
            cache.mark_dirty(&p);
        }

        // root, /a, /a/1
        assert_eq!(cache.flush(&path(&["a", "1"]))?, 3);
        assert!(cache.is_dirty(&path(&["b"])));
        assert!(cache.is_dirty(&path(&["b", "2"])));
        assert!(!cache.is_dirty(&path(&["a", "1"])));
        Ok(())
    }

    #[test]
    fn test_removed_document_deleted_on_flush() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let p = path(&["a"]);
        cache.attach(&p)?.write().insert("gone", Element::new("star"));
        cache.mark_dirty(&p);
        cache.flush_all()?;
        let file = cache.dir_of(&p)?.join("gone.json");
        assert!(file.exists());

        cache.get_folder(&p)?.write().remove("gone");
        cache.mark_dirty(&p);
        cache.flush_all()?;
        assert!(!file.exists());
        assert_eq!(cache.stats().document_removals, 1);
        Ok(())
    }

    #[test]
    fn test_unreadable_document_kept() -> Result<()> {
        let dir = TempDir::new()?;
        let folder_dir = dir.path().join("a");
        fs::create_dir_all(&folder_dir)?;
        fs::write(folder_dir.join("broken.json"), b"{ nope")?;

        let cache = DiskCache::new(dir.path());
        let p = path(&["a"]);
        let folder = cache.get_folder(&p)?;
        assert_eq!(folder.read().unreadable().len(), 1);
        assert_eq!(folder.read().unreadable()[0].file_name, "broken.json");

        folder.write().insert("ok", Element::new("star"));
        cache.mark_dirty(&p);
        cache.flush_all()?;
        assert!(folder_dir.join("broken.json").exists());
        Ok(())
    }

    #[test]
    fn test_scan_without_manifest() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("GSC 1.2%2FACT"))?;
        fs::create_dir_all(dir.path().join("Tycho-2"))?;

        let cache = DiskCache::new(dir.path());
        assert_eq!(
            cache.list_children(&FolderPath::root())?,
            vec!["GSC 1.2/ACT", "Tycho-2"]
        );
        assert!(!cache.is_cached(&FolderPath::root()));
        Ok(())
    }

    #[test]
    fn test_manifests_optional() -> Result<()> {
        let dir = TempDir::new()?;
        let layout = DiskLayout {
            write_manifests: false,
            ..DiskLayout::default()
        };
        let cache = DiskCache::with_codec(dir.path(), Arc::new(JsonCodec), layout);
        let p = path(&["a"]);
        cache.attach(&p)?.write().insert("k", Element::new("star"));
        cache.mark_dirty(&p);
        cache.flush_all()?;

        assert!(!dir.path().join(FolderManifest::FILE_NAME).exists());
        let reopened = DiskCache::new(dir.path());
        assert_eq!(reopened.list_children(&FolderPath::root())?, vec!["a"]);
        Ok(())
    }

    #[test]
    fn test_evict_flushes_then_reloads() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DiskCache::new(dir.path());
        let p = path(&["a"]);
        cache.attach(&p)?.write().insert("k", Element::new("star"));
        cache.mark_dirty(&p);

        cache.evict(&p)?;
        assert!(!cache.is_cached(&p));
        assert!(cache.get_folder(&p)?.read().contains("k"));
        Ok(())
    }

    #[test]
    fn test_stats_never_holds_folders_while_waiting() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = Arc::new(DiskCache::new(dir.path()));
        cache.get_folder(&path(&["a"]))?;

        // Same order as a flush: dirty set first, then the folder map
        let dirty = cache.dirty.lock();
        let reader = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.stats())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        let folders = cache.folders.try_lock_for(std::time::Duration::from_secs(2));
        assert!(folders.is_some());
        drop(folders);
        drop(dirty);

        let stats = reader.join().expect("stats thread panicked");
        assert_eq!(stats.cached_folders, 1);
        Ok(())
    }

    #[test]
    fn test_overwritten_unreadable_document_forgotten() -> Result<()> {
        let dir = TempDir::new()?;
        let p = path(&["a"]);
        fs::create_dir_all(dir.path().join("a"))?;
        fs::write(dir.path().join("a/k.json"), b"not json")?;
        fs::write(dir.path().join("a/other.json"), b"not json either")?;

        let cache = DiskCache::new(dir.path());
        let folder = cache.get_folder(&p)?;
        assert_eq!(folder.read().unreadable().len(), 2);

        folder.write().insert("k", Element::new("star"));
        cache.mark_dirty(&p);
        cache.flush_all()?;

        let names: Vec<String> = folder.read().unreadable().iter().map(|d| d.file_name.clone()).collect();
        assert_eq!(names, vec!["other.json"]);
        assert_eq!(fs::read(dir.path().join("a/other.json"))?, b"not json either");
        Ok(())
    }
}
