//! Per-domain record managers
//!
//! A [`DbManager`] binds one record kind to a [`DiskCache`] and a
//! [`HierarchyIndex`] orientation. The domain managers wrap it with the
//! lookups their callers need.

pub mod catalog;
pub mod information;
pub mod magnitude;

pub use catalog::CatalogDbManager;
pub use information::InformationDbManager;
pub use magnitude::MagnitudeDbManager;

use crate::core::accessor::Accessor;
use crate::core::cache::DiskCache;
use crate::core::folder::{FolderPath, UnreadableDocument};
use crate::core::hierarchy::{HierarchyIndex, Orientation};
use crate::core::observer::{ItemRef, OperationObserver};
use crate::core::record::{NegativeMode, Record, StarRegistry};
use crate::error::{Result, StoreError};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Generic manager for one record kind
///
/// Callers get record copies, never the cached folders themselves. Every
/// mutation marks its folder dirty but nothing is written until
/// [`flush`](Self::flush) or [`flush_all`](Self::flush_all).
pub struct DbManager<R: Record> {
    cache: Arc<DiskCache>,
    index: HierarchyIndex,
    registry: Arc<StarRegistry>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> DbManager<R> {
    pub fn new(cache: Arc<DiskCache>, orientation: Orientation, registry: Arc<StarRegistry>) -> Self {
        DbManager {
            cache,
            index: HierarchyIndex::new(orientation),
            registry,
            _record: PhantomData,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.index.orientation()
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<StarRegistry> {
        &self.registry
    }

    pub fn folder_path_of(&self, record: &R) -> Result<FolderPath> {
        self.index.folder_path_of(record)
    }

    /// Add or replace a record; returns the folder it was placed in
    pub fn add(&self, record: &R) -> Result<FolderPath> {
        let path = self.index.folder_path_of(record)?;
        let key = record.identity_key();
        let folder = self.cache.attach(&path)?;
        let replaced = folder.write().insert(key.clone(), record.to_element()).is_some();
        self.cache.mark_dirty(&path);

        debug!(
            "{} {} in {}",
            if replaced { "Replaced" } else { "Added" },
            key,
            path
        );
        Ok(path)
    }

    /// Remove a record; `false` if it was not stored
    pub fn remove(&self, record: &R) -> Result<bool> {
        let path = self.index.folder_path_of(record)?;
        let key = record.identity_key();
        let folder = self.cache.get_folder(&path)?;
        let removed = folder.write().remove(&key).is_some();
        if removed {
            self.cache.mark_dirty(&path);
            debug!("Removed {} from {}", key, path);
        }
        Ok(removed)
    }

    /// Point lookup by folder and identity key
    ///
    /// A stored document that does not decode is an error here, unlike in
    /// listings. That includes a file under `key`'s name which could not be
    /// parsed when the folder was loaded.
    pub fn get(&self, path: &FolderPath, key: &str) -> Result<Option<R>> {
        let folder = self.cache.get_folder(path)?;
        let element = folder.read().get(key).cloned();
        if let Some(element) = element {
            return R::from_element(&element, &self.registry).map(Some);
        }

        let file_name = self.cache.document_file_name(key)?;
        match self.unreadable_in(path)?.into_iter().find(|d| d.file_name == file_name) {
            Some(doc) => Err(StoreError::decode(format!("{}/{}", path, doc.file_name), doc.reason)),
            None => Ok(None),
        }
    }

    /// Files of `path` that failed to parse when the folder was loaded
    pub fn unreadable_in(&self, path: &FolderPath) -> Result<Vec<UnreadableDocument>> {
        let folder = self.cache.get_folder(path)?;
        let unreadable = folder.read().unreadable().to_vec();
        Ok(unreadable)
    }

    /// True if a record with the same identity is stored where `record` belongs
    pub fn contains(&self, record: &R) -> Result<bool> {
        let path = self.index.folder_path_of(record)?;
        let folder = self.cache.get_folder(&path)?;
        let found = folder.read().contains(&record.identity_key());
        Ok(found)
    }

    /// Cursor over the records of one folder
    pub fn accessor(&self, path: &FolderPath, mode: NegativeMode) -> Result<Accessor<R>> {
        let path = self.index.normalize(path)?;
        let folder = self.cache.get_folder(&path)?;
        Ok(Accessor::new(path, folder, Arc::clone(&self.registry), mode))
    }

    /// Every readable record of a folder
    ///
    /// Documents that fail to decode are reported to `observer` one by one
    /// and left out; the listing itself only fails on I/O errors.
    pub fn records_in(
        &self,
        path: &FolderPath,
        mode: NegativeMode,
        observer: &mut dyn OperationObserver,
    ) -> Result<Vec<R>> {
        let mut accessor = self.accessor(path, mode)?;
        let mut records = Vec::new();
        let mut index = 0usize;

        loop {
            match accessor.get_next_element() {
                Ok(Some(record)) => records.push(record),
                Ok(None) => break,
                Err(e) if e.is_decode() => {
                    let name = accessor.last_visited().unwrap_or_default().to_string();
                    warn!("Skipping {} in {}: {}", name, accessor.path(), e);
                    let item = ItemRef::new(index, name).in_folder(accessor.path().clone());
                    observer.notify_failed(&item, &e);
                }
                Err(e) => return Err(e),
            }
            index += 1;
        }

        Ok(records)
    }

    /// Children of a partial `[year, month, day]` path
    ///
    /// # Errors
    ///
    /// `WrongOrientation` on a path-oriented manager.
    pub fn get_date_oriented_folders(&self, partial: &FolderPath) -> Result<Vec<String>> {
        self.require(Orientation::Date)?;
        self.index.list_children(&self.cache, partial)
    }

    /// Children of a partial `[category, catalog, ...]` path
    ///
    /// # Errors
    ///
    /// `WrongOrientation` on a date-oriented manager.
    pub fn get_path_oriented_folders(&self, partial: &FolderPath) -> Result<Vec<String>> {
        self.require(Orientation::Path)?;
        self.index.list_children(&self.cache, partial)
    }

    /// Write back dirty folders on `path`'s ancestry
    pub fn flush(&self, path: &FolderPath) -> Result<usize> {
        self.cache.flush(path)
    }

    /// Write back every dirty folder of this manager
    pub fn flush_all(&self) -> Result<usize> {
        self.cache.flush_all()
    }

    fn require(&self, expected: Orientation) -> Result<()> {
        let actual = self.orientation();
        if actual != expected {
            return Err(StoreError::WrongOrientation {
                expected: expected.as_str(),
                actual: actual.as_str(),
            });
        }
        Ok(())
    }
}

impl<R: Record> std::fmt::Debug for DbManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager")
            .field("record", &R::ELEMENT)
            .field("orientation", &self.orientation())
            .field("root", &self.cache.root())
            .finish()
    }
}
