//! Catalog star manager (path-oriented)

use super::DbManager;
use crate::core::cache::DiskCache;
use crate::core::folder::FolderPath;
use crate::core::geom::Coor;
use crate::core::hierarchy::Orientation;
use crate::core::observer::OperationObserver;
use crate::core::record::{CatalogStar, NegativeMode, Record, StarRegistry};
use crate::error::Result;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Stars stored under `[category, catalog, subfolders...]`
#[derive(Debug)]
pub struct CatalogDbManager {
    inner: DbManager<CatalogStar>,
}

impl CatalogDbManager {
    pub fn new(cache: Arc<DiskCache>, registry: Arc<StarRegistry>) -> Self {
        CatalogDbManager {
            inner: DbManager::new(cache, Orientation::Path, registry),
        }
    }

    /// Stored versions of `star`: zero or one record
    pub fn get_elements(&self, star: &CatalogStar) -> Result<Vec<CatalogStar>> {
        let path = self.inner.folder_path_of(star)?;
        Ok(self.inner.get(&path, &star.identity_key())?.into_iter().collect())
    }

    /// Stars of one catalog folder
    ///
    /// Entries that do not decode into a registered catalog are reported to
    /// `observer` and skipped.
    pub fn get_stars(
        &self,
        category: &str,
        catalog: &str,
        subfolders: &[String],
        mode: NegativeMode,
        observer: &mut dyn OperationObserver,
    ) -> Result<Vec<CatalogStar>> {
        let mut segments = vec![category.to_string(), catalog.to_string()];
        segments.extend(subfolders.iter().cloned());
        let path = FolderPath::new(segments)?;
        self.inner.records_in(&path, mode, observer)
    }

    /// Point lookup of a star placed the default way for its catalog
    pub fn get_star(&self, catalog: &str, name: &str) -> Result<Option<CatalogStar>> {
        let path = FolderPath::new(CatalogStar::default_catalog_path(catalog, name))?;
        self.inner.get(&path, &format!("{}:{}", catalog, name))
    }

    pub fn add_star(&self, star: &CatalogStar) -> Result<FolderPath> {
        self.inner.add(star)
    }

    /// Every star below `partial` within `radius_deg` of `center`
    ///
    /// Walks the subtree folder by folder; decode failures go to `observer`.
    pub fn stars_within(
        &self,
        partial: &FolderPath,
        center: &Coor,
        radius_deg: f64,
        mode: NegativeMode,
        observer: &mut dyn OperationObserver,
    ) -> Result<Vec<CatalogStar>> {
        let mut found = Vec::new();
        let mut pending = vec![partial.clone()];
        let mut visited = 0usize;

        while let Some(path) = pending.pop() {
            visited += 1;
            for star in self.inner.records_in(&path, mode, observer)? {
                if star.position.distance_deg(center) <= radius_deg {
                    found.push(star);
                }
            }
            for child in self.inner.get_path_oriented_folders(&path)?.into_iter().rev() {
                pending.push(path.child(child)?);
            }
        }

        debug!(
            "Found {} stars within {:.6} deg of ({:.5}, {:.5}) in {} folders",
            found.len(),
            radius_deg,
            center.ra,
            center.dec,
            visited
        );
        Ok(found)
    }
}

impl Deref for CatalogDbManager {
    type Target = DbManager<CatalogStar>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
