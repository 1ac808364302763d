//! Magnitude record manager, filed under the measured star's catalog path

use super::DbManager;
use crate::core::cache::DiskCache;
use crate::core::folder::FolderPath;
use crate::core::hierarchy::Orientation;
use crate::core::record::{CatalogStar, MagnitudeRecord, NegativeMode, StarRegistry};
use crate::core::validation::escape_segment;
use crate::error::{Result, StoreError};
use chrono::NaiveDate;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug)]
pub struct MagnitudeDbManager {
    inner: DbManager<MagnitudeRecord>,
}

impl MagnitudeDbManager {
    pub fn new(cache: Arc<DiskCache>, registry: Arc<StarRegistry>) -> Self {
        MagnitudeDbManager {
            inner: DbManager::new(cache, Orientation::Path, registry),
        }
    }

    /// Every observation of `star`, oldest first
    ///
    /// Includes non-detections; filter with [`MagnitudeRecord::magnitude`]
    /// or use [`Self::get_measurements`]. Fails with a decode error if one of
    /// the star's own documents could not be read.
    pub fn get_elements(&self, star: &CatalogStar) -> Result<Vec<MagnitudeRecord>> {
        self.collect(star, NegativeMode::Accept)
    }

    /// Observations of `star` that carry a magnitude, oldest first
    pub fn get_measurements(&self, star: &CatalogStar) -> Result<Vec<MagnitudeRecord>> {
        self.collect(star, NegativeMode::Except)
    }

    /// Observations of `star` made on one UTC date
    pub fn get_elements_on(&self, star: &CatalogStar, date: NaiveDate) -> Result<Vec<MagnitudeRecord>> {
        let mut records = self.get_elements(star)?;
        records.retain(|r| r.observed_at.date_naive() == date);
        Ok(records)
    }

    pub fn add_record(&self, record: &MagnitudeRecord) -> Result<FolderPath> {
        self.inner.add(record)
    }

    fn collect(&self, star: &CatalogStar, mode: NegativeMode) -> Result<Vec<MagnitudeRecord>> {
        let path = FolderPath::new(star.catalog_path())?;
        // Files of other stars in the folder stay skipped; one of this star's is an error
        let own_prefix = escape_segment(&format!("{}@", star.name))?;
        if let Some(doc) = self
            .inner
            .unreadable_in(&path)?
            .into_iter()
            .find(|d| d.file_name.starts_with(&own_prefix))
        {
            return Err(StoreError::decode(format!("{}/{}", path, doc.file_name), doc.reason));
        }

        let mut records: Vec<MagnitudeRecord> = self
            .inner
            .records_in(&path, mode, &mut ())?
            .into_iter()
            .filter(|r| r.star.refers_to(star))
            .collect();
        records.sort_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.image.cmp(&b.image))
                .then_with(|| a.detection.cmp(&b.detection))
        });
        Ok(records)
    }
}

impl Deref for MagnitudeDbManager {
    type Target = DbManager<MagnitudeRecord>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
