//! Image information manager (date-oriented)

use super::DbManager;
use crate::core::cache::DiskCache;
use crate::core::folder::FolderPath;
use crate::core::hierarchy::Orientation;
use crate::core::observer::OperationObserver;
use crate::core::record::{ImageInformation, NegativeMode, Record, StarRegistry};
use crate::error::Result;
use chrono::{Datelike, NaiveDate};
use std::ops::Deref;
use std::sync::Arc;

/// Image metadata stored under `[YYYY, MM, DD]` of the observation date
#[derive(Debug)]
pub struct InformationDbManager {
    inner: DbManager<ImageInformation>,
}

impl InformationDbManager {
    pub fn new(cache: Arc<DiskCache>, registry: Arc<StarRegistry>) -> Self {
        InformationDbManager {
            inner: DbManager::new(cache, Orientation::Date, registry),
        }
    }

    /// Stored information for the same image file: zero or one record
    pub fn get_elements(&self, image: &ImageInformation) -> Result<Vec<ImageInformation>> {
        let path = self.inner.folder_path_of(image)?;
        let key = image.identity_key();
        let records = self.inner.records_in(&path, NegativeMode::Accept, &mut ())?;
        Ok(records
            .into_iter()
            .filter(|r| r.identity_key() == key)
            .collect())
    }

    /// Images observed on `date` (UTC)
    pub fn get_images_on(
        &self,
        date: NaiveDate,
        mode: NegativeMode,
        observer: &mut dyn OperationObserver,
    ) -> Result<Vec<ImageInformation>> {
        let path = FolderPath::new([
            format!("{:04}", date.year()),
            format!("{:02}", date.month()),
            format!("{:02}", date.day()),
        ])?;
        self.inner.records_in(&path, mode, observer)
    }

    pub fn add_image(&self, image: &ImageInformation) -> Result<FolderPath> {
        self.inner.add(image)
    }
}

impl Deref for InformationDbManager {
    type Target = DbManager<ImageInformation>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
