//! Star sources for identification
//!
//! A [`StarStream`] supplies the query stars of a run; a [`CatalogReader`]
//! answers "which reference stars are in this field". Readers for external
//! catalogs implement [`CatalogReader`]; this module ships an in-memory one
//! and one backed by the catalog part of a store.

use crate::core::folder::FolderPath;
use crate::core::geom::Coor;
use crate::core::manager::CatalogDbManager;
use crate::core::record::{CatalogStar, NegativeMode};
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Reference source queried by field of view
pub trait CatalogReader: Send {
    /// Start reading the stars within `fov_deg / 2` of `center`
    fn open(&mut self, center: &Coor, fov_deg: f64) -> Result<()>;

    /// Next star of the open field, `Ok(None)` when exhausted
    fn read_next(&mut self) -> Result<Option<CatalogStar>>;

    fn close(&mut self);

    /// Largest astrometric error of any star in this source
    fn max_position_error_arcsec(&self) -> f64;
}

/// Query stars of an identification run
pub trait StarStream: Send {
    /// Next star; an `Err` item is a star that could not be read
    fn next_star(&mut self) -> Option<Result<CatalogStar>>;

    /// Largest astrometric error of any star in this stream
    fn max_position_error_arcsec(&self) -> f64;
}

/// [`StarStream`] over any iterator of stars, such as an [`Accessor`]
///
/// [`Accessor`]: crate::core::accessor::Accessor
#[derive(Debug)]
pub struct QueryStars<I> {
    stars: I,
    max_error_arcsec: f64,
}

impl<I> QueryStars<I>
where
    I: Iterator<Item = Result<CatalogStar>> + Send,
{
    pub fn new(stars: I, max_error_arcsec: f64) -> Self {
        QueryStars {
            stars,
            max_error_arcsec,
        }
    }
}

impl QueryStars<std::vec::IntoIter<Result<CatalogStar>>> {
    /// Stream over known-good stars; the maximum error is taken from them
    pub fn from_stars(stars: Vec<CatalogStar>, default_error_arcsec: f64) -> Self {
        let max_error_arcsec = max_error(&stars, default_error_arcsec);
        let items: Vec<Result<CatalogStar>> = stars.into_iter().map(Ok).collect();
        QueryStars {
            stars: items.into_iter(),
            max_error_arcsec,
        }
    }
}

impl<I> StarStream for QueryStars<I>
where
    I: Iterator<Item = Result<CatalogStar>> + Send,
{
    fn next_star(&mut self) -> Option<Result<CatalogStar>> {
        self.stars.next()
    }

    fn max_position_error_arcsec(&self) -> f64 {
        self.max_error_arcsec
    }
}

fn max_error(stars: &[CatalogStar], default_error_arcsec: f64) -> f64 {
    stars
        .iter()
        .map(|s| s.position_error_arcsec.unwrap_or(default_error_arcsec))
        .fold(default_error_arcsec, f64::max)
}

/// Reference catalog held in memory
#[derive(Debug, Clone)]
pub struct MemoryCatalogReader {
    stars: Vec<CatalogStar>,
    max_error_arcsec: f64,
    field: VecDeque<CatalogStar>,
}

impl MemoryCatalogReader {
    /// `default_error_arcsec` stands in for stars without their own error
    pub fn new(stars: Vec<CatalogStar>, default_error_arcsec: f64) -> Self {
        let max_error_arcsec = max_error(&stars, default_error_arcsec);
        MemoryCatalogReader {
            stars,
            max_error_arcsec,
            field: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

impl CatalogReader for MemoryCatalogReader {
    fn open(&mut self, center: &Coor, fov_deg: f64) -> Result<()> {
        let radius = fov_deg / 2.0;
        self.field = self
            .stars
            .iter()
            .filter(|s| s.position.distance_deg(center) <= radius)
            .cloned()
            .collect();
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<CatalogStar>> {
        Ok(self.field.pop_front())
    }

    fn close(&mut self) {
        self.field.clear();
    }

    fn max_position_error_arcsec(&self) -> f64 {
        self.max_error_arcsec
    }
}

/// Reference catalog read from a store subtree
///
/// Every `open` walks the folders below the root path; stars are decoded in
/// the given negative mode. Documents that fail to decode are skipped and
/// logged.
#[derive(Debug)]
pub struct StoreCatalogReader {
    manager: Arc<CatalogDbManager>,
    root: FolderPath,
    mode: NegativeMode,
    max_error_arcsec: f64,
    field: VecDeque<CatalogStar>,
}

impl StoreCatalogReader {
    pub fn new(manager: Arc<CatalogDbManager>, root: FolderPath, max_error_arcsec: f64) -> Self {
        StoreCatalogReader {
            manager,
            root,
            mode: NegativeMode::Except,
            max_error_arcsec,
            field: VecDeque::new(),
        }
    }

    pub fn with_mode(mut self, mode: NegativeMode) -> Self {
        self.mode = mode;
        self
    }
}

impl CatalogReader for StoreCatalogReader {
    fn open(&mut self, center: &Coor, fov_deg: f64) -> Result<()> {
        let stars = self
            .manager
            .stars_within(&self.root, center, fov_deg / 2.0, self.mode, &mut ())?;
        debug!("Opened {} stars below {}", stars.len(), self.root);
        self.field = stars.into();
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<CatalogStar>> {
        Ok(self.field.pop_front())
    }

    fn close(&mut self) {
        self.field.clear();
    }

    fn max_position_error_arcsec(&self) -> f64 {
        self.max_error_arcsec
    }
}
