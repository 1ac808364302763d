//! Record kinds held by the store
//!
//! The store itself treats every record as a document with a folder key and
//! an identity key. The [`Record`] trait is the bridge between the typed
//! records below and those documents.

pub mod information;
pub mod magnitude;
pub mod registry;
pub mod star;

pub use information::ImageInformation;
pub use magnitude::{MagnitudeRecord, StarRef};
pub use registry::{StarFactory, StarRegistry};
pub use star::{CatalogStar, StarKind};

use crate::core::element::Element;
use crate::error::Result;
use chrono::NaiveDate;
use std::fmt;

/// Fields a folder path can be derived from
///
/// Date-oriented stores use `date`, path-oriented stores use `path`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderKey {
    pub date: Option<NaiveDate>,
    /// `[category, catalog, structural segments...]`
    pub path: Option<Vec<String>>,
}

/// Whether records lacking photometric/astrometric data are included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeMode {
    /// Include negative records (fast existence checks)
    Accept,
    /// Skip negative records (real identification and photometry)
    #[default]
    Except,
}

impl NegativeMode {
    /// Whether a record passes this mode's filter
    pub fn admits<R: Record>(self, record: &R) -> bool {
        match self {
            NegativeMode::Accept => true,
            NegativeMode::Except => !record.is_negative(),
        }
    }
}

/// A record that can live in the store
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    /// Name of the root element of the record's document
    const ELEMENT: &'static str;

    /// Stable key, unique within a folder
    fn identity_key(&self) -> String;

    /// Inputs for the folder path, must not depend on anything but `self`
    fn folder_key(&self) -> FolderKey;

    /// True if the record lacks the fields needed for photometry or astrometry
    fn is_negative(&self) -> bool;

    fn to_element(&self) -> Element;

    /// Rebuild from a stored element; `registry` resolves catalog-specific kinds
    fn from_element(element: &Element, registry: &StarRegistry) -> Result<Self>;
}
