//! Folder key derivation and tree listing
//!
//! A [`HierarchyIndex`] maps a record to its [`FolderPath`] and lists the
//! children of a partial path. Date-oriented paths are `[YYYY, MM, DD]`;
//! path-oriented paths are `[category, catalog, structural segments...]`.

use crate::core::cache::DiskCache;
use crate::core::folder::FolderPath;
use crate::core::record::Record;
use crate::error::{Result, StoreError};
use chrono::Datelike;
use std::cmp::Ordering;
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// How folder paths are derived for one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// `[year, month, day]` of the observation date
    Date,
    /// `[category, catalog, subfolders...]`
    Path,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Date => "date",
            Orientation::Path => "path",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full month name for a `MM` segment ("03" -> "March")
pub fn month_label(segment: &str) -> Option<&'static str> {
    let month: usize = segment.parse().ok()?;
    MONTH_NAMES.get(month.checked_sub(1)?).copied()
}

/// `MM` segment for a month label or numeric month ("March" -> "03")
pub fn month_segment(label: &str) -> Option<String> {
    if let Some(idx) = MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(label))
    {
        return Some(format!("{:02}", idx + 1));
    }
    match label.parse::<u32>() {
        Ok(month @ 1..=12) => Some(format!("{:02}", month)),
        _ => None,
    }
}

/// Maps records to folder paths in one orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyIndex {
    orientation: Orientation,
}

impl HierarchyIndex {
    pub fn new(orientation: Orientation) -> Self {
        HierarchyIndex { orientation }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Folder path of a record
    ///
    /// Pure function of the record. Fails with `MissingFolderKey` if the
    /// record lacks the field this orientation needs.
    pub fn folder_path_of<R: Record>(&self, record: &R) -> Result<FolderPath> {
        let key = record.folder_key();
        match self.orientation {
            Orientation::Date => {
                let date = key
                    .date
                    .ok_or_else(|| StoreError::MissingFolderKey(record.identity_key()))?;
                FolderPath::new([
                    format!("{:04}", date.year()),
                    format!("{:02}", date.month()),
                    format!("{:02}", date.day()),
                ])
            }
            Orientation::Path => {
                let path = key
                    .path
                    .ok_or_else(|| StoreError::MissingFolderKey(record.identity_key()))?;
                FolderPath::new(path)
            }
        }
    }

    /// Convert a path as shown in a tree back to its key form
    ///
    /// Month labels at depth 1 of a date path become `MM` again, so
    /// `["2024", "March"]` resolves the same folder as `["2024", "03"]`.
    pub fn normalize(&self, partial: &FolderPath) -> Result<FolderPath> {
        if self.orientation != Orientation::Date || partial.depth() < 2 {
            return Ok(partial.clone());
        }

        let mut segments = partial.segments().to_vec();
        if let Some(month) = month_segment(&segments[1]) {
            segments[1] = month;
        }
        FolderPath::new(segments)
    }

    /// Children of `partial`, sorted
    ///
    /// Numeric levels of date paths sort numerically, names lexicographically.
    /// Listing the years of a date store returns `["2023", "2024"]`, listing
    /// a year returns month names (`["January", "March"]`), listing a month
    /// returns `["01", "15"]`. Only `partial` itself is read, never its
    /// descendants.
    pub fn list_children(&self, cache: &DiskCache, partial: &FolderPath) -> Result<Vec<String>> {
        let path = self.normalize(partial)?;
        let mut children = cache.list_children(&path)?;

        match self.orientation {
            Orientation::Date => {
                children.sort_by(|a, b| compare_numeric(a, b));
                if path.depth() == 1 {
                    children = children
                        .into_iter()
                        .map(|c| month_label(&c).map(str::to_string).unwrap_or(c))
                        .collect();
                }
            }
            Orientation::Path => children.sort(),
        }

        Ok(children)
    }
}

/// Numeric order where both sides parse, lexicographic otherwise
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
