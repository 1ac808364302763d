//! Folder paths and the in-memory form of one folder
//!
//! A [`Folder`] is the unit of caching and disk I/O. Between flushes the
//! in-memory copy is authoritative; it remembers which documents were
//! written or removed since the last flush so write-back touches only those.

use crate::core::element::Element;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ordered list of segments identifying a folder
///
/// Segments are raw (unescaped) names; escaping happens only at the disk
/// boundary. The empty path is the root of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    /// Build a path, rejecting empty segments
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(idx) = segments.iter().position(|s| s.is_empty()) {
            return Err(StoreError::InvalidSegment(format!(
                "segment {} of {:?} is empty",
                idx, segments
            )));
        }
        Ok(FolderPath(segments))
    }

    pub fn root() -> Self {
        FolderPath(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<FolderPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(FolderPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Path extended by one segment
    pub fn child(&self, segment: impl Into<String>) -> Result<FolderPath> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(StoreError::InvalidSegment(
                "segment cannot be empty".to_string(),
            ));
        }
        let mut segments = self.0.clone();
        segments.push(segment);
        Ok(FolderPath(segments))
    }

    /// Root first, this path last
    pub fn ancestry(&self) -> Vec<FolderPath> {
        (0..=self.0.len())
            .map(|len| FolderPath(self.0[..len].to_vec()))
            .collect()
    }

    /// True if `self` is `other` or lies below it
    pub fn starts_with(&self, other: &FolderPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Document file that could not be decoded when its folder was loaded
///
/// Kept so listings can report it. Flush leaves the file alone unless a
/// record stored under the same file name replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableDocument {
    pub file_name: String,
    pub reason: String,
}

/// Records and child segment names at one folder path
#[derive(Debug, Default)]
pub struct Folder {
    documents: BTreeMap<String, Element>,
    unreadable: Vec<UnreadableDocument>,
    children: BTreeSet<String>,
    pending: BTreeSet<String>,
    removed: BTreeSet<String>,
    children_changed: bool,
}

impl Folder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folder as read from disk: nothing pending
    pub(crate) fn loaded(
        documents: BTreeMap<String, Element>,
        unreadable: Vec<UnreadableDocument>,
        children: BTreeSet<String>,
    ) -> Self {
        Folder {
            documents,
            unreadable,
            children,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.documents.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.documents.contains_key(key)
    }

    /// Insert or replace a document, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, element: Element) -> Option<Element> {
        let key = key.into();
        self.removed.remove(&key);
        self.pending.insert(key.clone());
        self.documents.insert(key, element)
    }

    pub fn remove(&mut self, key: &str) -> Option<Element> {
        let previous = self.documents.remove(key)?;
        self.pending.remove(key);
        self.removed.insert(key.to_string());
        Some(previous)
    }

    /// Identity keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.documents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn unreadable(&self) -> &[UnreadableDocument] {
        &self.unreadable
    }

    /// Child segment names in ascending order
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    /// Register a child segment; returns true if it was new
    pub fn add_child(&mut self, name: impl Into<String>) -> bool {
        let added = self.children.insert(name.into());
        self.children_changed |= added;
        added
    }

    /// True if anything changed since the folder was loaded or last flushed
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty() || !self.removed.is_empty() || self.children_changed
    }

    pub(crate) fn pending_keys(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub(crate) fn removed_keys(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    /// Drop unreadable entries whose files were overwritten by a flush
    pub(crate) fn forget_unreadable(&mut self, file_names: &[String]) {
        if !file_names.is_empty() {
            self.unreadable.retain(|d| !file_names.contains(&d.file_name));
        }
    }

    /// Forget pending changes once they are on disk
    pub(crate) fn mark_clean(&mut self) {
        self.pending.clear();
        self.removed.clear();
        self.children_changed = false;
    }
}
