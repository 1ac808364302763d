//! Error types for store and identification operations

use thiserror::Error;

/// Store operation result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store operation errors
///
/// Only [`StoreError::Io`] is fatal to a batch run. Decode failures are
/// reported per item and the batch carries on; a missing folder or record is
/// never an error at all (empty results).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Disk read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document cannot be turned into its record type
    #[error("Failed to decode {item}: {reason}")]
    Decode { item: String, reason: String },

    /// No factory is registered for the catalog named in a document
    #[error("Unknown catalog: {0}")]
    UnknownCatalog(String),

    /// Encoding a document failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Folder segment is empty or carries a malformed escape
    #[error("Invalid folder segment: {0}")]
    InvalidSegment(String),

    /// The record lacks the field its folder orientation is derived from
    #[error("Record {0} has no folder key for this orientation")]
    MissingFolderKey(String),

    /// Date listing on a path-oriented manager or the other way around
    #[error("Operation requires {expected} orientation, manager is {actual}")]
    WrongOrientation {
        expected: &'static str,
        actual: &'static str,
    },

    /// Operation is not valid in the current run state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cooperative stop was requested
    #[error("Operation cancelled")]
    Cancelled,

    /// Folder manifest was written by a newer format
    #[error("Unsupported folder manifest version: {0}")]
    UnsupportedVersion(semver::Version),

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Build a decode error for a named item
    pub fn decode(item: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Decode {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// I/O errors end a batch run; everything else is reported per item
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }

    /// True for every error that means "this document is not a known record"
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            StoreError::Decode { .. }
                | StoreError::UnknownCatalog(_)
                | StoreError::UnsupportedVersion(_)
        )
    }
}
