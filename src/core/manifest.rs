//! Per-folder manifest
//!
//! A small JSON file next to a folder's documents that lists its child
//! segments, so expanding a tree node costs one file read instead of a
//! directory scan. The manifest is optional: folders without one are
//! scanned, and `write_manifests = false` stops flush from writing them.

use crate::error::{Result, StoreError};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Folder manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderManifest {
    /// Manifest format version
    pub version: Version,

    /// Child segment names (raw, not escaped), ascending
    #[serde(default)]
    pub children: Vec<String>,

    /// Number of readable documents when the folder was flushed
    #[serde(default)]
    pub documents: usize,

    /// Flush timestamp (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl FolderManifest {
    /// Manifest file name inside a folder directory
    pub const FILE_NAME: &'static str = ".folder.json";

    /// Format version written by this crate
    pub const FORMAT_VERSION: Version = Version::new(1, 0, 0);

    pub fn new(children: Vec<String>, documents: usize) -> Self {
        FolderManifest {
            version: Self::FORMAT_VERSION,
            children,
            documents,
            updated: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Reject manifests from a newer major format
    pub fn validate(&self) -> Result<()> {
        if self.version.major > Self::FORMAT_VERSION.major {
            return Err(StoreError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }

    /// Read the manifest of a folder directory; `Ok(None)` if there is none
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(Self::FILE_NAME);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let manifest: FolderManifest = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::decode(path.display().to_string(), e.to_string()))?;
        manifest.validate()?;
        Ok(Some(manifest))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_manifest_is_none() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        assert!(FolderManifest::read(dir.path())?.is_none());
        Ok(())
    }

    #[test]
    fn test_write_and_read() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let manifest = FolderManifest::new(vec!["01".into(), "02".into()], 3);
        fs::write(dir.path().join(FolderManifest::FILE_NAME), manifest.to_bytes()?)?;

        let read = FolderManifest::read(dir.path())?.unwrap();
        assert_eq!(read.children, vec!["01", "02"]);
        assert_eq!(read.documents, 3);
        assert_eq!(read.version, FolderManifest::FORMAT_VERSION);
        Ok(())
    }

    #[test]
    fn test_newer_major_rejected() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let mut manifest = FolderManifest::new(Vec::new(), 0);
        manifest.version = Version::new(2, 0, 0);
        fs::write(dir.path().join(FolderManifest::FILE_NAME), manifest.to_bytes()?)?;

        match FolderManifest::read(dir.path()) {
            Err(StoreError::UnsupportedVersion(v)) => assert_eq!(v.major, 2),
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
        Ok(())
    }
}
