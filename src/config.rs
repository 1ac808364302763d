//! Store configuration
//!
//! ```toml
//! root = "/data/stardb"
//! default_position_error_arcsec = 1.5
//! write_manifests = true
//! ```

use crate::core::cache::DiskLayout;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use validator::Validate;

fn default_catalog_dir() -> String {
    "catalog".to_string()
}

fn default_magnitude_dir() -> String {
    "magnitude".to_string()
}

fn default_information_dir() -> String {
    "information".to_string()
}

fn default_position_error() -> f64 {
    1.0
}

fn default_max_file_name_len() -> usize {
    120
}

fn default_true() -> bool {
    true
}

/// Where the store lives and how it is laid out on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// Database root directory
    pub root: PathBuf,

    #[serde(default = "default_catalog_dir")]
    #[validate(length(min = 1))]
    pub catalog_dir: String,

    #[serde(default = "default_magnitude_dir")]
    #[validate(length(min = 1))]
    pub magnitude_dir: String,

    #[serde(default = "default_information_dir")]
    #[validate(length(min = 1))]
    pub information_dir: String,

    /// Error radius for stars that carry none, in arcsec
    #[serde(default = "default_position_error")]
    #[validate(range(exclusive_min = 0.0))]
    pub default_position_error_arcsec: f64,

    /// Longest document file name before it is shortened with a hash
    #[serde(default = "default_max_file_name_len")]
    #[validate(range(min = 32, max = 255))]
    pub max_file_name_len: usize,

    #[serde(default = "default_true")]
    pub write_manifests: bool,
}

impl StoreConfig {
    /// Defaults for a store at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StoreConfig {
            root: root.into(),
            catalog_dir: default_catalog_dir(),
            magnitude_dir: default_magnitude_dir(),
            information_dir: default_information_dir(),
            default_position_error_arcsec: default_position_error(),
            max_file_name_len: default_max_file_name_len(),
            write_manifests: true,
        }
    }

    /// Parse and validate TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Run field validation, mapping failures to `StoreError::Config`
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        for dir in [&self.catalog_dir, &self.magnitude_dir, &self.information_dir] {
            if dir.contains(['/', '\\']) || dir == "." || dir == ".." {
                return Err(StoreError::Config(format!(
                    "'{}' must be a single directory name",
                    dir
                )));
            }
        }
        Ok(())
    }

    pub fn catalog_root(&self) -> PathBuf {
        self.root.join(&self.catalog_dir)
    }

    pub fn magnitude_root(&self) -> PathBuf {
        self.root.join(&self.magnitude_dir)
    }

    pub fn information_root(&self) -> PathBuf {
        self.root.join(&self.information_dir)
    }

    pub fn layout(&self) -> DiskLayout {
        DiskLayout {
            max_file_name_len: self.max_file_name_len,
            write_manifests: self.write_manifests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() -> Result<()> {
        let config = StoreConfig::from_toml_str(r#"root = "/data/stardb""#)?;
        assert_eq!(config, StoreConfig::new("/data/stardb"));
        assert_eq!(config.catalog_root(), PathBuf::from("/data/stardb/catalog"));
        assert_eq!(config.layout(), DiskLayout::default());
        Ok(())
    }

    #[test]
    fn test_rejects_out_of_range() {
        let zero_error = "root = \"/x\"\ndefault_position_error_arcsec = 0.0";
        assert!(matches!(
            StoreConfig::from_toml_str(zero_error),
            Err(StoreError::Config(_))
        ));

        let short_names = "root = \"/x\"\nmax_file_name_len = 8";
        assert!(StoreConfig::from_toml_str(short_names).is_err());

        let nested_dir = "root = \"/x\"\ncatalog_dir = \"a/b\"";
        assert!(StoreConfig::from_toml_str(nested_dir).is_err());
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let mut config = StoreConfig::new("/data/stardb");
        config.write_manifests = false;
        config.default_position_error_arcsec = 2.5;
        let parsed = StoreConfig::from_toml_str(&config.to_toml_string()?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let file = dir.path().join("stardb.toml");
        fs::write(&file, "root = \"/obs\"\nmagnitude_dir = \"phot\"\n")?;
        let config = StoreConfig::load(&file)?;
        assert_eq!(config.magnitude_root(), PathBuf::from("/obs/phot"));
        Ok(())
    }
}
