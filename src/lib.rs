//! # StarDB - Folder-Keyed Astronomical Record Store
//!
//! `stardb-rs` stores catalog stars, magnitude observations and image
//! information as documents in a directory tree, with a write-back cache in
//! front of it and a cross-catalog identification engine on top:
//!
//! - **Hierarchical store**: folders keyed by catalog path or observation date
//! - **Write-back cache**: changes are kept in memory until an explicit flush
//! - **Lazy tree listing**: one folder read per expanded tree node
//! - **Identification**: angular-distance matching with per-star error radii
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stardb_rs::{CatalogStar, Coor, NegativeMode, Result, StarDatabase};
//!
//! # fn main() -> Result<()> {
//! let db = StarDatabase::open("/data/stardb")?;
//!
//! let star = CatalogStar::new("Tycho-2", "4774-934-1", Coor::new(83.82, -5.39)).with_magnitude(10.2);
//! db.catalog().add_star(&star)?;
//!
//! let stars = db
//!     .catalog()
//!     .get_stars("Stars", "Tycho-2", &["4774".to_string()], NegativeMode::Except, &mut ())?;
//!
//! // Nothing is on disk until this returns
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability
//!
//! [`StarDatabase::flush_all`] (or [`StarDatabase::close`]) is the only point
//! at which changes reach the disk. There is no write-ahead log and dropping
//! a database does not flush: anything written after the last flush is lost
//! if the process ends without one. Only one process may use a store root
//! at a time.

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::StoreConfig;
pub use crate::core::{
    accessor::Accessor,
    batch::{ImportSummary, Importer, RunState, StopHandle},
    cache::{CacheStats, DiskCache, DiskLayout},
    element::{Document, Element, JsonCodec, RecordCodec},
    folder::FolderPath,
    geom::Coor,
    hierarchy::{HierarchyIndex, Orientation},
    identify::{
        spawn_identification, IdentificationSummary, IdentificationTask, Identifier, MagnitudeWriter,
        MatchResult, MatchSink,
    },
    manager::{CatalogDbManager, DbManager, InformationDbManager, MagnitudeDbManager},
    observer::{
        ChannelObserver, EventLog, ItemRef, MemoryMonitor, Monitor, OperationEvent, OperationObserver,
        TracingMonitor,
    },
    reader::{CatalogReader, MemoryCatalogReader, QueryStars, StarStream, StoreCatalogReader},
    record::{
        CatalogStar, ImageInformation, MagnitudeRecord, NegativeMode, Record, StarKind, StarRef,
        StarRegistry,
    },
};
pub use crate::error::{Result, StoreError};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One store root with its three managers
///
/// Each manager has its own cache over its own sub-root. All of them share
/// one [`StarRegistry`].
///
/// # Examples
///
/// ```rust,no_run
/// use stardb_rs::{FolderPath, StarDatabase};
///
/// # fn main() -> stardb_rs::Result<()> {
/// let db = StarDatabase::open("/data/stardb")?;
/// let years = db.information().get_date_oriented_folders(&FolderPath::root())?;
/// for year in years {
///     println!("{}", year);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StarDatabase {
    config: StoreConfig,
    registry: Arc<StarRegistry>,
    catalog: Arc<CatalogDbManager>,
    magnitude: Arc<MagnitudeDbManager>,
    information: Arc<InformationDbManager>,
}

impl StarDatabase {
    /// Open the store at `root` with default settings
    ///
    /// Nothing is read until a folder is first accessed; a root that does
    /// not exist yet is an empty store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        DatabaseBuilder::new().root(root).build()
    }

    /// Open with an explicit configuration
    pub fn open_with(config: StoreConfig) -> Result<Self> {
        DatabaseBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StarRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<CatalogDbManager> {
        &self.catalog
    }

    pub fn magnitude(&self) -> &Arc<MagnitudeDbManager> {
        &self.magnitude
    }

    pub fn information(&self) -> &Arc<InformationDbManager> {
        &self.information
    }

    /// Reference reader over one catalog of this store
    ///
    /// Uses the configured default position error as the catalog's maximum.
    pub fn catalog_reader(&self, category: &str, catalog: &str) -> Result<StoreCatalogReader> {
        Ok(StoreCatalogReader::new(
            Arc::clone(&self.catalog),
            FolderPath::new([category, catalog])?,
            self.config.default_position_error_arcsec,
        ))
    }

    /// Write back every dirty folder of every manager
    ///
    /// Returns the number of folders written. Safe to call again after an
    /// error: folders that were not written stay dirty.
    pub fn flush_all(&self) -> Result<usize> {
        let written =
            self.catalog.flush_all()? + self.magnitude.flush_all()? + self.information.flush_all()?;
        info!(
            "Flushed {} folders to {}",
            written,
            self.config.root.display()
        );
        Ok(written)
    }

    /// Flush everything and release the store
    pub fn close(self) -> Result<()> {
        self.flush_all()?;
        debug!("Closed database at {}", self.config.root.display());
        Ok(())
    }
}

/// Builder for [`StarDatabase`]
///
/// # Examples
///
/// ```rust,no_run
/// use stardb_rs::{DatabaseBuilder, StarRegistry};
///
/// # fn main() -> stardb_rs::Result<()> {
/// let mut registry = StarRegistry::new();
/// registry.register_custom("Local Survey");
///
/// let db = DatabaseBuilder::new()
///     .root("/data/stardb")
///     .registry(registry)
///     .without_manifests()
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DatabaseBuilder {
    root: Option<PathBuf>,
    config: Option<StoreConfig>,
    registry: Option<StarRegistry>,
    codec: Option<Arc<dyn RecordCodec>>,
    write_manifests: Option<bool>,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        DatabaseBuilder {
            root: None,
            config: None,
            registry: None,
            codec: None,
            write_manifests: None,
        }
    }

    /// Store root; overrides the root of a configuration
    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registry to decode stars with (defaults to the built-in catalogs)
    pub fn registry(mut self, registry: StarRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Document codec (defaults to [`JsonCodec`])
    pub fn codec(mut self, codec: Arc<dyn RecordCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Do not write per-folder manifests on flush
    pub fn without_manifests(mut self) -> Self {
        self.write_manifests = Some(false);
        self
    }

    pub fn build(self) -> Result<StarDatabase> {
        let mut config = match (self.config, self.root) {
            (Some(mut config), Some(root)) => {
                config.root = root;
                config
            }
            (Some(config), None) => config,
            (None, Some(root)) => StoreConfig::new(root),
            (None, None) => {
                return Err(StoreError::Config("root or config must be set".to_string()));
            }
        };
        if let Some(write_manifests) = self.write_manifests {
            config.write_manifests = write_manifests;
        }
        config.check()?;

        info!("Opening star database at {}", config.root.display());

        let registry = Arc::new(self.registry.unwrap_or_default());
        let codec: Arc<dyn RecordCodec> = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));
        let cache = |root: PathBuf| Arc::new(DiskCache::with_codec(root, Arc::clone(&codec), config.layout()));

        let catalog = Arc::new(CatalogDbManager::new(
            cache(config.catalog_root()),
            Arc::clone(&registry),
        ));
        let magnitude = Arc::new(MagnitudeDbManager::new(
            cache(config.magnitude_root()),
            Arc::clone(&registry),
        ));
        let information = Arc::new(InformationDbManager::new(
            cache(config.information_root()),
            Arc::clone(&registry),
        ));
        debug!("Registered catalogs: {:?}", registry.catalogs());

        Ok(StarDatabase {
            config,
            registry,
            catalog,
            magnitude,
            information,
        })
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
