//! Registry of star factories keyed by catalog name
//!
//! Stored star documents only name their catalog. The registry maps that
//! name to a factory that checks the catalog's designation rules and builds
//! the typed [`CatalogStar`]. The built-in catalogs are registered when the
//! registry is created; applications add their own with [`StarRegistry::register`].

use super::star::{CatalogStar, StarKind};
use super::Record;
use crate::core::element::Element;
use crate::core::geom::Coor;
use crate::error::{Result, StoreError};
use std::collections::HashMap;
use tracing::debug;

/// Builds a star from its stored element
pub type StarFactory = fn(&Element) -> Result<CatalogStar>;

/// Catalog name -> factory
#[derive(Clone)]
pub struct StarRegistry {
    factories: HashMap<String, StarFactory>,
}

fn decode_built_in(element: &Element) -> Result<CatalogStar> {
    let catalog = element.attr("catalog").unwrap_or_default();
    let kind = StarKind::from_catalog_name(catalog);
    let star = CatalogStar::decode_common(element, kind)?;
    // Designation must follow the catalog's format
    kind.structural_subfolders(&star.name)
        .map_err(|e| StoreError::decode(star.identity_key(), e.to_string()))?;
    Ok(star)
}

fn decode_custom(element: &Element) -> Result<CatalogStar> {
    CatalogStar::decode_common(element, StarKind::Custom)
}

impl StarRegistry {
    /// Registry with every built-in catalog
    pub fn new() -> Self {
        let mut registry = StarRegistry {
            factories: HashMap::new(),
        };
        for kind in StarKind::BUILT_IN {
            if let Some(name) = kind.catalog_name() {
                registry.factories.insert(name.to_string(), decode_built_in);
            }
        }
        registry
    }

    /// Registry that knows no catalog at all
    pub fn empty() -> Self {
        StarRegistry {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for a catalog
    pub fn register(&mut self, catalog: impl Into<String>, factory: StarFactory) {
        let catalog = catalog.into();
        debug!("Registering star factory for catalog '{}'", catalog);
        self.factories.insert(catalog, factory);
    }

    /// Register a catalog with free-form designations
    pub fn register_custom(&mut self, catalog: impl Into<String>) {
        self.register(catalog, decode_custom);
    }

    pub fn contains(&self, catalog: &str) -> bool {
        self.factories.contains_key(catalog)
    }

    /// Registered catalog names, ascending
    pub fn catalogs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode a stored star element
    ///
    /// # Errors
    ///
    /// `UnknownCatalog` when no factory is registered for the element's
    /// catalog, `Decode` when the factory rejects it.
    pub fn decode(&self, element: &Element) -> Result<CatalogStar> {
        element.expect_name(CatalogStar::ELEMENT, "star document")?;
        let catalog = element.required_attr("catalog", "star document")?;
        let factory = self
            .factories
            .get(catalog)
            .ok_or_else(|| StoreError::UnknownCatalog(catalog.to_string()))?;
        factory(element)
    }

    /// Create a star for a registered catalog, checking its designation
    pub fn create(
        &self,
        catalog: &str,
        name: impl Into<String>,
        position: Coor,
    ) -> Result<CatalogStar> {
        let star = CatalogStar::new(catalog, name, position);
        // Same checks as reading it back
        self.decode(&star.to_element())?;
        Ok(star)
    }
}

impl Default for StarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StarRegistry")
            .field("catalogs", &self.catalogs())
            .finish()
    }
}
