//! Catalog stars

use super::{FolderKey, Record, StarRegistry};
use crate::core::element::Element;
use crate::core::geom::Coor;
use crate::error::{Result, StoreError};
use regex::Regex;
use std::sync::OnceLock;

/// Category used when a star is created without one
pub const DEFAULT_CATEGORY: &str = "Stars";

/// Category of stars detected on an image
pub const DETECTED_CATEGORY: &str = "Detected";

/// Catalogs the crate knows the designation format of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StarKind {
    Hipparcos,
    Tycho2,
    Ucac4,
    UsnoA2,
    /// Star measured on an image, not from a published catalog
    Detected,
    /// Registered at runtime, designation is free-form
    Custom,
}

impl StarKind {
    pub const BUILT_IN: [StarKind; 5] = [
        StarKind::Hipparcos,
        StarKind::Tycho2,
        StarKind::Ucac4,
        StarKind::UsnoA2,
        StarKind::Detected,
    ];

    /// Catalog name as stored in documents
    pub fn catalog_name(&self) -> Option<&'static str> {
        match self {
            StarKind::Hipparcos => Some("Hipparcos"),
            StarKind::Tycho2 => Some("Tycho-2"),
            StarKind::Ucac4 => Some("UCAC4"),
            StarKind::UsnoA2 => Some("USNO-A2.0"),
            StarKind::Detected => Some("Detected"),
            StarKind::Custom => None,
        }
    }

    /// Built-in kind for a catalog name, `Custom` otherwise
    pub fn from_catalog_name(name: &str) -> StarKind {
        Self::BUILT_IN
            .into_iter()
            .find(|k| k.catalog_name() == Some(name))
            .unwrap_or(StarKind::Custom)
    }

    fn pattern(&self) -> Option<&'static Regex> {
        static HIPPARCOS: OnceLock<Regex> = OnceLock::new();
        static TYCHO2: OnceLock<Regex> = OnceLock::new();
        static UCAC4: OnceLock<Regex> = OnceLock::new();
        static USNO_A2: OnceLock<Regex> = OnceLock::new();

        let (cell, pattern) = match self {
            StarKind::Hipparcos => (&HIPPARCOS, r"^(\d{1,6})$"),
            StarKind::Tycho2 => (&TYCHO2, r"^(\d{1,4})-\d{1,5}-\d$"),
            StarKind::Ucac4 => (&UCAC4, r"^(\d{3})-\d{6}$"),
            StarKind::UsnoA2 => (&USNO_A2, r"^(\d{4})-\d{8}$"),
            StarKind::Detected | StarKind::Custom => return None,
        };
        Some(cell.get_or_init(|| Regex::new(pattern).unwrap()))
    }

    pub fn default_category(&self) -> &'static str {
        match self {
            StarKind::Detected => DETECTED_CATEGORY,
            _ => DEFAULT_CATEGORY,
        }
    }

    /// Check the designation format and derive structural subfolders
    ///
    /// Large catalogs are split one level below the catalog folder: by
    /// thousands of the HIP number, by Tycho region, by UCAC4/USNO zone.
    pub fn structural_subfolders(&self, designation: &str) -> Result<Vec<String>> {
        let Some(re) = self.pattern() else {
            return Ok(Vec::new());
        };

        let caps = re.captures(designation).ok_or_else(|| {
            StoreError::decode(
                designation,
                format!(
                    "not a valid {} designation",
                    self.catalog_name().unwrap_or("catalog")
                ),
            )
        })?;

        let lead = &caps[1];
        let segment = match self {
            StarKind::Hipparcos => {
                let number: u32 = lead
                    .parse()
                    .map_err(|_| StoreError::decode(designation, "HIP number out of range"))?;
                (number / 1000).to_string()
            }
            _ => lead.to_string(),
        };
        Ok(vec![segment])
    }
}

/// A star from a catalog or detected on an image
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStar {
    pub kind: StarKind,
    pub catalog: String,
    pub category: String,
    /// Designation within the catalog
    pub name: String,
    /// Structural segments below `[category, catalog]`
    pub subfolders: Vec<String>,
    pub position: Coor,
    /// Astrometric error radius, if the catalog states one
    pub position_error_arcsec: Option<f64>,
    pub magnitude: Option<f64>,
}

impl CatalogStar {
    /// Create a star, placing it the way its catalog's kind dictates
    ///
    /// A designation that does not match a built-in catalog's format simply
    /// gets no structural subfolder; [`StarRegistry::create`] is the checked
    /// variant.
    pub fn new(catalog: impl Into<String>, name: impl Into<String>, position: Coor) -> Self {
        let catalog = catalog.into();
        let name = name.into();
        let kind = StarKind::from_catalog_name(&catalog);
        let subfolders = kind.structural_subfolders(&name).unwrap_or_default();

        CatalogStar {
            kind,
            catalog,
            category: kind.default_category().to_string(),
            name,
            subfolders,
            position,
            position_error_arcsec: None,
            magnitude: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_position_error(mut self, arcsec: f64) -> Self {
        self.position_error_arcsec = Some(arcsec);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_subfolders<I, S>(mut self, subfolders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subfolders = subfolders.into_iter().map(Into::into).collect();
        self
    }

    /// Catalog path a star created with [`CatalogStar::new`] gets
    pub fn default_catalog_path(catalog: &str, name: &str) -> Vec<String> {
        let kind = StarKind::from_catalog_name(catalog);
        let mut path = vec![kind.default_category().to_string(), catalog.to_string()];
        path.extend(kind.structural_subfolders(name).unwrap_or_default());
        path
    }

    /// Human-readable designation, e.g. "Tycho-2 1-2-1"
    pub fn designation(&self) -> String {
        format!("{} {}", self.catalog, self.name)
    }

    /// `[category, catalog, subfolders...]`
    pub fn catalog_path(&self) -> Vec<String> {
        let mut path = Vec::with_capacity(2 + self.subfolders.len());
        path.push(self.category.clone());
        path.push(self.catalog.clone());
        path.extend(self.subfolders.iter().cloned());
        path
    }

    /// Decode the fields every catalog shares; `kind` comes from the registry
    pub(crate) fn decode_common(element: &Element, kind: StarKind) -> Result<Self> {
        let item = match (element.attr("catalog"), element.attr("name")) {
            (Some(c), Some(n)) => format!("{}:{}", c, n),
            _ => format!("<{}>", element.name),
        };
        element.expect_name(Self::ELEMENT, &item)?;

        let position = Coor::new(
            element.parse_required("ra", &item)?,
            element.parse_required("dec", &item)?,
        );

        Ok(CatalogStar {
            kind,
            catalog: element.required_attr("catalog", &item)?.to_string(),
            category: element
                .attr("category")
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            name: element.required_attr("name", &item)?.to_string(),
            subfolders: element
                .children_named("folder")
                .filter_map(|f| f.text.clone())
                .collect(),
            position,
            position_error_arcsec: element.parse_attr("error", &item)?,
            magnitude: element.parse_attr("mag", &item)?,
        })
    }
}

impl Record for CatalogStar {
    const ELEMENT: &'static str = "star";

    fn identity_key(&self) -> String {
        format!("{}:{}", self.catalog, self.name)
    }

    fn folder_key(&self) -> FolderKey {
        FolderKey {
            date: None,
            path: Some(self.catalog_path()),
        }
    }

    fn is_negative(&self) -> bool {
        self.magnitude.is_none()
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new(Self::ELEMENT)
            .with_attr("catalog", &self.catalog)
            .with_attr("category", &self.category)
            .with_attr("name", &self.name)
            .with_attr("ra", self.position.ra)
            .with_attr("dec", self.position.dec)
            .with_opt_attr("error", self.position_error_arcsec)
            .with_opt_attr("mag", self.magnitude);
        for segment in &self.subfolders {
            element = element.with_child(Element::new("folder").with_text(segment.clone()));
        }
        element
    }

    fn from_element(element: &Element, registry: &StarRegistry) -> Result<Self> {
        registry.decode(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_catalog_name() {
        assert_eq!(StarKind::from_catalog_name("Tycho-2"), StarKind::Tycho2);
        assert_eq!(StarKind::from_catalog_name("USNO-A2.0"), StarKind::UsnoA2);
        assert_eq!(StarKind::from_catalog_name("My Survey"), StarKind::Custom);
    }

    #[test]
    fn test_structural_subfolders() -> Result<()> {
        assert_eq!(StarKind::Hipparcos.structural_subfolders("32349")?, vec!["32"]);
        assert_eq!(StarKind::Hipparcos.structural_subfolders("7")?, vec!["0"]);
        assert_eq!(StarKind::Tycho2.structural_subfolders("4711-1234-1")?, vec!["4711"]);
        assert_eq!(StarKind::Ucac4.structural_subfolders("123-456789")?, vec!["123"]);
        assert!(StarKind::Detected.structural_subfolders("anything")?.is_empty());
        assert!(StarKind::Tycho2.structural_subfolders("HD 1").is_err());
        Ok(())
    }

    #[test]
    fn test_new_places_star() {
        let star = CatalogStar::new("Tycho-2", "4711-1234-1", Coor::new(10.0, 20.0));
        assert_eq!(star.kind, StarKind::Tycho2);
        assert_eq!(star.catalog_path(), vec!["Stars", "Tycho-2", "4711"]);
        assert_eq!(star.identity_key(), "Tycho-2:4711-1234-1");

        let detected = CatalogStar::new("Detected", "img001-17", Coor::new(10.0, 20.0));
        assert_eq!(detected.catalog_path(), vec!["Detected", "Detected"]);
        assert_eq!(
            CatalogStar::default_catalog_path("Tycho-2", "4711-1234-1"),
            star.catalog_path()
        );
    }

    #[test]
    fn test_negative_means_no_magnitude() {
        let star = CatalogStar::new("Hipparcos", "1", Coor::new(0.0, 0.0));
        assert!(star.is_negative());
        assert!(!star.with_magnitude(9.1).is_negative());
    }
}
