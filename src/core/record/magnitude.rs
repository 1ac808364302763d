//! Magnitude observations of catalog stars

use super::{CatalogStar, FolderKey, Record, StarRegistry};
use crate::core::element::Element;
use crate::core::geom::Coor;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};

/// Where a star lives in the catalog hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarRef {
    pub category: String,
    pub catalog: String,
    pub name: String,
    pub subfolders: Vec<String>,
}

impl StarRef {
    pub fn of(star: &CatalogStar) -> Self {
        StarRef {
            category: star.category.clone(),
            catalog: star.catalog.clone(),
            name: star.name.clone(),
            subfolders: star.subfolders.clone(),
        }
    }

    /// `[category, catalog, subfolders...]`
    pub fn catalog_path(&self) -> Vec<String> {
        let mut path = vec![self.category.clone(), self.catalog.clone()];
        path.extend(self.subfolders.iter().cloned());
        path
    }

    /// True if this refers to `star`
    pub fn refers_to(&self, star: &CatalogStar) -> bool {
        self.catalog == star.catalog && self.name == star.name
    }
}

/// One magnitude measurement of a star on one image
///
/// A record without a magnitude means the star was searched for but not
/// detected; it is negative data.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeRecord {
    pub star: StarRef,
    pub observed_at: DateTime<Utc>,
    /// Path of the image the measurement comes from
    pub image: String,
    /// Photometric band or filter name
    pub band: String,
    pub magnitude: Option<f64>,
    /// Measured position on the image, if astrometry was done
    pub position: Option<Coor>,
    /// Detection the measurement belongs to, when several on one image
    /// matched the same star
    pub detection: Option<String>,
}

impl MagnitudeRecord {
    pub fn new(star: &CatalogStar, observed_at: DateTime<Utc>, image: impl Into<String>) -> Self {
        MagnitudeRecord {
            star: StarRef::of(star),
            observed_at,
            image: image.into(),
            band: "V".to_string(),
            magnitude: None,
            position: None,
            detection: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_band(mut self, band: impl Into<String>) -> Self {
        self.band = band.into();
        self
    }

    pub fn with_position(mut self, position: Coor) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_detection(mut self, detection: impl Into<String>) -> Self {
        self.detection = Some(detection.into());
        self
    }
}

impl Record for MagnitudeRecord {
    const ELEMENT: &'static str = "magnitude";

    fn identity_key(&self) -> String {
        match &self.detection {
            Some(detection) => format!("{}@{}#{}", self.star.name, self.image, detection),
            None => format!("{}@{}", self.star.name, self.image),
        }
    }

    fn folder_key(&self) -> FolderKey {
        FolderKey {
            date: Some(self.observed_at.date_naive()),
            path: Some(self.star.catalog_path()),
        }
    }

    fn is_negative(&self) -> bool {
        self.magnitude.is_none()
    }

    fn to_element(&self) -> Element {
        let mut star = Element::new("star")
            .with_attr("category", &self.star.category)
            .with_attr("catalog", &self.star.catalog)
            .with_attr("name", &self.star.name);
        for segment in &self.star.subfolders {
            star = star.with_child(Element::new("folder").with_text(segment.clone()));
        }

        Element::new(Self::ELEMENT)
            .with_attr("date", self.observed_at.to_rfc3339())
            .with_attr("image", &self.image)
            .with_attr("band", &self.band)
            .with_opt_attr("mag", self.magnitude)
            .with_opt_attr("ra", self.position.map(|p| p.ra))
            .with_opt_attr("dec", self.position.map(|p| p.dec))
            .with_opt_attr("detection", self.detection.as_ref())
            .with_child(star)
    }

    fn from_element(element: &Element, _registry: &StarRegistry) -> Result<Self> {
        let item = element
            .attr("image")
            .map(|i| format!("magnitude@{}", i))
            .unwrap_or_else(|| format!("<{}>", element.name));
        element.expect_name(Self::ELEMENT, &item)?;

        let star = element
            .child("star")
            .ok_or_else(|| StoreError::decode(&item, "no <star> reference"))?;
        let star = StarRef {
            category: star.required_attr("category", &item)?.to_string(),
            catalog: star.required_attr("catalog", &item)?.to_string(),
            name: star.required_attr("name", &item)?.to_string(),
            subfolders: star
                .children_named("folder")
                .filter_map(|f| f.text.clone())
                .collect(),
        };

        let date = element.required_attr("date", &item)?;
        let observed_at = DateTime::parse_from_rfc3339(date)
            .map_err(|e| StoreError::decode(&item, format!("bad date '{}': {}", date, e)))?
            .with_timezone(&Utc);

        let position = match (
            element.parse_attr::<f64>("ra", &item)?,
            element.parse_attr::<f64>("dec", &item)?,
        ) {
            (Some(ra), Some(dec)) => Some(Coor::new(ra, dec)),
            _ => None,
        };

        Ok(MagnitudeRecord {
            star,
            observed_at,
            image: element.required_attr("image", &item)?.to_string(),
            band: element.attr("band").unwrap_or("V").to_string(),
            magnitude: element.parse_attr("mag", &item)?,
            position,
            detection: element.attr("detection").map(str::to_string),
        })
    }
}
