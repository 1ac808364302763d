//! Image metadata records

use super::{FolderKey, Record, StarRegistry};
use crate::core::element::Element;
use crate::core::geom::Coor;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};

/// What is known about one CCD image
///
/// An image without an astrometric center has not been plate-solved yet; it
/// is negative data.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInformation {
    /// Image file path, the identity key
    pub path: String,
    /// Mid-exposure time
    pub observed_at: DateTime<Utc>,
    pub exposure_sec: Option<f64>,
    pub center: Option<Coor>,
    pub fov_deg: Option<f64>,
    pub limiting_magnitude: Option<f64>,
    pub observer: Option<String>,
}

impl ImageInformation {
    pub fn new(path: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        ImageInformation {
            path: path.into(),
            observed_at,
            exposure_sec: None,
            center: None,
            fov_deg: None,
            limiting_magnitude: None,
            observer: None,
        }
    }

    /// Attach a plate solution
    pub fn with_center(mut self, center: Coor, fov_deg: f64) -> Self {
        self.center = Some(center);
        self.fov_deg = Some(fov_deg);
        self
    }

    pub fn with_exposure(mut self, seconds: f64) -> Self {
        self.exposure_sec = Some(seconds);
        self
    }

    pub fn with_limiting_magnitude(mut self, magnitude: f64) -> Self {
        self.limiting_magnitude = Some(magnitude);
        self
    }

    pub fn with_observer(mut self, observer: impl Into<String>) -> Self {
        self.observer = Some(observer.into());
        self
    }
}

impl Record for ImageInformation {
    const ELEMENT: &'static str = "image";

    fn identity_key(&self) -> String {
        self.path.clone()
    }

    fn folder_key(&self) -> FolderKey {
        FolderKey {
            date: Some(self.observed_at.date_naive()),
            path: None,
        }
    }

    fn is_negative(&self) -> bool {
        self.center.is_none()
    }

    fn to_element(&self) -> Element {
        Element::new(Self::ELEMENT)
            .with_attr("path", &self.path)
            .with_attr("date", self.observed_at.to_rfc3339())
            .with_opt_attr("exposure", self.exposure_sec)
            .with_opt_attr("ra", self.center.map(|c| c.ra))
            .with_opt_attr("dec", self.center.map(|c| c.dec))
            .with_opt_attr("fov", self.fov_deg)
            .with_opt_attr("limit", self.limiting_magnitude)
            .with_opt_attr("observer", self.observer.as_ref())
    }

    fn from_element(element: &Element, _registry: &StarRegistry) -> Result<Self> {
        let item = element
            .attr("path")
            .map(str::to_string)
            .unwrap_or_else(|| format!("<{}>", element.name));
        element.expect_name(Self::ELEMENT, &item)?;

        let date = element.required_attr("date", &item)?;
        let observed_at = DateTime::parse_from_rfc3339(date)
            .map_err(|e| StoreError::decode(&item, format!("bad date '{}': {}", date, e)))?
            .with_timezone(&Utc);

        let center = match (
            element.parse_attr::<f64>("ra", &item)?,
            element.parse_attr::<f64>("dec", &item)?,
        ) {
            (Some(ra), Some(dec)) => Some(Coor::new(ra, dec)),
            _ => None,
        };

        Ok(ImageInformation {
            path: element.required_attr("path", &item)?.to_string(),
            observed_at,
            exposure_sec: element.parse_attr("exposure", &item)?,
            center,
            fov_deg: element.parse_attr("fov", &item)?,
            limiting_magnitude: element.parse_attr("limit", &item)?,
            observer: element.attr("observer").map(str::to_string),
        })
    }
}
