//! Sky positions and great-circle distances

use serde::{Deserialize, Serialize};

/// Arcseconds in one degree
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Equatorial position, both angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coor {
    /// Right ascension, `[0, 360)`
    pub ra: f64,
    /// Declination, `[-90, 90]`
    pub dec: f64,
}

impl Coor {
    pub fn new(ra: f64, dec: f64) -> Self {
        Coor { ra, dec }
    }

    /// Unit vector for this position
    pub fn to_xyz(&self) -> [f64; 3] {
        radec_to_xyz(self.ra.to_radians(), self.dec.to_radians())
    }

    /// Great-circle distance to `other`, in degrees
    pub fn distance_deg(&self, other: &Coor) -> f64 {
        angular_distance(self.to_xyz(), other.to_xyz()).to_degrees()
    }

    /// Great-circle distance to `other`, in arcseconds
    pub fn distance_arcsec(&self, other: &Coor) -> f64 {
        self.distance_deg(other) * ARCSEC_PER_DEGREE
    }

    /// Position `arcsec` north of this one (same RA)
    pub fn offset_dec_arcsec(&self, arcsec: f64) -> Coor {
        Coor::new(self.ra, self.dec + arcsec / ARCSEC_PER_DEGREE)
    }
}

/// Convert (RA, Dec) in radians to a unit vector `[x, y, z]`.
pub fn radec_to_xyz(ra: f64, dec: f64) -> [f64; 3] {
    let cos_dec = dec.cos();
    [cos_dec * ra.cos(), cos_dec * ra.sin(), dec.sin()]
}

/// Great-circle angular distance between two unit vectors, in radians.
///
/// Uses the half-chord form so sub-arcsecond separations keep their precision
/// (`acos` of a dot product loses it close to 1).
pub fn angular_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    let chord = (dx * dx + dy * dy + dz * dz).sqrt();
    2.0 * (chord / 2.0).clamp(-1.0, 1.0).asin()
}
