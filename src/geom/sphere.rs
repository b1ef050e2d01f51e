use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::constants::{M31_DEC0, M31_RA0};

/// A position on the sky, (RA, Dec) in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    /// Center of M31.
    pub const M31: SkyCoord = SkyCoord {
        ra: M31_RA0,
        dec: M31_DEC0,
    };

    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Unit vector for this position.
    pub fn to_xyz(self) -> [f64; 3] {
        radec_to_xyz(self.ra.to_radians(), self.dec.to_radians())
    }

    /// Position of a unit vector, RA wrapped into `[0, 360)`.
    pub fn from_xyz(xyz: [f64; 3]) -> Self {
        let (ra, dec) = xyz_to_radec(xyz);
        Self::new(ra.to_degrees(), dec.to_degrees())
    }

    /// Great-circle separation in degrees.
    pub fn separation(self, other: SkyCoord) -> f64 {
        angular_distance(self.to_xyz(), other.to_xyz()).to_degrees()
    }
}

impl Default for SkyCoord {
    fn default() -> Self {
        Self::M31
    }
}

/// Convert (RA, Dec) in radians to a unit vector `[x, y, z]`.
pub fn radec_to_xyz(ra: f64, dec: f64) -> [f64; 3] {
    let cos_dec = dec.cos();
    [cos_dec * ra.cos(), cos_dec * ra.sin(), dec.sin()]
}

/// Convert a unit vector to (RA, Dec) in radians.
/// RA is in `[0, 2*pi)`, Dec is in `[-pi/2, pi/2]`.
pub fn xyz_to_radec(xyz: [f64; 3]) -> (f64, f64) {
    let mut ra = f64::atan2(xyz[1], xyz[0]);
    if ra < 0.0 {
        ra += TAU;
    }
    let dec = xyz[2].clamp(-1.0, 1.0).asin();
    (ra, dec)
}

/// Great-circle angular distance between two unit vectors, in radians.
pub fn angular_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    // atan2 of |a x b| and a.b stays accurate for the sub-arcsecond
    // separations that acos loses.
    let cx = a[1] * b[2] - a[2] * b[1];
    let cy = a[2] * b[0] - a[0] * b[2];
    let cz = a[0] * b[1] - a[1] * b[0];
    let cross = (cx * cx + cy * cy + cz * cz).sqrt();
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    cross.atan2(dot)
}

/// Mean sky position of `(ra, dec)` points in degrees.
///
/// Averages unit vectors, so fields straddling RA = 0 are handled.
/// Returns `None` for no points or when the vectors cancel out.
pub fn mean_position(points: &[(f64, f64)]) -> Option<SkyCoord> {
    if points.is_empty() {
        return None;
    }

    let mut sum = [0.0; 3];
    for &(ra, dec) in points {
        let v = SkyCoord::new(ra, dec).to_xyz();
        sum[0] += v[0];
        sum[1] += v[1];
        sum[2] += v[2];
    }
    let norm = (sum[0] * sum[0] + sum[1] * sum[1] + sum[2] * sum[2]).sqrt();
    if norm < 1e-12 {
        return None;
    }
    Some(SkyCoord::from_xyz([
        sum[0] / norm,
        sum[1] / norm,
        sum[2] / norm,
    ]))
}
