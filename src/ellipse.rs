//! Isophote ellipses from a radial surface-brightness profile.
//!
//! A profile gives position angle and ellipticity as functions of radius.
//! For each requested radius the shape is interpolated from the profile and
//! drawn as an ellipse in the tangent plane, then deprojected onto the sky.

use std::f64::consts::TAU;
use std::io::Read;

use serde::Deserialize;

use crate::constants::D_KPC;
use crate::error::{DataError, GeometryError, Result};
use crate::geom::TangentPlane;
use crate::polygon::Polygon;

/// Vertices per ellipse unless configured otherwise.
pub const DEFAULT_N_VERTS: usize = 1000;

/// Shape of the isophote at one radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsophoteSample {
    pub radius: f64,
    /// Position angle in the profile's own convention, degrees.
    pub pa: f64,
    pub ell: f64,
}

/// Position angle and ellipticity sampled at non-decreasing radii.
#[derive(Debug, Clone)]
pub struct RadialProfile {
    radius: Vec<f64>,
    pa: Vec<f64>,
    ell: Vec<f64>,
}

impl RadialProfile {
    pub fn new(radius: Vec<f64>, pa: Vec<f64>, ell: Vec<f64>) -> Result<Self> {
        if radius.is_empty() {
            return Err(GeometryError::InvalidProfile("no samples".into()));
        }
        if pa.len() != radius.len() || ell.len() != radius.len() {
            return Err(GeometryError::InvalidProfile(format!(
                "column lengths differ: R={}, PA={}, ELL={}",
                radius.len(),
                pa.len(),
                ell.len()
            )));
        }
        if let Some(i) = (0..radius.len())
            .find(|&i| !radius[i].is_finite() || !pa[i].is_finite() || !ell[i].is_finite())
        {
            return Err(GeometryError::InvalidProfile(format!(
                "non-finite value in row {i}"
            )));
        }
        if let Some(i) = radius.windows(2).position(|w| w[1] < w[0]) {
            return Err(GeometryError::InvalidProfile(format!(
                "radius decreases after row {i}"
            )));
        }

        Ok(Self { radius, pa, ell })
    }

    /// Build from radii in arcseconds, converted to kpc at `distance_kpc`.
    pub fn from_arcsec(
        r_arcsec: &[f64],
        pa: Vec<f64>,
        ell: Vec<f64>,
        distance_kpc: f64,
    ) -> Result<Self> {
        let radius = r_arcsec
            .iter()
            .map(|&r| arcsec_to_kpc(r, distance_kpc))
            .collect();
        Self::new(radius, pa, ell)
    }

    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    /// Shape at `r0`.
    ///
    /// Linear interpolation inside the sampled range. Outside it the nearest
    /// end sample is held: the last one beyond the outermost radius, the first
    /// one inside the innermost.
    pub fn sample_at(&self, r0: f64) -> IsophoteSample {
        let n = self.radius.len();
        let hold = |i: usize| IsophoteSample {
            radius: r0,
            pa: self.pa[i],
            ell: self.ell[i],
        };

        if r0.is_nan() {
            return IsophoteSample {
                radius: r0,
                pa: f64::NAN,
                ell: f64::NAN,
            };
        }
        if r0 >= self.radius[n - 1] {
            return hold(n - 1);
        }
        if r0 <= self.radius[0] {
            return hold(0);
        }

        // radius[hi - 1] <= r0 < radius[hi]
        let hi = self.radius.partition_point(|&r| r <= r0);
        let lo = hi - 1;
        let t = (r0 - self.radius[lo]) / (self.radius[hi] - self.radius[lo]);
        IsophoteSample {
            radius: r0,
            pa: self.pa[lo] + t * (self.pa[hi] - self.pa[lo]),
            ell: self.ell[lo] + t * (self.ell[hi] - self.ell[lo]),
        }
    }

    /// Lazily sample the profile at each of `radii`, in the given order.
    ///
    /// Calling again restarts from the first radius.
    pub fn isophotes<'a>(&'a self, radii: &'a [f64]) -> impl Iterator<Item = IsophoteSample> + 'a {
        radii.iter().map(move |&r| self.sample_at(r))
    }
}

/// Settings for [`isophote_polygons`].
#[derive(Debug, Clone)]
pub struct EllipseConfig {
    /// Distance to the galaxy, kpc.
    pub distance_kpc: f64,
    /// Vertices per ellipse.
    pub n_verts: usize,
}

impl Default for EllipseConfig {
    fn default() -> Self {
        Self {
            distance_kpc: D_KPC,
            n_verts: DEFAULT_N_VERTS,
        }
    }
}

/// Angular size in degrees of a physical length at `distance_kpc`.
pub fn kpc_to_deg(r_kpc: f64, distance_kpc: f64) -> f64 {
    (r_kpc / distance_kpc).atan().to_degrees()
}

/// Physical length in kpc subtended by `r_arcsec` at `distance_kpc`.
pub fn arcsec_to_kpc(r_arcsec: f64, distance_kpc: f64) -> f64 {
    distance_kpc * (r_arcsec / 3600.0).to_radians().tan()
}

/// Sky position angle (counter-clockwise from north) from a profile angle
/// measured from the image +x axis.
pub fn sky_position_angle(pa_raw: f64) -> f64 {
    90.0 - pa_raw
}

/// Sample an ellipse at `n_verts` equally spaced parametric angles over
/// `[0, 2pi)` and deproject it onto the sky.
///
/// `r_deg` and `b_deg` are the semi-major and semi-minor axes in degrees and
/// `pa` the sky position angle. The tangent-plane x axis is mirrored because
/// RA grows to the east (left on the sky). The returned ring is not closed.
pub fn build_ellipse_polygon(
    r_deg: f64,
    b_deg: f64,
    pa: f64,
    plane: &TangentPlane,
    n_verts: usize,
) -> Vec<(f64, f64)> {
    let (sin_p, cos_p) = pa.to_radians().sin_cos();
    (0..n_verts)
        .map(|k| {
            let t = TAU * k as f64 / n_verts as f64;
            let (sin_t, cos_t) = t.sin_cos();
            let x = -(r_deg * cos_t * cos_p - b_deg * sin_t * sin_p);
            let y = r_deg * cos_t * sin_p + b_deg * sin_t * cos_p;
            plane.to_equatorial(x, y)
        })
        .collect()
}

/// Closed sky polygons for the isophotes at `radii_kpc`.
pub fn isophote_polygons(
    profile: &RadialProfile,
    radii_kpc: &[f64],
    plane: &TangentPlane,
    config: &EllipseConfig,
) -> Result<Vec<Polygon>> {
    profile
        .isophotes(radii_kpc)
        .map(|iso| {
            let r_deg = kpc_to_deg(iso.radius, config.distance_kpc);
            let b_deg = (1.0 - iso.ell) * r_deg;
            let pa = sky_position_angle(iso.pa);
            Polygon::new(build_ellipse_polygon(
                r_deg,
                b_deg,
                pa,
                plane,
                config.n_verts,
            ))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(rename = "R")]
    r_arcsec: f64,
    #[serde(rename = "PA")]
    pa: f64,
    #[serde(rename = "ELL")]
    ell: f64,
}

/// Read a profile table with `R` (arcsec), `PA` and `ELL` columns.
///
/// Other columns are ignored. Radii are converted to kpc at `distance_kpc`.
pub fn read_profile_csv<R: Read>(
    reader: R,
    distance_kpc: f64,
) -> std::result::Result<RadialProfile, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut r_arcsec = Vec::new();
    let mut pa = Vec::new();
    let mut ell = Vec::new();
    for row in rdr.deserialize() {
        let row: ProfileRow = row?;
        r_arcsec.push(row.r_arcsec);
        pa.push(row.pa);
        ell.push(row.ell);
    }

    Ok(RadialProfile::from_arcsec(
        &r_arcsec,
        pa,
        ell,
        distance_kpc,
    )?)
}
