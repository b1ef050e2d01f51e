//! Tangent-plane (gnomonic) coordinates about a reference point.
//!
//! `xi` increases toward increasing RA and `eta` toward increasing Dec. Both
//! are expressed in degrees, i.e. the tangent-plane offset in radians scaled
//! by `180 / pi`.
//!
//! The forward transform divides by the cosine of the angle between the
//! target and the reference point. Points 90 degrees away project to
//! infinity and points beyond project through the antipode; no error is
//! raised, the result carries `inf`/`NaN` like any IEEE division.

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};

use super::sphere::SkyCoord;
use crate::error::{GeometryError, Result};

/// Inverse transform used by [`TangentPlane::to_equatorial`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deprojection {
    /// The historical map transform: the declination arctangent is scaled by
    /// `cos(ra - ra0)` after the fact. Close to exact within about a degree of
    /// the reference point and drifting by a few hundredths of a degree at
    /// three degrees. Kept as the default so existing field layouts reproduce.
    #[default]
    Reference,
    /// Exact inverse of [`eq_to_tan`].
    Gnomonic,
}

/// A tangent plane touching the sky at `center`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TangentPlane {
    pub center: SkyCoord,
    pub deprojection: Deprojection,
}

impl TangentPlane {
    pub fn new(center: SkyCoord) -> Self {
        Self {
            center,
            deprojection: Deprojection::default(),
        }
    }

    pub fn with_deprojection(mut self, deprojection: Deprojection) -> Self {
        self.deprojection = deprojection;
        self
    }

    /// (RA, Dec) in degrees to (xi, eta) in degrees.
    pub fn to_tangent(&self, ra: f64, dec: f64) -> (f64, f64) {
        eq_to_tan(ra, dec, self.center)
    }

    /// (xi, eta) in degrees to (RA, Dec) in degrees.
    ///
    /// RA is `ra0` plus a principal-value arctangent and is not wrapped into
    /// `[0, 360)`, so rings crossing RA = 0 stay continuous.
    pub fn to_equatorial(&self, xi: f64, eta: f64) -> (f64, f64) {
        match self.deprojection {
            Deprojection::Reference => tan_to_eq(xi, eta, self.center),
            Deprojection::Gnomonic => tan_to_eq_gnomonic(xi, eta, self.center),
        }
    }

    /// Element-wise [`Self::to_tangent`] over arrays of any rank.
    pub fn to_tangent_array<S1, S2, D>(
        &self,
        ra: &ArrayBase<S1, D>,
        dec: &ArrayBase<S2, D>,
    ) -> Result<(Array<f64, D>, Array<f64, D>)>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
    {
        map_pairs(ra, dec, |r, d| self.to_tangent(r, d))
    }

    /// Element-wise [`Self::to_equatorial`] over arrays of any rank.
    pub fn to_equatorial_array<S1, S2, D>(
        &self,
        xi: &ArrayBase<S1, D>,
        eta: &ArrayBase<S2, D>,
    ) -> Result<(Array<f64, D>, Array<f64, D>)>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
    {
        map_pairs(xi, eta, |x, e| self.to_equatorial(x, e))
    }

    /// Project a ring of (RA, Dec) vertices onto the plane.
    pub fn project_ring(&self, vertices: &[(f64, f64)]) -> Vec<(f64, f64)> {
        vertices
            .iter()
            .map(|&(ra, dec)| self.to_tangent(ra, dec))
            .collect()
    }

    /// Deproject a ring of (xi, eta) vertices back to the sky.
    pub fn deproject_ring(&self, vertices: &[(f64, f64)]) -> Vec<(f64, f64)> {
        vertices
            .iter()
            .map(|&(xi, eta)| self.to_equatorial(xi, eta))
            .collect()
    }
}

/// Equatorial to tangent-plane coordinates, all in degrees.
pub fn eq_to_tan(ra: f64, dec: f64, center: SkyCoord) -> (f64, f64) {
    let r = ra.to_radians();
    let d = dec.to_radians();
    let r0 = center.ra.to_radians();
    let d0 = center.dec.to_radians();

    let (sin_d, cos_d) = d.sin_cos();
    let (sin_d0, cos_d0) = d0.sin_cos();
    let (sin_dr, cos_dr) = (r - r0).sin_cos();

    let denom = sin_d0 * sin_d + cos_d0 * cos_d * cos_dr;
    let xi = cos_d * sin_dr / denom;
    let eta = (cos_d0 * sin_d - sin_d0 * cos_d * cos_dr) / denom;

    (xi.to_degrees(), eta.to_degrees())
}

/// Tangent-plane to equatorial coordinates with the reference declination
/// scaling (see [`Deprojection::Reference`]).
pub fn tan_to_eq(xi: f64, eta: f64, center: SkyCoord) -> (f64, f64) {
    let x = xi.to_radians();
    let e = eta.to_radians();
    let r0 = center.ra.to_radians();
    let (sin_d0, cos_d0) = center.dec.to_radians().sin_cos();

    let denom = cos_d0 - e * sin_d0;
    let ra = (x / denom).atan() + r0;
    let dec = ((sin_d0 + e * cos_d0) / denom).atan() * (ra - r0).cos();

    (ra.to_degrees(), dec.to_degrees())
}

/// Exact inverse of [`eq_to_tan`] for points on the near hemisphere.
pub fn tan_to_eq_gnomonic(xi: f64, eta: f64, center: SkyCoord) -> (f64, f64) {
    let x = xi.to_radians();
    let e = eta.to_radians();
    let r0 = center.ra.to_radians();
    let (sin_d0, cos_d0) = center.dec.to_radians().sin_cos();

    let denom = cos_d0 - e * sin_d0;
    let dra = (x / denom).atan();
    let dec = ((sin_d0 + e * cos_d0) * dra.cos() / denom).atan();

    ((dra + r0).to_degrees(), dec.to_degrees())
}

fn map_pairs<S1, S2, D, F>(
    a: &ArrayBase<S1, D>,
    b: &ArrayBase<S2, D>,
    f: F,
) -> Result<(Array<f64, D>, Array<f64, D>)>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
    F: Fn(f64, f64) -> (f64, f64),
{
    if a.shape() != b.shape() {
        return Err(GeometryError::ShapeMismatch {
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        });
    }

    let mut out_a = Array::<f64, D>::zeros(a.raw_dim());
    let mut out_b = Array::<f64, D>::zeros(a.raw_dim());
    Zip::from(&mut out_a)
        .and(&mut out_b)
        .and(a)
        .and(b)
        .for_each(|oa, ob, &x, &y| {
            let (p, q) = f(x, y);
            *oa = p;
            *ob = q;
        });

    Ok((out_a, out_b))
}
