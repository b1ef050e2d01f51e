//! Named field footprints that are not in the image log.
//!
//! Narrowband fields are laid out by hand as fixed-size boxes in the M31
//! tangent plane and stored as a JSON object mapping field name to a list of
//! `[ra, dec]` corners.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{NB_FIELD_HEIGHT_DEG, NB_FIELD_OVERLAP_DEG, NB_FIELD_WIDTH_DEG};
use crate::error::{DataError, GeometryError};
use crate::geom::{Deprojection, SkyCoord, TangentPlane};
use crate::lookup::Lookup;
use crate::polygon::Polygon;

/// Angular size of a rectangular field of view, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSize {
    pub width: f64,
    pub height: f64,
}

impl FieldSize {
    /// 42' x 28' narrowband imager.
    pub const NARROWBAND: FieldSize = FieldSize {
        width: NB_FIELD_WIDTH_DEG,
        height: NB_FIELD_HEIGHT_DEG,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Field name to (RA, Dec) corner list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    fields: BTreeMap<String, Vec<(f64, f64)>>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, vertices: Vec<(f64, f64)>) {
        self.fields.insert(name.into(), vertices);
    }

    /// Add every field of `other`, replacing fields with the same name.
    pub fn merge(&mut self, other: FieldCatalog) {
        self.fields.extend(other.fields);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn vertices(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// The named field as a closed polygon.
    pub fn lookup(&self, name: &str) -> Result<Lookup<Polygon>, GeometryError> {
        match self.fields.get(name) {
            Some(vertices) => Polygon::new(vertices.clone()).map(Lookup::Found),
            None => Ok(Lookup::NotFound),
        }
    }

    /// Polygons for a list of names; any unknown name is an error.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<(String, Polygon)>, DataError> {
        names
            .iter()
            .map(|name| -> Result<(String, Polygon), DataError> {
                let name = name.as_ref();
                match self.lookup(name)? {
                    Lookup::Found(polygon) => Ok((name.to_string(), polygon)),
                    Lookup::NotFound => Err(DataError::UnknownField(name.to_string())),
                }
            })
            .collect()
    }

    pub fn from_json_str(s: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, DataError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Corners of a box centered on `(xi, eta)` in `plane`, deprojected to
/// (RA, Dec): lower-left, lower-right, upper-right, upper-left.
pub fn field_box(xi: f64, eta: f64, size: FieldSize, plane: &TangentPlane) -> Vec<(f64, f64)> {
    let hw = size.width / 2.0;
    let hh = size.height / 2.0;
    vec![
        plane.to_equatorial(xi - hw, eta - hh),
        plane.to_equatorial(xi + hw, eta - hh),
        plane.to_equatorial(xi + hw, eta + hh),
        plane.to_equatorial(xi - hw, eta + hh),
    ]
}

/// A `width` x `height` degree box centered on `center`, built in the tangent
/// plane of the box itself.
pub fn box_footprint(center: SkyCoord, width: f64, height: f64) -> Result<Polygon, GeometryError> {
    let plane = TangentPlane::new(center).with_deprojection(Deprojection::Gnomonic);
    Polygon::new(field_box(0.0, 0.0, FieldSize::new(width, height), &plane))
}

/// The ANDROIDS narrowband fields `AGB_1` through `AGB_20`.
pub fn androids_fields(plane: &TangentPlane) -> FieldCatalog {
    let w = NB_FIELD_WIDTH_DEG;
    let h = NB_FIELD_HEIGHT_DEG;
    let dh = NB_FIELD_OVERLAP_DEG;
    let eta0 = 0.05;
    let step = h - dh;

    let centers = [
        // Major-axis strip.
        (0.25, eta0),
        (0.65, eta0 + step),
        (0.65 - w + dh, eta0 + step),
        (0.65, eta0 + 2.0 * step),
        (0.9, eta0 + 3.0 * step),
        (1.4, 0.35),
        (0.7, 1.7),
        (0.25 - w + dh, 0.05),
        (0.1, 0.05 - step),
        (0.1 - w + dh, 0.05 - step),
        (-0.3, 0.05 - 2.0 * step),
        (-0.3 - w + dh, 0.05 - 2.0 * step),
        (-0.3, 0.05 - 3.0 * step),
        (-0.3 - w + dh, 0.05 - 3.0 * step),
        (-0.05, 0.85),
        (0.2, 1.25),
        // NGC 205.
        (-0.5, 0.4),
        // Minor axis.
        (0.4, -0.55),
        (0.8, -0.1),
        (1.3, 0.8),
    ];

    let mut catalog = FieldCatalog::new();
    for (i, &(xi, eta)) in centers.iter().enumerate() {
        catalog.insert(
            format!("AGB_{}", i + 1),
            field_box(xi, eta, FieldSize::NARROWBAND, plane),
        );
    }
    catalog
}

/// Archival CFH12K CN-TiO fields (Battinelli & Demers).
pub fn cntio_12k_fields(plane: &TangentPlane) -> FieldCatalog {
    let fields = [
        ("NGC205", 0.672777778, 41.6853),
        ("SW1", 0.638138889, 40.067497222),
        ("SW2", 0.617313889, 39.680555556),
    ];

    let mut catalog = FieldCatalog::new();
    for (name, ra_hours, dec) in fields {
        let (xi, eta) = plane.to_tangent(15.0 * ra_hours, dec);
        catalog.insert(name, field_box(xi, eta, FieldSize::NARROWBAND, plane));
    }
    catalog
}

/// All narrowband fields, as written to the field catalog file.
pub fn narrowband_catalog(plane: &TangentPlane) -> FieldCatalog {
    let mut catalog = androids_fields(plane);
    catalog.merge(cntio_12k_fields(plane));
    catalog
}

/// Hours, minutes, seconds of RA to degrees.
pub fn hms_to_deg(h: f64, m: f64, s: f64) -> f64 {
    15.0 * (h + m / 60.0 + s / 3600.0)
}

/// Degrees, arcminutes, arcseconds to degrees. The sign is passed separately
/// so that `-0:30:00` survives.
pub fn dms_to_deg(negative: bool, d: f64, m: f64, s: f64) -> f64 {
    let value = d.abs() + m / 60.0 + s / 3600.0;
    if negative { -value } else { value }
}

/// Parse `HH:MM:SS.s` (or space separated) RA into degrees.
pub fn parse_hms(s: &str) -> Result<f64, DataError> {
    let (_, [h, m, sec]) = split_sexagesimal(s)?;
    Ok(hms_to_deg(h, m, sec))
}

/// Parse `[+-]DD:MM:SS.s` (or space separated) Dec into degrees.
pub fn parse_dms(s: &str) -> Result<f64, DataError> {
    let (negative, [d, m, sec]) = split_sexagesimal(s)?;
    Ok(dms_to_deg(negative, d, m, sec))
}

fn split_sexagesimal(s: &str) -> Result<(bool, [f64; 3]), DataError> {
    let invalid = || DataError::InvalidSexagesimal(s.to_string());

    let trimmed = s.trim();
    let negative = trimmed.starts_with('-');
    let body = trimmed.trim_start_matches(['+', '-']);

    let parts: Vec<f64> = body
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;

    let [a, b, c] = parts[..] else {
        return Err(invalid());
    };
    if a < 0.0 || !(0.0..60.0).contains(&b) || !(0.0..60.0).contains(&c) {
        return Err(invalid());
    }
    Ok((negative, [a, b, c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::sphere::mean_position;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn field_box_corner_order() {
        let plane = TangentPlane::default().with_deprojection(Deprojection::Gnomonic);
        let corners = field_box(0.0, 0.0, FieldSize::new(1.0, 0.5), &plane);
        let tangent = plane.project_ring(&corners);
        let expected = [(-0.5, -0.25), (0.5, -0.25), (0.5, 0.25), (-0.5, 0.25)];
        for (got, want) in tangent.iter().zip(expected) {
            assert_close(got.0, want.0, 1e-9);
            assert_close(got.1, want.1, 1e-9);
        }
    }

    #[test]
    fn narrowband_catalog_contents() {
        let catalog = narrowband_catalog(&TangentPlane::default());
        assert_eq!(catalog.len(), 23);
        for i in 1..=20 {
            assert!(catalog.vertices(&format!("AGB_{i}")).is_some());
        }
        for name in ["NGC205", "SW1", "SW2"] {
            assert_eq!(catalog.vertices(name).unwrap().len(), 4);
        }
    }

    #[test]
    fn androids_field_centers() {
        let plane = TangentPlane::default().with_deprojection(Deprojection::Gnomonic);
        let catalog = androids_fields(&plane);
        let corners = catalog.vertices("AGB_1").unwrap();
        let tangent = plane.project_ring(corners);
        let xi = tangent.iter().map(|p| p.0).sum::<f64>() / 4.0;
        let eta = tangent.iter().map(|p| p.1).sum::<f64>() / 4.0;
        assert_close(xi, 0.25, 1e-9);
        assert_close(eta, 0.05, 1e-9);

        // Adjacent strip fields overlap by 4' in eta.
        let second = plane.project_ring(catalog.vertices("AGB_2").unwrap());
        let fourth = plane.project_ring(catalog.vertices("AGB_4").unwrap());
        let overlap = second[2].1 - fourth[0].1;
        assert_close(overlap, NB_FIELD_OVERLAP_DEG, 1e-9);
    }

    #[test]
    fn cntio_fields_surround_their_centers() {
        let catalog = cntio_12k_fields(&TangentPlane::default());
        let ngc205 = catalog.vertices("NGC205").unwrap();
        let center = mean_position(ngc205).unwrap();
        assert_close(center.ra, 15.0 * 0.672777778, 0.01);
        assert_close(center.dec, 41.6853, 0.01);
    }

    #[test]
    fn lookup_and_select() {
        let catalog = narrowband_catalog(&TangentPlane::default());
        let polygon = catalog.lookup("SW1").unwrap().found().unwrap();
        assert_eq!(polygon.vertices().len(), 5);
        assert!(catalog.lookup("AGB_99").unwrap().is_not_found());

        let picked = catalog.select(&["SW1", "SW2", "NGC205"]).unwrap();
        assert_eq!(
            picked.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["SW1", "SW2", "NGC205"]
        );
        assert!(matches!(
            catalog.select(&["SW1", "nope"]),
            Err(DataError::UnknownField(name)) if name == "nope"
        ));
    }

    #[test]
    fn catalog_json_roundtrip() {
        let catalog = narrowband_catalog(&TangentPlane::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrowband_fields.json");
        catalog.save(&path).unwrap();
        let loaded = FieldCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn catalog_json_shape() {
        let catalog = FieldCatalog::from_json_str(
            r#"{"F1": [[10.0, 41.0], [11.0, 41.0], [11.0, 42.0], [10.0, 42.0]]}"#,
        )
        .unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["F1"]);
        assert_eq!(catalog.vertices("F1").unwrap()[1], (11.0, 41.0));
    }

    #[test]
    fn box_footprint_is_centered() {
        let center = SkyCoord::new(12.93, 41.2);
        let poly = box_footprint(center, 1.0, 1.0).unwrap();
        assert_eq!(poly.open_vertices().len(), 4);
        let mid = mean_position(poly.open_vertices()).unwrap();
        assert_close(mid.ra, center.ra, 1e-6);
        assert_close(mid.dec, center.dec, 1e-3);

        // Each corner sits half a diagonal away in the box's own plane.
        let half = 0.5_f64.to_radians();
        let diag = half.hypot(half).atan().to_degrees();
        for &(ra, dec) in poly.open_vertices() {
            assert_close(SkyCoord::new(ra, dec).separation(center), diag, 1e-2);
        }
    }

    #[test]
    fn sexagesimal_conversion() {
        assert_close(hms_to_deg(0.0, 51.0, 44.130), 12.933875, 1e-9);
        assert_close(parse_hms("0:51:44.130").unwrap(), 12.933875, 1e-9);
        assert_close(parse_hms("00 42 44.3").unwrap(), 10.684583333, 1e-6);

        assert_close(parse_dms("+41:11:54.49").unwrap(), 41.198469444, 1e-8);
        assert_close(parse_dms("-0:30:00").unwrap(), -0.5, 1e-12);
        assert_close(dms_to_deg(true, 40.0, 30.0, 0.0), -40.5, 1e-12);
    }

    #[test]
    fn sexagesimal_rejects_garbage() {
        for bad in ["", "12:30", "1:2:3:4", "a:b:c", "10:75:00", "10:00:60"] {
            assert!(
                matches!(parse_hms(bad), Err(DataError::InvalidSexagesimal(_))),
                "{bad} should fail"
            );
        }
    }
}
