//! Closed footprint rings and their unions.

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, Intersects, Line, LineString, MultiPolygon,
    Polygon as GeoPolygon,
};
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, Result};
use crate::lookup::Lookup;

/// A simple polygon stored as a closed ring: the last vertex repeats the first.
///
/// Vertices are `(x, y)` pairs in one coordinate system, either (RA, Dec) or
/// (xi, eta). Footprints have no holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Polygon {
    ring: Vec<(f64, f64)>,
}

impl Polygon {
    /// Build a polygon from an open or closed vertex list.
    ///
    /// Fails if a coordinate is not finite or the ring has fewer than three
    /// distinct vertices.
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if let Some(i) = vertices
            .iter()
            .position(|&(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(GeometryError::NonFinite(i));
        }

        let ring = close_ring(vertices);
        let distinct = unique_point_count(&ring);
        if distinct < 3 {
            return Err(GeometryError::DegeneratePolygon(format!(
                "{distinct} distinct vertices, need at least 3"
            )));
        }

        Ok(Self { ring })
    }

    /// The closed ring, first vertex repeated at the end.
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.ring
    }

    /// The ring without its closing vertex.
    pub fn open_vertices(&self) -> &[(f64, f64)] {
        &self.ring[..self.ring.len() - 1]
    }

    /// Unsigned area in squared coordinate units.
    pub fn area(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// `((min_x, min_y), (max_x, max_y))`.
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let line = LineString::from(self.ring.clone());
        match line.bounding_rect() {
            Some(rect) => ((rect.min().x, rect.min().y), (rect.max().x, rect.max().y)),
            // `new` guarantees at least three vertices.
            None => (self.ring[0], self.ring[0]),
        }
    }

    /// Area-weighted centroid, `None` for a zero-area ring.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.area() == 0.0 {
            return None;
        }
        self.to_geo().centroid().map(|p| (p.x(), p.y()))
    }

    /// Apply a coordinate transform to every vertex, e.g. a projection.
    pub fn map_vertices<F>(&self, f: F) -> Result<Self>
    where
        F: FnMut(&(f64, f64)) -> (f64, f64),
    {
        Self::new(self.open_vertices().iter().map(f).collect())
    }

    /// Reject rings whose edges cross or touch away from shared corners, and
    /// rings that enclose no area.
    pub fn validate_simple(&self) -> Result<()> {
        let ring = distinct_vertices(&self.ring);
        let n = ring.len();
        let edges: Vec<Line<f64>> = (0..n)
            .map(|i| {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                Line::new(Coord { x: a.0, y: a.1 }, Coord { x: b.0, y: b.1 })
            })
            .collect();

        for i in 0..n {
            for j in (i + 2)..n {
                // First and last edges share vertex 0.
                if i == 0 && j == n - 1 {
                    continue;
                }
                if edges[i].intersects(&edges[j]) {
                    return Err(GeometryError::SelfIntersecting {
                        first: i,
                        second: j,
                    });
                }
            }
        }

        if self.area() == 0.0 {
            return Err(GeometryError::DegeneratePolygon(
                "ring encloses no area".to_string(),
            ));
        }
        Ok(())
    }

    fn to_geo(&self) -> GeoPolygon<f64> {
        GeoPolygon::new(LineString::from(self.ring.clone()), vec![])
    }

    fn from_geo_exterior(exterior: &LineString<f64>) -> Result<Self> {
        Self::new(exterior.coords().map(|c| (c.x, c.y)).collect())
    }
}

impl TryFrom<Vec<(f64, f64)>> for Polygon {
    type Error = GeometryError;

    fn try_from(vertices: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<(f64, f64)> {
    fn from(polygon: Polygon) -> Self {
        polygon.ring
    }
}

/// Append the first vertex if the ring is not already closed.
///
/// Idempotent; empty input is returned unchanged.
pub fn close_ring(mut vertices: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if let (Some(&first), Some(&last)) = (vertices.first(), vertices.last()) {
        if vertices.len() == 1 || first != last {
            vertices.push(first);
        }
    }
    vertices
}

/// Union of possibly overlapping footprints.
///
/// Returns `NotFound` for an empty input. Otherwise every input is checked
/// for self-intersection and the union's disjoint pieces are returned in no
/// particular order. Only exterior rings are kept: a hole enclosed by the
/// combined footprints is filled in.
pub fn union(polygons: &[Polygon]) -> Result<Lookup<Vec<Polygon>>> {
    let Some((first, rest)) = polygons.split_first() else {
        return Ok(Lookup::NotFound);
    };

    for polygon in polygons {
        polygon.validate_simple()?;
    }

    let mut merged = MultiPolygon::new(vec![first.to_geo()]);
    for polygon in rest {
        merged = merged.union(&MultiPolygon::new(vec![polygon.to_geo()]));
    }

    let pieces = merged
        .0
        .iter()
        .map(|p| Polygon::from_geo_exterior(p.exterior()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Lookup::Found(pieces))
}

/// Number of different points in a ring, wherever they appear.
fn unique_point_count(ring: &[(f64, f64)]) -> usize {
    let mut points = ring.to_vec();
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points.dedup();
    points.len()
}

/// Closed ring reduced to distinct vertices: consecutive repeats and the
/// closing vertex dropped.
fn distinct_vertices(ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
    for &v in ring {
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn square(x0: f64, y0: f64, side: f64) -> Polygon {
        Polygon::new(vec![
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
        ])
        .unwrap()
    }

    fn assert_bounds_close(p: &Polygon, expected: ((f64, f64), (f64, f64))) {
        let ((x0, y0), (x1, y1)) = p.bounds();
        assert_close(x0, expected.0.0, 1e-9);
        assert_close(y0, expected.0.1, 1e-9);
        assert_close(x1, expected.1.0, 1e-9);
        assert_close(y1, expected.1.1, 1e-9);
    }

    fn shoelace(ring: &[(f64, f64)]) -> f64 {
        let mut sum = 0.0;
        for w in ring.windows(2) {
            sum += w[0].0 * w[1].1 - w[1].0 * w[0].1;
        }
        (sum / 2.0).abs()
    }

    #[test]
    fn close_ring_appends_first_vertex() {
        let closed = close_ring(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(closed.len(), 4);
        assert_eq!(closed.first(), closed.last());
    }

    #[test]
    fn close_ring_is_idempotent() {
        let open = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)];
        let once = close_ring(open);
        let twice = close_ring(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0], once[once.len() - 1]);
    }

    #[test]
    fn close_ring_single_and_empty() {
        assert_eq!(close_ring(vec![(1.0, 2.0)]), vec![(1.0, 2.0), (1.0, 2.0)]);
        assert!(close_ring(Vec::new()).is_empty());
    }

    #[test]
    fn new_closes_open_ring() {
        let p = square(0.0, 0.0, 1.0);
        assert_eq!(p.vertices().len(), 5);
        assert_eq!(p.open_vertices().len(), 4);
        assert_eq!(p.vertices()[0], p.vertices()[4]);

        let closed = Polygon::new(p.vertices().to_vec()).unwrap();
        assert_eq!(closed, p);
    }

    #[test]
    fn new_rejects_degenerate_rings() {
        assert!(matches!(
            Polygon::new(vec![(0.0, 0.0), (1.0, 0.0)]),
            Err(GeometryError::DegeneratePolygon(_))
        ));
        assert!(matches!(
            Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (0.0, 0.0)]),
            Err(GeometryError::DegeneratePolygon(_))
        ));
        assert!(matches!(
            Polygon::new(Vec::new()),
            Err(GeometryError::DegeneratePolygon(_))
        ));
    }

    #[test]
    fn new_counts_points_not_runs() {
        // Two points visited twice each.
        assert!(matches!(
            Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 0.0), (1.0, 0.0)]),
            Err(GeometryError::DegeneratePolygon(_))
        ));
    }

    #[test]
    fn collinear_ring_is_not_simple() {
        let flat = Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]).unwrap();
        assert!(matches!(
            flat.validate_simple(),
            Err(GeometryError::DegeneratePolygon(_))
        ));
        assert!(matches!(
            union(std::slice::from_ref(&flat)),
            Err(GeometryError::DegeneratePolygon(_))
        ));
        assert!(matches!(
            union(&[square(0.0, 0.0, 1.0), flat]),
            Err(GeometryError::DegeneratePolygon(_))
        ));
    }

    #[test]
    fn degenerate_union_piece_is_an_error() {
        let sliver = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        assert!(matches!(
            Polygon::from_geo_exterior(&sliver),
            Err(GeometryError::DegeneratePolygon(_))
        ));

        let ring = LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        assert_eq!(Polygon::from_geo_exterior(&ring).unwrap().vertices().len(), 5);
    }

    #[test]
    fn new_rejects_non_finite() {
        assert_eq!(
            Polygon::new(vec![(0.0, 0.0), (1.0, f64::NAN), (1.0, 1.0)]),
            Err(GeometryError::NonFinite(1))
        );
    }

    #[test]
    fn area_bounds_centroid() {
        let p = square(2.0, 3.0, 2.0);
        assert_close(p.area(), 4.0, 1e-12);
        assert_eq!(p.bounds(), ((2.0, 3.0), (4.0, 5.0)));
        let (cx, cy) = p.centroid().unwrap();
        assert_close(cx, 3.0, 1e-12);
        assert_close(cy, 4.0, 1e-12);
    }

    #[test]
    fn bowtie_is_not_simple() {
        let bowtie = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]).unwrap();
        assert!(matches!(
            bowtie.validate_simple(),
            Err(GeometryError::SelfIntersecting { .. })
        ));
        assert!(square(0.0, 0.0, 1.0).validate_simple().is_ok());
    }

    #[test]
    fn repeated_vertex_is_still_simple() {
        let p = Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
            .unwrap();
        assert!(p.validate_simple().is_ok());
    }

    #[test]
    fn union_of_nothing_is_not_found() {
        let out = union(&[]).unwrap();
        assert_eq!(out, Lookup::NotFound);
        assert_ne!(out, Lookup::Found(Vec::new()));
    }

    #[test]
    fn union_of_one_is_itself() {
        let p = square(0.0, 0.0, 1.0);
        let out = union(std::slice::from_ref(&p)).unwrap().found().unwrap();
        assert_eq!(out.len(), 1);
        assert_close(out[0].area(), 1.0, 1e-9);
        assert_bounds_close(&out[0], p.bounds());
    }

    #[test]
    fn union_of_disjoint_squares() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(2.0, 0.0, 1.0);
        let mut out = union(&[a.clone(), b.clone()]).unwrap().found().unwrap();
        assert_eq!(out.len(), 2);

        out.sort_by(|p, q| p.bounds().0.0.total_cmp(&q.bounds().0.0));
        assert_bounds_close(&out[0], a.bounds());
        assert_bounds_close(&out[1], b.bounds());
        for piece in &out {
            assert_close(piece.area(), 1.0, 1e-9);
        }
    }

    #[test]
    fn union_of_diagonally_overlapping_squares() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(0.5, 0.5, 1.0);
        let out = union(&[a, b]).unwrap().found().unwrap();
        assert_eq!(out.len(), 1);
        assert_close(shoelace(out[0].vertices()), 2.0 - 0.25, 1e-9);
    }

    #[test]
    fn union_of_squares_offset_in_x() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(0.5, 0.0, 1.0);
        let out = union(&[a, b]).unwrap().found().unwrap();
        assert_eq!(out.len(), 1);
        assert_close(shoelace(out[0].vertices()), 1.5, 1e-9);
        assert_bounds_close(&out[0], ((0.0, 0.0), (1.5, 1.0)));
    }

    #[test]
    fn union_ignores_winding_direction() {
        let a = square(0.0, 0.0, 1.0);
        let mut cw: Vec<(f64, f64)> = square(0.5, 0.5, 1.0).open_vertices().to_vec();
        cw.reverse();
        let b = Polygon::new(cw).unwrap();
        let out = union(&[a, b]).unwrap().found().unwrap();
        assert_eq!(out.len(), 1);
        assert_close(out[0].area(), 1.75, 1e-9);
    }

    #[test]
    fn union_drops_enclosed_hole() {
        // Four bars framing a 1x1 gap in the middle of a 3x3 block.
        let bars = [
            Polygon::new(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 1.0), (0.0, 1.0)]).unwrap(),
            Polygon::new(vec![(0.0, 2.0), (3.0, 2.0), (3.0, 3.0), (0.0, 3.0)]).unwrap(),
            Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 3.0), (0.0, 3.0)]).unwrap(),
            Polygon::new(vec![(2.0, 0.0), (3.0, 0.0), (3.0, 3.0), (2.0, 3.0)]).unwrap(),
        ];
        let out = union(&bars).unwrap().found().unwrap();
        assert_eq!(out.len(), 1);
        assert_close(out[0].area(), 9.0, 1e-9);
    }

    #[test]
    fn union_rejects_self_intersecting_input() {
        let bowtie = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]).unwrap();
        assert!(matches!(
            union(&[square(0.0, 0.0, 1.0), bowtie]),
            Err(GeometryError::SelfIntersecting { .. })
        ));
    }

    #[test]
    fn map_vertices_transforms_ring() {
        let p = square(0.0, 0.0, 1.0);
        let shifted = p.map_vertices(|&(x, y)| (x + 10.0, y - 1.0)).unwrap();
        assert_eq!(shifted.bounds(), ((10.0, -1.0), (11.0, 0.0)));
        assert_eq!(shifted.vertices().len(), 5);
    }

    #[test]
    fn serde_roundtrip_through_validation() {
        let p = square(0.0, 0.0, 1.0);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.starts_with("[[0.0,0.0],[1.0,0.0]"));
        let back: Polygon = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let bad: std::result::Result<Polygon, _> = serde_json::from_str("[[0.0,0.0],[1.0,1.0]]");
        assert!(bad.is_err());
    }
}
