//! Sky footprint geometry for M31 survey maps.
//!
//! Andromap projects sky coordinates onto a tangent plane centered on M31,
//! combines survey footprints into union polygons, and builds isophote
//! ellipses from a radial surface-brightness profile. Rendering is left to
//! the caller; everything here returns plain polygons.

pub mod constants;
pub mod ellipse;
pub mod error;
pub mod fields;
pub mod geom;
pub mod imagelog;
pub mod lookup;
pub mod polygon;

pub use error::{DataError, GeometryError};
pub use geom::{Deprojection, SkyCoord, TangentPlane};
pub use lookup::Lookup;
pub use polygon::Polygon;
