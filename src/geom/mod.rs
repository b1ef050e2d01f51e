pub mod sphere;
pub mod tan;

pub use sphere::SkyCoord;
pub use tan::{Deprojection, TangentPlane};
