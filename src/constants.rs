//! Fixed quantities for maps centered on M31.

/// Right ascension of the M31 nucleus, degrees.
pub const M31_RA0: f64 = 10.6846833;

/// Declination of the M31 nucleus, degrees.
pub const M31_DEC0: f64 = 41.2690361;

/// Adopted distance to M31 in kpc.
pub const D_KPC: f64 = 785.0;

/// Width of a narrowband (CFH12K-sized) field of view, degrees.
pub const NB_FIELD_WIDTH_DEG: f64 = 42.0 / 60.0;

/// Height of a narrowband field of view, degrees.
pub const NB_FIELD_HEIGHT_DEG: f64 = 28.0 / 60.0;

/// Heightwise overlap between adjacent narrowband fields, degrees.
pub const NB_FIELD_OVERLAP_DEG: f64 = 4.0 / 60.0;
