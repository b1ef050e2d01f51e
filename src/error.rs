use thiserror::Error;

/// Invalid input to the geometric core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("degenerate polygon: {0}")]
    DegeneratePolygon(String),

    #[error("self-intersecting polygon: edges {first} and {second} cross")]
    SelfIntersecting { first: usize, second: usize },

    #[error("non-finite coordinate at vertex {0}")]
    NonFinite(usize),

    #[error("array shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("invalid radial profile: {0}")]
    InvalidProfile(String),
}

/// Failures loading or querying footprint data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("document {index} has no usable footprint: {reason}")]
    InvalidDocument { index: usize, reason: String },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid sexagesimal value: {0}")]
    InvalidSexagesimal(String),
}

pub type Result<T> = std::result::Result<T, GeometryError>;
