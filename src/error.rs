//! # Error Types
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`BrkupError`]. Errors are raised at the point of detection and propagated
//! unchanged; no operation returns partial results.

use thiserror::Error;

/// Errors that can occur while loading, regridding or masking gridded data.
#[derive(Error, Debug)]
pub enum BrkupError {
    /// Coordinate arrays and data arrays disagree in shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Region name not present in the NSIDC region table.
    #[error("unknown region name: {0}")]
    UnknownRegion(String),

    /// Box name not present in the named box table.
    #[error("unknown box name: {0}")]
    UnknownBox(String),

    /// Two grids that must align do not.
    #[error("dimensions do not match: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A bathymetry level index points outside the depth-level array.
    #[error("level index {index} at ({row}, {col}) is out of range for {levels} depth levels")]
    IndexOutOfRange {
        index: i64,
        row: usize,
        col: usize,
        levels: usize,
    },

    /// Too few points along an axis for the requested operation.
    #[error("axis '{axis}' has {len} points, at least {required} are required")]
    InsufficientGrid {
        axis: String,
        len: usize,
        required: usize,
    },

    /// A coordinate axis is not strictly increasing.
    #[error("axis '{0}' is not strictly monotonic")]
    NonMonotonicAxis(String),

    /// The requested region code does not occur in the category raster.
    #[error("region code {0} does not occur in the category raster")]
    EmptyRegion(i32),

    /// A bounding box selects no cells.
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    /// A required NetCDF variable is missing.
    #[error("variable '{0}' not found")]
    MissingVariable(String),

    /// CF time units could not be parsed.
    #[error("invalid time units: {0}")]
    InvalidTimeUnits(String),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl BrkupError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create an InsufficientGrid error.
    pub fn insufficient(axis: impl Into<String>, len: usize, required: usize) -> Self {
        Self::InsufficientGrid {
            axis: axis.into(),
            len,
            required,
        }
    }
}

/// Result type for all library operations.
pub type Result<T> = std::result::Result<T, BrkupError>;
