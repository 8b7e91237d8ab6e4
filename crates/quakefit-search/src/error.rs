use std::path::PathBuf;

use quakefit_misfit::MisfitError;

/// Errors from grid construction and grid search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Returned when a grid is built with invalid parameters.
    #[error("invalid grid: {reason}")]
    InvalidGrid {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when a grid index is out of range.
    #[error("grid index {index} out of range for grid of {len} points")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of grid points.
        len: usize,
    },

    /// Returned when a search is started over an empty grid.
    #[error("grid has no points")]
    EmptyGrid,

    /// Returned when a search is started without bands.
    #[error("grid search needs at least one band")]
    NoBands,

    /// Returned when a search is started without candidate origins.
    #[error("grid search needs at least one origin")]
    NoOrigins,

    /// Returned when the worker count is zero.
    #[error("workers must be at least 1, got {workers}")]
    InvalidWorkers {
        /// The invalid worker count.
        workers: usize,
    },

    /// Returned when the dedicated thread pool cannot be created.
    #[error("failed to build worker pool")]
    ThreadPool {
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when a band cannot be prepared for an origin before the search.
    #[error("band {band} at origin {origin}: {source}")]
    Prepare {
        /// Name of the band.
        band: String,
        /// Position of the origin in the candidate list.
        origin: usize,
        /// The underlying misfit error.
        source: MisfitError,
    },

    /// Returned when evaluating a grid point fails. Aborts the whole search.
    #[error("evaluation failed at grid index {index}: {source}")]
    Evaluation {
        /// Flat index `source_index * n_origins + origin_index`.
        index: usize,
        /// The underlying misfit error.
        source: MisfitError,
    },

    /// Wraps a misfit error raised outside the parallel loop.
    #[error("misfit error: {0}")]
    Misfit(#[from] MisfitError),

    /// Wraps a surface error raised while assembling the score surface.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Errors from score-surface construction, reduction, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// Returned when the number of values does not match the surface shape.
    #[error("surface shape holds {expected} values, got {got}")]
    ShapeMismatch {
        /// Product of axis lengths, or number of table rows.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// Returned when an axis or column has no coordinates or a table row has
    /// the wrong width.
    #[error("malformed surface: {reason}")]
    Malformed {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when a named axis or column does not exist.
    #[error("unknown axis {name}")]
    UnknownAxis {
        /// The requested axis name.
        name: String,
    },

    /// Returned when sigma is non-finite or not positive.
    #[error("sigma must be finite and positive, got {sigma}")]
    InvalidSigma {
        /// The rejected sigma.
        sigma: f64,
    },

    /// Returned when a likelihood-based profile is requested without sigma.
    #[error("{mode} profile requires sigma")]
    MissingSigma {
        /// The requested profile mode.
        mode: &'static str,
    },

    /// Returned when every value of the surface is NaN.
    #[error("surface has no finite values")]
    NoFiniteValues,

    /// Returned when a reduction is not available for the surface variant.
    #[error("{operation} is not supported for {variant} surfaces")]
    Unsupported {
        /// The requested reduction.
        operation: &'static str,
        /// The surface variant.
        variant: &'static str,
    },

    /// Returned when surface serialization fails.
    #[error("failed to serialize surface")]
    SerializeSurface {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when surface deserialization fails.
    #[error("failed to deserialize surface from {path}")]
    DeserializeSurface {
        /// Path to the file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the surface file fails.
    #[error("failed to write surface to {path}")]
    WriteSurface {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the surface file fails.
    #[error("failed to read surface from {path}")]
    ReadSurface {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the file was written by an incompatible format version.
    #[error("incompatible surface format version {found} in {path} (expected {expected})")]
    IncompatibleVersion {
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
        /// Path to the file.
        path: PathBuf,
    },
}
