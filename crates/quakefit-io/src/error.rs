//! I/O error types for quakefit-io.

use std::path::PathBuf;

use quakefit_misfit::MisfitError;
use quakefit_search::{SearchError, SurfaceError};
use quakefit_waveform::DatasetError;

/// Errors from problem input, score tables, and result artifacts.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a JSON problem file cannot be parsed.
    #[error("JSON parse error in {path} at line {line}, column {column}")]
    JsonParse {
        /// Path to the JSON file.
        path: PathBuf,
        /// One-based line of the error.
        line: usize,
        /// One-based column of the error.
        column: usize,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a problem file parses but describes no usable search.
    #[error("invalid problem in {path}: {reason}")]
    InvalidProblem {
        /// Path to the problem file.
        path: PathBuf,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when a band's records cannot be assembled into a dataset.
    #[error("band {band}: {source}")]
    Dataset {
        /// Name of the band.
        band: String,
        /// The underlying dataset error.
        source: DatasetError,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a CSV table header has no parameter column.
    #[error("invalid table header in {path}: {reason}")]
    InvalidTableHeader {
        /// Path to the CSV file.
        path: PathBuf,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when a CSV table has a header but zero data rows.
    #[error("empty table (no data rows) in {path}")]
    EmptyTable {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell cannot be parsed as a float, or a parameter cell
    /// is not finite.
    #[error("bad value in {path}: row {row_index}, column {col_index}, raw value \"{raw}\"")]
    BadValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Zero-based column index.
        col_index: usize,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when the event name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid event name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidEventName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a CSV table cannot be written.
    #[error("cannot write CSV table {path}")]
    CsvWrite {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a result artifact cannot be encoded as JSON.
    #[error("cannot encode {path} as JSON")]
    JsonEncode {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Wraps a misfit error, e.g. an invalid wavelet.
    #[error(transparent)]
    Misfit(#[from] MisfitError),

    /// Wraps a search error, e.g. an invalid grid definition.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Wraps a surface error, e.g. a malformed table.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
