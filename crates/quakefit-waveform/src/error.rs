//! Error types for trace validation and Dataset operations.

/// Errors from trace construction and validation.
#[derive(Debug, thiserror::Error)]
pub enum WaveformError {
    /// Returned when a trace is constructed with no samples.
    #[error("trace {channel} has no samples")]
    EmptyTrace {
        /// Channel code of the offending trace.
        channel: String,
    },

    /// Returned when a sample is NaN, infinity, or negative infinity.
    #[error("trace {channel} contains non-finite sample at index {index}")]
    NonFiniteSample {
        /// Channel code of the offending trace.
        channel: String,
        /// Position of the first non-finite sample found.
        index: usize,
    },

    /// Returned when the sample interval is zero, negative, or non-finite.
    #[error("trace {channel} has invalid sample interval {delta}")]
    InvalidDelta {
        /// Channel code of the offending trace.
        channel: String,
        /// The rejected sample interval in seconds.
        delta: f64,
    },

    /// Returned when the channel code is empty, so no component can be derived.
    #[error("channel code must be non-empty")]
    EmptyChannel,

    /// Returned when a trace weight is negative or non-finite.
    #[error("trace {channel} has invalid weight {weight}")]
    InvalidWeight {
        /// Channel code of the offending trace.
        channel: String,
        /// The rejected weight.
        weight: f64,
    },
}

/// Errors from [`Dataset`](crate::Dataset) operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Returned when a record cannot be appended because it is not a
    /// well-formed single-station bundle.
    #[error("malformed record {id}: {reason}")]
    MalformedRecord {
        /// Identifier of the record, or `"?"` when none can be derived.
        id: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when `select` is called without an origin or a station.
    #[error("no selection criteria given for Dataset::select")]
    NoSelectionCriteria,

    /// Returned when a per-record argument sequence is shorter than the Dataset.
    #[error("argument sequence has {got} items, Dataset has {needed} records")]
    SequenceTooShort {
        /// Number of records in the Dataset.
        needed: usize,
        /// Number of items in the supplied sequence.
        got: usize,
    },

    /// Returned when a tag is empty.
    #[error("tags must be non-empty strings")]
    InvalidTag,

    /// Wraps a trace validation error raised while building a record.
    #[error("invalid trace: {0}")]
    Waveform(#[from] WaveformError),
}
