use quakefit_waveform::{DatasetError, WaveformError};

use crate::source::SourceKind;

/// Errors from source construction, Green's tensors, and misfit evaluation.
#[derive(Debug, thiserror::Error)]
pub enum MisfitError {
    /// Returned when a data trace and its synthetic violate the windowing
    /// contract: unequal sample interval, synthetic shorter than the data,
    /// or an odd length surplus.
    #[error("shape mismatch at {id} channel {channel}: {reason}")]
    Shape {
        /// Station identifier.
        id: String,
        /// Channel code of the data trace.
        channel: String,
        /// Human-readable description of the mismatch.
        reason: String,
    },

    /// Returned when a data record has no Green's tensor with the same identifier.
    #[error("no Green's tensor for station {id}")]
    MissingGreens {
        /// Station identifier of the data record.
        id: String,
    },

    /// Returned when a source is evaluated against Green's tensors of the other kind.
    #[error("Green's tensor {id} expects a {expected} source, got {got}")]
    SourceKindMismatch {
        /// Station identifier of the Green's tensor.
        id: String,
        /// Kind the Green's tensor was built for.
        expected: SourceKind,
        /// Kind of the offered source.
        got: SourceKind,
    },

    /// Returned when the time-shift bounds do not satisfy `min <= 0 <= max`
    /// with both finite.
    #[error("invalid time-shift window [{min}, {max}]")]
    InvalidTimeShift {
        /// Lower bound in seconds.
        min: f64,
        /// Upper bound in seconds.
        max: f64,
    },

    /// Returned when a compared pair's misfit overflows to infinity or NaN.
    #[error("non-finite misfit at {id} channel {channel}")]
    NonFiniteMisfit {
        /// Station identifier.
        id: String,
        /// Channel code of the data trace.
        channel: String,
    },

    /// Returned when a Green's tensor is malformed.
    #[error("invalid Green's tensor {id}: {reason}")]
    InvalidGreens {
        /// Station identifier, or `"?"` when none can be derived.
        id: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when source parameters are non-finite or out of range.
    #[error("invalid source: {reason}")]
    InvalidSource {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when wavelet durations are non-positive or inconsistent.
    #[error("invalid wavelet: {reason}")]
    InvalidWavelet {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Wraps a Dataset error raised while assembling synthetics.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Wraps a trace validation error raised while assembling synthetics.
    #[error("waveform error: {0}")]
    Waveform(#[from] WaveformError),
}
