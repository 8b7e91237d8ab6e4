//! Waveform misfit evaluation for seismic source inversion.
//!
//! Provides moment-tensor and force sources, per-station Green's tensors
//! that turn a source into synthetic waveforms, source wavelets, and the
//! misfit function comparing synthetics with observed data under
//! component matching, weighting, and grouped time-shift search.

mod error;
mod greens;
mod misfit;
mod source;
mod wavelet;

pub use error::MisfitError;
pub use greens::{GreensComponent, GreensTensor, GreensTensorList};
pub use misfit::{Misfit, MisfitEvaluation, Norm, PreparedMisfit, ShiftCriterion, SkippedTrace};
pub use source::{
    magnitude_from_moment, moment_from_magnitude, Force, MomentTensor, Source, SourceKind,
};
pub use wavelet::Wavelet;
