//! Domain types for quakefit-io.

use serde::{Deserialize, Serialize};

use quakefit_misfit::Source;
use quakefit_search::{
    Band, DoubleCoupleGridRandom, DoubleCoupleGridRegular, ForceGridRegular, Grid, SearchError,
    UnstructuredGrid,
};
use quakefit_waveform::Origin;

use crate::IoError;

/// A validated event name for dataset ids and output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName(String);

impl EventName {
    /// Parse and validate an event name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidEventName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidEventName { name });
        }
        Ok(Self(name))
    }

    /// Return the event name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which source grid a problem searches.
///
/// Tagged by `"type"` in the problem file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridSpec {
    /// [`DoubleCoupleGridRegular`].
    DoubleCoupleRegular {
        /// Points per orientation axis.
        npts_per_axis: usize,
        /// Moment magnitudes.
        magnitudes: Vec<f64>,
    },
    /// [`DoubleCoupleGridRandom`]; the seed falls back to the caller's.
    DoubleCoupleRandom {
        /// Number of orientations.
        npts: usize,
        /// Moment magnitudes.
        magnitudes: Vec<f64>,
        /// Sampling seed.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// [`ForceGridRegular`].
    ForceRegular {
        /// Points per direction axis.
        npts_per_axis: usize,
        /// Force magnitudes in N.
        magnitudes_in_n: Vec<f64>,
    },
    /// [`UnstructuredGrid`].
    Unstructured {
        /// Explicit candidate sources.
        sources: Vec<Source>,
    },
}

impl GridSpec {
    /// Short label for logs and result files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DoubleCoupleRegular { .. } => "double_couple_regular",
            Self::DoubleCoupleRandom { .. } => "double_couple_random",
            Self::ForceRegular { .. } => "force_regular",
            Self::Unstructured { .. } => "unstructured",
        }
    }

    /// Build the grid. `seed` is used when a random grid does not carry its own.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidGrid`] for invalid grid parameters.
    pub fn build(&self, seed: u64) -> Result<Box<dyn Grid>, SearchError> {
        Ok(match self {
            Self::DoubleCoupleRegular {
                npts_per_axis,
                magnitudes,
            } => Box::new(DoubleCoupleGridRegular::new(
                *npts_per_axis,
                magnitudes.clone(),
            )?),
            Self::DoubleCoupleRandom {
                npts,
                magnitudes,
                seed: own,
            } => Box::new(DoubleCoupleGridRandom::new(
                *npts,
                magnitudes.clone(),
                own.unwrap_or(seed),
            )?),
            Self::ForceRegular {
                npts_per_axis,
                magnitudes_in_n,
            } => Box::new(ForceGridRegular::new(
                *npts_per_axis,
                magnitudes_in_n.clone(),
            )?),
            Self::Unstructured { sources } => Box::new(UnstructuredGrid::new(sources.clone())?),
        })
    }
}

/// A complete inversion problem as read from a problem file.
///
/// Green's tensors have already been convolved with the problem's wavelet.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Event name, also the id of every band's dataset.
    pub event: EventName,
    /// Candidate origins, e.g. one per trial depth.
    pub origins: Vec<Origin>,
    /// Frequency bands; per-band misfits are summed.
    pub bands: Vec<Band>,
    /// The source grid to search.
    pub grid: GridSpec,
}
