//! Grid-search configuration and the deterministic work partition.

use std::iter::StepBy;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// How the flat index range `0..n` is split across workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Worker `w` takes one contiguous block; block sizes differ by at most one.
    #[default]
    Contiguous,
    /// Worker `w` takes indices `w, w + W, w + 2W, ...`.
    Strided,
}

impl Partition {
    /// Indices assigned to `worker` out of `workers` for `n` points, ascending.
    ///
    /// A pure function of `(n, workers, worker)`; the union over all workers
    /// is `0..n` with no overlap.
    #[must_use]
    pub fn indices(self, n: usize, workers: usize, worker: usize) -> StepBy<Range<usize>> {
        match self {
            Self::Contiguous => {
                let lo = worker * n / workers;
                let hi = (worker + 1) * n / workers;
                (lo..hi).step_by(1)
            }
            Self::Strided => (worker.min(n)..n).step_by(workers),
        }
    }
}

/// Configuration for a grid search.
///
/// Construct via [`GridSearchConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter   | Default                          |
/// |-------------|----------------------------------|
/// | `workers`   | size of the global rayon pool    |
/// | `partition` | [`Partition::Contiguous`]        |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridSearchConfig {
    pub(crate) workers: Option<usize>,
    pub(crate) partition: Partition,
}

impl GridSearchConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers, i.e. the size of the dedicated pool.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidWorkers`] if `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, SearchError> {
        if workers == 0 {
            return Err(SearchError::InvalidWorkers { workers });
        }
        self.workers = Some(workers);
        Ok(self)
    }

    /// Set the partition scheme.
    #[must_use]
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Return the number of workers the search will use.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(rayon::current_num_threads)
    }

    /// Return the partition scheme.
    #[must_use]
    pub fn partition(&self) -> Partition {
        self.partition
    }
}
