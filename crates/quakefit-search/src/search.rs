//! Parallel grid search over sources and candidate origins.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use quakefit_misfit::{
    GreensTensorList, Misfit, MisfitError, MisfitEvaluation, PreparedMisfit, Source,
};
use quakefit_waveform::{Dataset, Origin};

use crate::config::GridSearchConfig;
use crate::error::SearchError;
use crate::grid::Grid;
use crate::result::SearchResult;

/// One frequency band of a problem: processed data, Green's tensors for
/// every candidate origin, and the misfit function comparing them.
#[derive(Debug, Clone)]
pub struct Band {
    /// Band label, e.g. `"body_waves"`.
    pub name: String,
    /// Processed observed data.
    pub data: Dataset,
    /// Green's tensors, possibly for several origins.
    pub greens: GreensTensorList,
    /// Misfit function for this band.
    pub misfit: Misfit,
}

impl Band {
    /// Create a band.
    #[must_use]
    pub fn new(name: &str, data: Dataset, greens: GreensTensorList, misfit: Misfit) -> Self {
        Self {
            name: name.to_string(),
            data,
            greens,
            misfit,
        }
    }

    /// Re-evaluate `source` at `origin` with annotated synthetics.
    ///
    /// # Errors
    ///
    /// Any [`MisfitError`] from preparation or evaluation.
    pub fn evaluate_annotated(
        &self,
        origin: &Origin,
        source: &Source,
    ) -> Result<MisfitEvaluation, MisfitError> {
        let greens = self.greens.select(origin);
        self.misfit.evaluate_annotated(&self.data, &greens, source)
    }
}

impl GridSearchConfig {
    /// Evaluate every (source, origin) pair and sum the misfit over bands.
    ///
    /// The flat index of a pair is `source_index * origins.len() + origin_index`.
    /// Each band's Green's tensors are selected per origin and the misfit
    /// prepared once before the pool starts. Scores do not depend on the
    /// worker count or the partition scheme.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SearchError::NoBands`] | `bands` is empty |
    /// | [`SearchError::NoOrigins`] | `origins` is empty |
    /// | [`SearchError::EmptyGrid`] | `grid` has no points |
    /// | [`SearchError::Prepare`] | A band fails to prepare at an origin |
    /// | [`SearchError::ThreadPool`] | The worker pool cannot be built |
    /// | [`SearchError::Evaluation`] | Any grid point fails; the lowest failing index is reported |
    #[instrument(skip_all, fields(
        n_sources = grid.len(),
        n_origins = origins.len(),
        n_bands = bands.len(),
        workers = self.workers(),
        partition = ?self.partition,
    ))]
    pub fn search<G: Grid + ?Sized>(
        &self,
        bands: &[Band],
        grid: &G,
        origins: &[Origin],
    ) -> Result<SearchResult, SearchError> {
        if bands.is_empty() {
            return Err(SearchError::NoBands);
        }
        if origins.is_empty() {
            return Err(SearchError::NoOrigins);
        }
        if grid.is_empty() {
            return Err(SearchError::EmptyGrid);
        }
        let start = Instant::now();

        // ── prepare ────────────────────────────────────────────────────
        let selected: Vec<Vec<GreensTensorList>> = origins
            .iter()
            .map(|o| bands.iter().map(|b| b.greens.select(o)).collect())
            .collect();
        let prepared: Vec<Vec<PreparedMisfit<'_>>> = selected
            .iter()
            .enumerate()
            .map(|(oi, per_band)| {
                bands
                    .iter()
                    .zip(per_band)
                    .map(|(band, greens)| {
                        band.misfit
                            .prepare(&band.data, greens)
                            .map_err(|source| SearchError::Prepare {
                                band: band.name.clone(),
                                origin: oi,
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        // ── evaluate ───────────────────────────────────────────────────
        let n_origins = origins.len();
        let n = grid.len() * n_origins;
        let workers = self.workers();
        let partition = self.partition;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|source| SearchError::ThreadPool { source })?;

        let chunks: Vec<Result<Vec<(usize, f64)>, SearchError>> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|w| -> Result<Vec<(usize, f64)>, SearchError> {
                    let mut out = Vec::new();
                    for index in partition.indices(n, workers, w) {
                        let source = grid.get(index / n_origins)?;
                        let mut total = 0.0;
                        for band in &prepared[index % n_origins] {
                            total += band
                                .evaluate(&source)
                                .map_err(|err| SearchError::Evaluation { index, source: err })?;
                        }
                        out.push((index, total));
                    }
                    debug!(worker = w, n = out.len(), "chunk complete");
                    Ok(out)
                })
                .collect()
        });

        // ── gather ─────────────────────────────────────────────────────
        let mut scores = vec![f64::NAN; n];
        let mut first_error: Option<(usize, SearchError)> = None;
        for chunk in chunks {
            match chunk {
                Ok(values) => {
                    for (index, value) in values {
                        scores[index] = value;
                    }
                }
                Err(err) => {
                    let at = error_index(&err);
                    if first_error.as_ref().is_none_or(|(i, _)| at < *i) {
                        first_error = Some((at, err));
                    }
                }
            }
        }
        if let Some((_, err)) = first_error {
            return Err(err);
        }

        let result = SearchResult::new(scores, grid.len(), origins.to_vec());
        info!(
            n,
            best = result.best().map(|b| b.score),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "grid search complete"
        );
        Ok(result)
    }
}

/// Flat index an error is attributed to, for choosing the lowest failure.
fn error_index(err: &SearchError) -> usize {
    match err {
        SearchError::Evaluation { index, .. } => *index,
        _ => usize::MAX,
    }
}
