//! Waveform misfit between observed data and synthetics, with time-shift search.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use quakefit_waveform::{Dataset, StationId, Trace};

use crate::error::MisfitError;
use crate::greens::{GreensTensor, GreensTensorList};
use crate::source::Source;

/// Relative tolerance when comparing sample intervals of data and synthetics.
const DELTA_RTOL: f64 = 1e-9;

/// Slack, in samples, when converting time-shift bounds to integer lags.
const LAG_TOL: f64 = 1e-6;

/// Residual norm applied per trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    /// `delta * Σ r²`.
    #[default]
    L2,
    /// `delta * Σ |r|`.
    L1,
    /// `sqrt(delta * Σ r²)`.
    Hybrid,
}

/// How the lag of a time-shift group is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftCriterion {
    /// Lag with the lowest group misfit.
    #[default]
    MinimizeMisfit,
    /// Lag with the highest normalized group cross-correlation,
    /// `Σ w·dot / sqrt(Σ w·|d|² · Σ w·|s|²)`.
    MaximizeCorrelation,
}

/// Misfit function configuration.
///
/// Construct via [`Misfit::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter           | Default                          |
/// |---------------------|----------------------------------|
/// | `norm`              | [`Norm::L2`]                     |
/// | `time_shift_min`    | `-time_shift_max`                |
/// | `time_shift_max`    | 0.0 s                            |
/// | `time_shift_groups` | `["ZRT"]`                        |
/// | `criterion`         | [`ShiftCriterion::MinimizeMisfit`] |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Misfit {
    pub(crate) norm: Norm,
    pub(crate) time_shift_min: Option<f64>,
    pub(crate) time_shift_max: f64,
    pub(crate) time_shift_groups: Vec<String>,
    pub(crate) criterion: ShiftCriterion,
}

impl Default for Misfit {
    fn default() -> Self {
        Self {
            norm: Norm::L2,
            time_shift_min: None,
            time_shift_max: 0.0,
            time_shift_groups: vec!["ZRT".to_string()],
            criterion: ShiftCriterion::MinimizeMisfit,
        }
    }
}

/// A weighted data trace with no synthetic of the same component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTrace {
    /// Station identifier.
    pub id: StationId,
    /// Channel code of the data trace.
    pub channel: String,
}

/// Result of [`Misfit::evaluate_annotated`].
#[derive(Debug, Clone)]
pub struct MisfitEvaluation {
    /// Total misfit; `0.0` when nothing was compared.
    pub total: f64,
    /// Synthetics in data order, with `time_shift`, `misfit` and `max_cc`
    /// set on every compared trace.
    pub synthetics: Dataset,
    /// Weighted data traces left out for lack of a matching synthetic.
    pub skipped: Vec<SkippedTrace>,
    /// Number of data/synthetic trace pairs compared.
    pub n_compared: usize,
}

impl Misfit {
    /// Create a misfit function with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the residual norm.
    #[must_use]
    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    /// Set the largest allowed time shift in seconds.
    #[must_use]
    pub fn with_time_shift_max(mut self, seconds: f64) -> Self {
        self.time_shift_max = seconds;
        self
    }

    /// Set the smallest allowed time shift in seconds (non-positive).
    #[must_use]
    pub fn with_time_shift_min(mut self, seconds: f64) -> Self {
        self.time_shift_min = Some(seconds);
        self
    }

    /// Set the time-shift groups, each a string of component codes sharing
    /// one lag, e.g. `["ZR", "T"]`.
    #[must_use]
    pub fn with_time_shift_groups(mut self, groups: &[&str]) -> Self {
        self.time_shift_groups = groups.iter().map(|g| g.to_ascii_uppercase()).collect();
        self
    }

    /// Set the lag selection criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: ShiftCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Return the residual norm.
    #[must_use]
    pub fn norm(&self) -> Norm {
        self.norm
    }

    /// Return the smallest allowed time shift in seconds.
    #[must_use]
    pub fn time_shift_min(&self) -> f64 {
        self.time_shift_min.unwrap_or(-self.time_shift_max)
    }

    /// Return the largest allowed time shift in seconds.
    #[must_use]
    pub fn time_shift_max(&self) -> f64 {
        self.time_shift_max
    }

    /// Return the time-shift groups.
    #[must_use]
    pub fn time_shift_groups(&self) -> &[String] {
        &self.time_shift_groups
    }

    /// Return the lag selection criterion.
    #[must_use]
    pub fn criterion(&self) -> ShiftCriterion {
        self.criterion
    }

    fn validate(&self) -> Result<(), MisfitError> {
        let (min, max) = (self.time_shift_min(), self.time_shift_max);
        if !(min.is_finite() && max.is_finite() && min <= 0.0 && max >= 0.0) {
            return Err(MisfitError::InvalidTimeShift { min, max });
        }
        Ok(())
    }

    /// Pair data traces with Green's function components and check shapes,
    /// once, ahead of repeated evaluation.
    ///
    /// `greens` must already be selected to the data's origin. Weighted data
    /// traces without a component match are reported as skipped and logged.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MisfitError::InvalidTimeShift`] | Bounds are non-finite or do not bracket zero |
    /// | [`MisfitError::MissingGreens`] | A data record has no Green's tensor with its identifier |
    /// | [`MisfitError::Shape`] | A pair breaks the windowing contract |
    #[instrument(skip_all, fields(n_records = data.len(), n_greens = greens.len()))]
    pub fn prepare<'a>(
        &'a self,
        data: &'a Dataset,
        greens: &'a GreensTensorList,
    ) -> Result<PreparedMisfit<'a>, MisfitError> {
        self.validate()?;
        let mut stations = Vec::with_capacity(data.len());
        let mut skipped = Vec::new();

        for record in data {
            let tensor = greens
                .get(record.id())
                .ok_or_else(|| MisfitError::MissingGreens {
                    id: record.id().to_string(),
                })?;

            let mut pairs = Vec::new();
            for trace in record.traces() {
                if !trace.is_weighted() {
                    continue;
                }
                let Some(component) = tensor.component_index(trace.component()) else {
                    warn!(
                        id = %record.id(),
                        channel = trace.channel(),
                        "no synthetic for component, trace skipped"
                    );
                    skipped.push(SkippedTrace {
                        id: record.id().clone(),
                        channel: trace.channel().to_string(),
                    });
                    continue;
                };
                let padding = check_shape(record.id(), trace, tensor, component)?;
                pairs.push(Pair {
                    data: trace,
                    component,
                    padding,
                });
            }

            let unpaired = (0..tensor.components().len())
                .filter(|c| !pairs.iter().any(|p| p.component == *c))
                .collect();
            let groups = self.group_pairs(record.id(), pairs)?;
            stations.push(StationPlan {
                greens: tensor,
                groups,
                unpaired,
            });
        }

        let prepared = PreparedMisfit {
            misfit: self,
            dataset_id: data.id(),
            stations,
            skipped,
        };
        debug!(
            n_compared = prepared.n_compared(),
            n_skipped = prepared.skipped.len(),
            "misfit prepared"
        );
        Ok(prepared)
    }

    fn group_pairs<'a>(
        &self,
        id: &StationId,
        pairs: Vec<Pair<'a>>,
    ) -> Result<Vec<Group<'a>>, MisfitError> {
        let mut declared: Vec<Vec<Pair<'a>>> = vec![Vec::new(); self.time_shift_groups.len()];
        let mut singletons = Vec::new();
        for pair in pairs {
            let c = pair.data.component();
            match self
                .time_shift_groups
                .iter()
                .position(|g| g.chars().any(|gc| gc.to_ascii_uppercase() == c))
            {
                Some(gi) => declared[gi].push(pair),
                None => singletons.push(vec![pair]),
            }
        }

        declared
            .into_iter()
            .chain(singletons)
            .filter(|pairs| !pairs.is_empty())
            .map(|pairs| {
                let delta = pairs[0].data.delta();
                if let Some(other) = pairs.iter().find(|p| !same_delta(p.data.delta(), delta)) {
                    return Err(MisfitError::Shape {
                        id: id.to_string(),
                        channel: other.data.channel().to_string(),
                        reason: format!(
                            "sample interval {} differs from {delta} within its time-shift group",
                            other.data.delta()
                        ),
                    });
                }
                let lags = candidate_lags(self.time_shift_min(), self.time_shift_max, delta);
                Ok(Group { pairs, lags, delta })
            })
            .collect()
    }

    /// Total misfit of `source` against `data`.
    ///
    /// # Errors
    ///
    /// Any error of [`prepare`](Self::prepare) or [`PreparedMisfit::evaluate`].
    pub fn evaluate(
        &self,
        data: &Dataset,
        greens: &GreensTensorList,
        source: &Source,
    ) -> Result<f64, MisfitError> {
        self.prepare(data, greens)?.evaluate(source)
    }

    /// Total misfit plus annotated synthetics and the skipped-trace report.
    ///
    /// # Errors
    ///
    /// Any error of [`prepare`](Self::prepare) or
    /// [`PreparedMisfit::evaluate_annotated`].
    pub fn evaluate_annotated(
        &self,
        data: &Dataset,
        greens: &GreensTensorList,
        source: &Source,
    ) -> Result<MisfitEvaluation, MisfitError> {
        self.prepare(data, greens)?.evaluate_annotated(source)
    }
}

fn same_delta(a: f64, b: f64) -> bool {
    (a - b).abs() <= DELTA_RTOL * a.abs().max(b.abs())
}

/// Validate one data/synthetic pair and return the synthetic's padding.
fn check_shape(
    id: &StationId,
    trace: &Trace,
    tensor: &GreensTensor,
    component: usize,
) -> Result<usize, MisfitError> {
    let greens = &tensor.components()[component];
    let shape_error = |reason: String| MisfitError::Shape {
        id: id.to_string(),
        channel: trace.channel().to_string(),
        reason,
    };
    if !same_delta(trace.delta(), greens.header().delta) {
        return Err(shape_error(format!(
            "data sample interval {} differs from synthetic {}",
            trace.delta(),
            greens.header().delta
        )));
    }
    let (n_data, n_syn) = (trace.len(), greens.len());
    if n_syn < n_data {
        return Err(shape_error(format!(
            "synthetic has {n_syn} samples, data has {n_data}"
        )));
    }
    let surplus = n_syn - n_data;
    if surplus % 2 != 0 {
        return Err(shape_error(format!(
            "synthetic surplus of {surplus} samples cannot be padded symmetrically"
        )));
    }
    Ok(surplus / 2)
}

/// Integer lags whose time shift `-lag * delta` lies in `[min, max]`,
/// ordered by preference: smallest magnitude first, negative before positive.
fn candidate_lags(min: f64, max: f64, delta: f64) -> Vec<isize> {
    let lo = (-max / delta - LAG_TOL).ceil() as isize;
    let hi = (-min / delta + LAG_TOL).floor() as isize;
    let mut lags: Vec<isize> = (lo..=hi).collect();
    lags.sort_by_key(|lag| (lag.abs(), *lag));
    lags
}

#[derive(Clone)]
struct Pair<'a> {
    data: &'a Trace,
    component: usize,
    padding: usize,
}

struct Group<'a> {
    pairs: Vec<Pair<'a>>,
    lags: Vec<isize>,
    delta: f64,
}

struct StationPlan<'a> {
    greens: &'a GreensTensor,
    groups: Vec<Group<'a>>,
    /// Components with no compared data trace.
    unpaired: Vec<usize>,
}

/// Sums over one comparison window.
#[derive(Debug, Clone, Copy, Default)]
struct WindowStats {
    sq: f64,
    abs: f64,
    dot: f64,
    data_sq: f64,
    syn_sq: f64,
}

impl WindowStats {
    fn compute(data: &[f64], synthetic: &[f64], start: isize) -> Self {
        let mut stats = Self::default();
        for (i, &d) in data.iter().enumerate() {
            let j = start + i as isize;
            let s = if j >= 0 {
                synthetic.get(j as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            let r = d - s;
            stats.sq += r * r;
            stats.abs += r.abs();
            stats.dot += d * s;
            stats.data_sq += d * d;
            stats.syn_sq += s * s;
        }
        stats
    }

    fn max_cc(&self) -> f64 {
        let denom = (self.data_sq * self.syn_sq).sqrt();
        if denom > 0.0 { self.dot / denom } else { 0.0 }
    }
}

impl Norm {
    fn apply(self, stats: &WindowStats, delta: f64) -> f64 {
        match self {
            Self::L2 => delta * stats.sq,
            Self::L1 => delta * stats.abs,
            Self::Hybrid => (delta * stats.sq).sqrt(),
        }
    }
}

/// Outcome for one compared pair at the selected lag.
struct PairOutcome {
    component: usize,
    lag: isize,
    delta: f64,
    misfit: f64,
    max_cc: f64,
}

/// A [`Misfit`] bound to a Dataset and Green's tensors, ready for repeated
/// evaluation. Shared read-only across search workers.
pub struct PreparedMisfit<'a> {
    misfit: &'a Misfit,
    dataset_id: Option<&'a str>,
    stations: Vec<StationPlan<'a>>,
    skipped: Vec<SkippedTrace>,
}

impl PreparedMisfit<'_> {
    /// Return the traces left out for lack of a matching synthetic.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedTrace] {
        &self.skipped
    }

    /// Return the number of data/synthetic pairs compared per evaluation.
    #[must_use]
    pub fn n_compared(&self) -> usize {
        self.stations
            .iter()
            .flat_map(|s| &s.groups)
            .map(|g| g.pairs.len())
            .sum()
    }

    /// Total misfit of `source`; `0.0` when nothing is compared.
    ///
    /// Fails exactly where [`evaluate_annotated`](Self::evaluate_annotated)
    /// does: every synthetic component must be finite, compared or not.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MisfitError::SourceKindMismatch`] | `source` does not match the Green's tensors |
    /// | [`MisfitError::Waveform`] | A synthetic sample is non-finite |
    /// | [`MisfitError::NonFiniteMisfit`] | A compared pair's misfit is non-finite |
    pub fn evaluate(&self, source: &Source) -> Result<f64, MisfitError> {
        let weights = source.weights();
        let mut total = 0.0;
        for station in &self.stations {
            station.greens.check_kind(source)?;
            for &c in &station.unpaired {
                station.greens.components()[c].synthesize_finite(weights)?;
            }
            for group in &station.groups {
                total += self
                    .evaluate_group(group, station.greens, source)?
                    .iter()
                    .map(|o| o.misfit)
                    .sum::<f64>();
            }
        }
        Ok(total)
    }

    /// Total misfit plus synthetics annotated with the selected time shift,
    /// per-trace misfit, and normalized cross-correlation.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MisfitError::SourceKindMismatch`] | `source` does not match the Green's tensors |
    /// | [`MisfitError::Waveform`] | A synthetic sample is non-finite |
    /// | [`MisfitError::NonFiniteMisfit`] | A compared pair's misfit is non-finite |
    #[instrument(skip_all, fields(n_stations = self.stations.len()))]
    pub fn evaluate_annotated(&self, source: &Source) -> Result<MisfitEvaluation, MisfitError> {
        let mut synthetics = Dataset::new();
        if let Some(id) = self.dataset_id {
            synthetics = synthetics.with_id(id);
        }
        let mut total = 0.0;

        for station in &self.stations {
            let mut record = station.greens.get_synthetics(source)?;
            for group in &station.groups {
                for outcome in self.evaluate_group(group, station.greens, source)? {
                    total += outcome.misfit;
                    let attributes = record.traces_mut()[outcome.component].attributes_mut();
                    attributes.time_shift = Some(-(outcome.lag as f64) * outcome.delta);
                    attributes.misfit = Some(outcome.misfit);
                    attributes.max_cc = Some(outcome.max_cc);
                }
            }
            synthetics.append(record)?;
        }

        let n_compared = self.n_compared();
        debug!(total, n_compared, "annotated evaluation complete");
        Ok(MisfitEvaluation {
            total,
            synthetics,
            skipped: self.skipped.clone(),
            n_compared,
        })
    }

    fn evaluate_group(
        &self,
        group: &Group<'_>,
        greens: &GreensTensor,
        source: &Source,
    ) -> Result<Vec<PairOutcome>, MisfitError> {
        let weights = source.weights();
        let synthetics = group
            .pairs
            .iter()
            .map(|p| greens.components()[p.component].synthesize_finite(weights))
            .collect::<Result<Vec<_>, _>>()?;

        // ── lag search ─────────────────────────────────────────────────
        let mut best: Option<(isize, f64, Vec<WindowStats>)> = None;
        for &lag in &group.lags {
            let stats: Vec<WindowStats> = group
                .pairs
                .iter()
                .zip(&synthetics)
                .map(|(p, s)| WindowStats::compute(p.data.data(), s, p.padding as isize + lag))
                .collect();
            let score = self.group_score(group, &stats);
            let better = match &best {
                None => true,
                Some((_, best_score, _)) => score < *best_score,
            };
            if better {
                best = Some((lag, score, stats));
            }
        }

        // ── per-pair outcome ───────────────────────────────────────────
        let Some((lag, _, stats)) = best else {
            return Ok(Vec::new());
        };
        group
            .pairs
            .iter()
            .zip(&stats)
            .map(|(p, st)| {
                let misfit = p.data.weight() * self.misfit.norm.apply(st, group.delta);
                if !misfit.is_finite() {
                    return Err(MisfitError::NonFiniteMisfit {
                        id: greens.id().to_string(),
                        channel: p.data.channel().to_string(),
                    });
                }
                Ok(PairOutcome {
                    component: p.component,
                    lag,
                    delta: group.delta,
                    misfit,
                    max_cc: st.max_cc(),
                })
            })
            .collect()
    }

    /// Lower is better under either criterion.
    fn group_score(&self, group: &Group<'_>, stats: &[WindowStats]) -> f64 {
        let weighted = group.pairs.iter().zip(stats).map(|(p, st)| (p.data.weight(), st));
        match self.misfit.criterion {
            ShiftCriterion::MinimizeMisfit => weighted
                .map(|(w, st)| w * self.misfit.norm.apply(st, group.delta))
                .sum(),
            ShiftCriterion::MaximizeCorrelation => {
                let (dot, data_sq, syn_sq) = weighted.fold((0.0, 0.0, 0.0), |acc, (w, st)| {
                    (acc.0 + w * st.dot, acc.1 + w * st.data_sq, acc.2 + w * st.syn_sq)
                });
                let denom = (data_sq * syn_sq).sqrt();
                if denom > 0.0 { -dot / denom } else { 0.0 }
            }
        }
    }
}
