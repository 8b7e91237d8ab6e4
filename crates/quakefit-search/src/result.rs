//! Grid-search results and the best-fit selection.

use quakefit_misfit::Source;
use quakefit_waveform::Origin;

use crate::error::{SearchError, SurfaceError};
use crate::grid::{Axis, Grid};
use crate::surface::{ArraySurface, ScoreSurface, TableSurface};

/// Index of the smallest non-NaN value. Ties go to the lowest index.
#[must_use]
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v < b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// The lowest-scoring (source, origin) pair of a search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestFit {
    /// Flat index into the score vector.
    pub index: usize,
    /// Index into the source grid.
    pub source_index: usize,
    /// Index into the candidate origins.
    pub origin_index: usize,
    /// Summed misfit over all bands.
    pub score: f64,
}

/// The best source at one candidate origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginFit {
    /// Index into the candidate origins.
    pub origin_index: usize,
    /// Lowest-scoring grid point at this origin; `None` if all are NaN.
    pub source_index: Option<usize>,
    /// Its score; NaN when `source_index` is `None`.
    pub score: f64,
}

/// Scores of every (source, origin) pair, in source-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    scores: Vec<f64>,
    n_sources: usize,
    origins: Vec<Origin>,
}

impl SearchResult {
    /// Wrap a score vector of length `n_sources * origins.len()`.
    #[must_use]
    pub fn new(scores: Vec<f64>, n_sources: usize, origins: Vec<Origin>) -> Self {
        debug_assert_eq!(scores.len(), n_sources * origins.len());
        Self {
            scores,
            n_sources,
            origins,
        }
    }

    /// Return every score, indexed by `source_index * n_origins + origin_index`.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Return the number of scores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Return true if there are no scores.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Return the number of grid points.
    #[must_use]
    pub fn n_sources(&self) -> usize {
        self.n_sources
    }

    /// Return the number of candidate origins.
    #[must_use]
    pub fn n_origins(&self) -> usize {
        self.origins.len()
    }

    /// Return the candidate origins.
    #[must_use]
    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    /// Score of one pair, if in range.
    #[must_use]
    pub fn score(&self, source_index: usize, origin_index: usize) -> Option<f64> {
        if source_index >= self.n_sources || origin_index >= self.n_origins() {
            return None;
        }
        self.scores
            .get(source_index * self.n_origins() + origin_index)
            .copied()
    }

    /// Split a flat index into `(source_index, origin_index)`.
    #[must_use]
    pub fn unflatten(&self, index: usize) -> (usize, usize) {
        (index / self.n_origins(), index % self.n_origins())
    }

    /// Flat index of the lowest score.
    #[must_use]
    pub fn argmin(&self) -> Option<usize> {
        argmin(&self.scores)
    }

    /// The lowest-scoring pair, or `None` if every score is NaN.
    #[must_use]
    pub fn best(&self) -> Option<BestFit> {
        let index = self.argmin()?;
        let (source_index, origin_index) = self.unflatten(index);
        Some(BestFit {
            index,
            source_index,
            origin_index,
            score: self.scores[index],
        })
    }

    /// Materialize the best source and its origin from `grid`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SearchError::EmptyGrid`] | every score is NaN |
    /// | [`SearchError::IndexOutOfRange`] | `grid` is not the searched grid |
    pub fn best_source<G: Grid + ?Sized>(
        &self,
        grid: &G,
    ) -> Result<(Source, Origin), SearchError> {
        let best = self.best().ok_or(SearchError::EmptyGrid)?;
        let source = grid.get(best.source_index)?;
        Ok((source, self.origins[best.origin_index].clone()))
    }

    /// Lowest score over all sources at each origin, in origin order.
    #[must_use]
    pub fn origin_fits(&self) -> Vec<OriginFit> {
        let n_origins = self.n_origins();
        (0..n_origins)
            .map(|o| {
                let column: Vec<f64> =
                    self.scores.iter().skip(o).step_by(n_origins).copied().collect();
                let source_index = argmin(&column);
                OriginFit {
                    origin_index: o,
                    source_index,
                    score: source_index.map_or(f64::NAN, |s| column[s]),
                }
            })
            .collect()
    }

    /// The origin coordinate axis: the first of `depth_in_m`,
    /// `offset_x_in_m`, `offset_y_in_m` whose values are all distinct,
    /// otherwise the origin positions.
    #[must_use]
    pub fn origin_axis(&self) -> Axis {
        ORIGIN_COORDINATES
            .iter()
            .find(|(_, get)| distinct_count(&self.origins, *get) == self.origins.len())
            .map_or_else(
                || Axis::new("origin", (0..self.origins.len()).map(|i| i as f64).collect()),
                |(name, get)| Axis::new(name, self.origins.iter().map(get).collect()),
            )
    }

    /// Origin coordinates that vary across the candidates, as labelled
    /// columns. Falls back to [`origin_axis`](Self::origin_axis) when no
    /// coordinate varies.
    #[must_use]
    pub fn origin_columns(&self) -> Vec<Axis> {
        let varying: Vec<Axis> = ORIGIN_COORDINATES
            .iter()
            .filter(|(_, get)| distinct_count(&self.origins, *get) > 1)
            .map(|(name, get)| Axis::new(name, self.origins.iter().map(get).collect()))
            .collect();
        if varying.is_empty() {
            vec![self.origin_axis()]
        } else {
            varying
        }
    }

    /// Build the score surface over `grid` with the origin axis last.
    ///
    /// Grids with axes produce [`ScoreSurface::Array`] over
    /// [`origin_axis`](Self::origin_axis) when it is labelled by a
    /// coordinate. Other grids, and regular grids over origins that no
    /// single coordinate labels (e.g. a lateral x/y grid), produce a
    /// [`ScoreSurface::Table`] whose rows hold the grid parameters followed
    /// by the [`origin_columns`](Self::origin_columns).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SearchError::Surface`] | `grid` does not match the searched grid, or an axis name collides with the origin axis |
    pub fn surface<G: Grid + ?Sized>(&self, grid: &G) -> Result<ScoreSurface, SearchError> {
        if grid.len() != self.n_sources {
            return Err(SurfaceError::ShapeMismatch {
                expected: grid.len() * self.n_origins(),
                got: self.scores.len(),
            }
            .into());
        }
        let origin_axis = self.origin_axis();
        if origin_axis.name != "origin" && let Some(mut axes) = grid.axes() {
            axes.push(origin_axis);
            return Ok(ArraySurface::new(axes, self.scores.clone())?.into());
        }
        let origin_columns = self.origin_columns();
        let mut columns = grid.parameter_names();
        columns.extend(origin_columns.iter().map(|axis| axis.name.clone()));
        let mut rows = Vec::with_capacity(self.scores.len());
        for s in 0..self.n_sources {
            let params = grid.parameters(s)?;
            for o in 0..self.n_origins() {
                let mut row = params.clone();
                row.extend(origin_columns.iter().map(|axis| axis.values[o]));
                rows.push(row);
            }
        }
        Ok(TableSurface::new(columns, rows, self.scores.clone())?.into())
    }
}

type OriginCoordinate = (&'static str, fn(&Origin) -> f64);

const ORIGIN_COORDINATES: [OriginCoordinate; 3] = [
    ("depth_in_m", |o: &Origin| o.depth_in_m),
    ("offset_x_in_m", |o: &Origin| o.offset_x_in_m),
    ("offset_y_in_m", |o: &Origin| o.offset_y_in_m),
];

fn distinct_count(origins: &[Origin], get: fn(&Origin) -> f64) -> usize {
    let mut values: Vec<f64> = origins.iter().map(get).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    values.len()
}

#[cfg(test)]
mod tests {
    use quakefit_misfit::Force;

    use super::*;
    use crate::grid::{ForceGridRegular, UnstructuredGrid};
    use crate::surface::SurfaceReduction;

    fn origins(depths: &[f64]) -> Vec<Origin> {
        depths.iter().map(|&d| Origin::new(0.0, 0.0, 0.0, d)).collect()
    }

    #[test]
    fn argmin_ties_go_to_lowest_index() {
        let scores = [3.0, 2.0, 0.5, 1.0, 4.0, 0.5];
        assert_eq!(argmin(&scores), Some(2));
    }

    #[test]
    fn argmin_skips_nan() {
        assert_eq!(argmin(&[f64::NAN, 2.0, 1.0]), Some(2));
        assert_eq!(argmin(&[f64::NAN, f64::NAN]), None);
        assert_eq!(argmin(&[]), None);
    }

    #[test]
    fn best_unflattens_source_major() {
        let result = SearchResult::new(
            vec![3.0, 2.0, 0.5, 1.0, 4.0, 0.5],
            3,
            origins(&[1000.0, 2000.0]),
        );
        let best = result.best().unwrap();
        assert_eq!(
            best,
            BestFit {
                index: 2,
                source_index: 1,
                origin_index: 0,
                score: 0.5
            }
        );
        assert_eq!(result.score(2, 1), Some(0.5));
        assert_eq!(result.score(3, 0), None);
    }

    #[test]
    fn regular_grid_gives_array_surface() {
        let grid = ForceGridRegular::new(2, vec![1.0]).unwrap();
        let n = grid.len() * 3;
        let result = SearchResult::new(
            (0..n).map(|i| i as f64).collect(),
            grid.len(),
            origins(&[1000.0, 2000.0, 3000.0]),
        );
        let ScoreSurface::Array(surface) = result.surface(&grid).unwrap() else {
            panic!("expected array surface");
        };
        let names: Vec<&str> = surface.axes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["phi", "h", "magnitude_in_n", "depth_in_m"]);
        let depth = surface.reduce_min("depth_in_m").unwrap();
        assert_eq!(depth.values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn unstructured_grid_gives_table_surface() {
        let grid = UnstructuredGrid::new(vec![
            Source::from(Force::new([1.0, 0.0, 0.0]).unwrap()),
            Source::from(Force::new([0.0, 1.0, 0.0]).unwrap()),
        ])
        .unwrap();
        let result = SearchResult::new(vec![1.0, 2.0, 3.0, 4.0], 2, origins(&[500.0, 500.0]));
        let ScoreSurface::Table(table) = result.surface(&grid).unwrap() else {
            panic!("expected table surface");
        };
        assert_eq!(table.columns(), ["fr", "ft", "fp", "origin"]);
        assert_eq!(table.rows()[3], vec![0.0, 1.0, 0.0, 1.0]);
    }

    /// Four origins on a 2 x 2 lateral grid at one depth.
    fn lateral_origins() -> Vec<Origin> {
        let base = Origin::new(0.0, 61.0, -150.0, 10_000.0);
        [(0.0, 0.0), (1000.0, 0.0), (0.0, 1000.0), (1000.0, 1000.0)]
            .iter()
            .map(|&(x, y)| base.with_offsets(x, y))
            .collect()
    }

    #[test]
    fn lateral_origin_grid_keeps_coordinates() {
        let grid = ForceGridRegular::new(2, vec![1.0]).unwrap();
        let n_sources = grid.len();
        // Source 1 at origin 3 (x = 1000, y = 1000) is the best fit.
        let mut scores = vec![5.0; n_sources * 4];
        scores[4 + 3] = 0.5;
        scores[2] = 1.5;
        let result = SearchResult::new(scores, n_sources, lateral_origins());

        assert_eq!(result.origin_axis().name, "origin");
        let names: Vec<String> = result.origin_columns().into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["offset_x_in_m", "offset_y_in_m"]);

        let surface = result.surface(&grid).unwrap();
        let ScoreSurface::Table(table) = &surface else {
            panic!("lateral origins should give a table surface");
        };
        assert_eq!(table.columns(), ["phi", "h", "magnitude_in_n", "offset_x_in_m", "offset_y_in_m"]);
        assert_eq!(&table.rows()[7][3..], [1000.0, 1000.0]);

        let x = surface.reduce_min("offset_x_in_m").unwrap();
        assert_eq!(x.coordinates, vec![0.0, 1000.0]);
        assert_eq!(x.values, vec![1.5, 0.5]);
        assert_eq!(x.arg_indices[1], Some(7));
        let y = surface.reduce_min("offset_y_in_m").unwrap();
        assert_eq!(y.values, vec![5.0, 0.5]);

        let fits = result.origin_fits();
        assert_eq!(fits.len(), 4);
        assert_eq!(fits[3].source_index, Some(1));
        assert_eq!(fits[3].score, 0.5);
        assert_eq!(fits[2].source_index, Some(0));
        assert_eq!(fits[0].score, 5.0);
    }

    #[test]
    fn single_lateral_coordinate_labels_array_axis() {
        let base = Origin::new(0.0, 0.0, 0.0, 8000.0);
        let origins = vec![base.with_offsets(-500.0, 0.0), base.with_offsets(500.0, 0.0)];
        let grid = ForceGridRegular::new(2, vec![1.0]).unwrap();
        let result = SearchResult::new(vec![1.0; grid.len() * 2], grid.len(), origins);
        let ScoreSurface::Array(surface) = result.surface(&grid).unwrap() else {
            panic!("expected array surface");
        };
        let last = surface.axes().last().unwrap();
        assert_eq!(last.name, "offset_x_in_m");
        assert_eq!(last.values, vec![-500.0, 500.0]);
    }

    #[test]
    fn origin_fits_skip_nan() {
        let result = SearchResult::new(
            vec![f64::NAN, 2.0, f64::NAN, 1.0],
            2,
            origins(&[1000.0, 2000.0]),
        );
        let fits = result.origin_fits();
        assert_eq!(fits[0].source_index, None);
        assert!(fits[0].score.is_nan());
        assert_eq!(fits[1].source_index, Some(1));
    }

    #[test]
    fn surface_rejects_other_grid() {
        let grid = ForceGridRegular::new(2, vec![1.0]).unwrap();
        let result = SearchResult::new(vec![0.0; 3], 3, origins(&[1000.0]));
        assert!(matches!(
            result.surface(&grid),
            Err(SearchError::Surface(SurfaceError::ShapeMismatch { .. }))
        ));
    }
}
