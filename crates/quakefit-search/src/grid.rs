//! Indexable collections of candidate sources.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use quakefit_misfit::{Force, MomentTensor, Source, SourceKind};

use crate::error::SearchError;

/// A named grid axis with its coordinate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis label, e.g. `"strike"`.
    pub name: String,
    /// Coordinates along the axis.
    pub values: Vec<f64>,
}

impl Axis {
    /// Create an axis.
    #[must_use]
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }

    /// Return the number of coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return true if the axis has no coordinates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An enumerable, indexable collection of sources.
///
/// `get` must be a pure function of the index: the same index always yields
/// the same source, from any thread.
pub trait Grid: Sync {
    /// Number of grid points.
    fn len(&self) -> usize;

    /// Return true if the grid has no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the source at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::IndexOutOfRange`] if `index >= len()`.
    fn get(&self, index: usize) -> Result<Source, SearchError>;

    /// Names of the per-point parameters returned by [`parameters`](Self::parameters).
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter values of the point at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::IndexOutOfRange`] if `index >= len()`.
    fn parameters(&self, index: usize) -> Result<Vec<f64>, SearchError>;

    /// Labelled axes in C order when the grid is a regular product, else `None`.
    fn axes(&self) -> Option<Vec<Axis>> {
        None
    }
}

fn check_index(index: usize, len: usize) -> Result<(), SearchError> {
    if index >= len {
        return Err(SearchError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// `n` midpoints of equal cells spanning the open interval `(lo, hi)`.
fn open_interval(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let step = (hi - lo) / n as f64;
    (0..n).map(|i| lo + (i as f64 + 0.5) * step).collect()
}

fn check_magnitudes(magnitudes: &[f64]) -> Result<(), SearchError> {
    if magnitudes.is_empty() {
        return Err(SearchError::InvalidGrid {
            reason: "at least one magnitude is required".to_string(),
        });
    }
    if magnitudes.iter().any(|m| !m.is_finite()) {
        return Err(SearchError::InvalidGrid {
            reason: "magnitudes must be finite".to_string(),
        });
    }
    Ok(())
}

/// Split a C-order flat index into per-axis indices.
fn unravel(mut index: usize, shape: &[usize]) -> Vec<usize> {
    let mut out = vec![0; shape.len()];
    for (slot, &n) in out.iter_mut().zip(shape).rev() {
        *slot = index % n;
        index /= n;
    }
    out
}

// ── double couple, regular ─────────────────────────────────────────────

/// Regular double-couple grid over strike, dip, rake, and magnitude.
///
/// Strike samples `(0, 360)`, rake `(-90, 90)`, and dip is sampled uniformly
/// in `cos(dip)` over `(0, 1)`, so that orientations are evenly spread.
/// All intervals are open: cells are sampled at their midpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleCoupleGridRegular {
    strike: Vec<f64>,
    dip: Vec<f64>,
    rake: Vec<f64>,
    magnitude: Vec<f64>,
}

impl DoubleCoupleGridRegular {
    /// Create a grid with `npts_per_axis` points on each orientation axis.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidGrid`] if `npts_per_axis` is zero or
    /// `magnitudes` is empty or non-finite.
    pub fn new(npts_per_axis: usize, magnitudes: Vec<f64>) -> Result<Self, SearchError> {
        if npts_per_axis == 0 {
            return Err(SearchError::InvalidGrid {
                reason: "npts_per_axis must be at least 1".to_string(),
            });
        }
        check_magnitudes(&magnitudes)?;
        Ok(Self {
            strike: open_interval(0.0, 360.0, npts_per_axis),
            dip: open_interval(0.0, 1.0, npts_per_axis)
                .into_iter()
                .map(|h| h.acos().to_degrees())
                .collect(),
            rake: open_interval(-90.0, 90.0, npts_per_axis),
            magnitude: magnitudes,
        })
    }

    fn shape(&self) -> [usize; 4] {
        [
            self.strike.len(),
            self.dip.len(),
            self.rake.len(),
            self.magnitude.len(),
        ]
    }

    fn point(&self, index: usize) -> Result<[f64; 4], SearchError> {
        check_index(index, self.len())?;
        let i = unravel(index, &self.shape());
        Ok([
            self.strike[i[0]],
            self.dip[i[1]],
            self.rake[i[2]],
            self.magnitude[i[3]],
        ])
    }
}

impl Grid for DoubleCoupleGridRegular {
    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn get(&self, index: usize) -> Result<Source, SearchError> {
        let [strike, dip, rake, mw] = self.point(index)?;
        Ok(MomentTensor::from_strike_dip_rake(strike, dip, rake, mw).into())
    }

    fn parameter_names(&self) -> Vec<String> {
        ["strike", "dip", "rake", "magnitude"]
            .map(String::from)
            .to_vec()
    }

    fn parameters(&self, index: usize) -> Result<Vec<f64>, SearchError> {
        Ok(self.point(index)?.to_vec())
    }

    fn axes(&self) -> Option<Vec<Axis>> {
        Some(vec![
            Axis::new("strike", self.strike.clone()),
            Axis::new("dip", self.dip.clone()),
            Axis::new("rake", self.rake.clone()),
            Axis::new("magnitude", self.magnitude.clone()),
        ])
    }
}

// ── double couple, random ──────────────────────────────────────────────

/// Randomly sampled double-couple orientations crossed with magnitudes.
///
/// Orientations are drawn once at construction from a seeded ChaCha8 stream,
/// so `get` is deterministic. Point `i` uses orientation `i / n_magnitudes`
/// and magnitude `i % n_magnitudes`.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleCoupleGridRandom {
    orientations: Vec<[f64; 3]>,
    magnitudes: Vec<f64>,
    seed: u64,
}

impl DoubleCoupleGridRandom {
    /// Draw `npts` orientations using `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidGrid`] if `npts` is zero or
    /// `magnitudes` is empty or non-finite.
    pub fn new(npts: usize, magnitudes: Vec<f64>, seed: u64) -> Result<Self, SearchError> {
        if npts == 0 {
            return Err(SearchError::InvalidGrid {
                reason: "npts must be at least 1".to_string(),
            });
        }
        check_magnitudes(&magnitudes)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let orientations = (0..npts)
            .map(|_| {
                let strike = rng.gen_range(0.0..360.0);
                let h: f64 = rng.gen_range(0.0..1.0);
                let rake = rng.gen_range(-90.0..90.0);
                [strike, h.acos().to_degrees(), rake]
            })
            .collect();
        Ok(Self {
            orientations,
            magnitudes,
            seed,
        })
    }

    /// Return the seed the orientations were drawn with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn point(&self, index: usize) -> Result<[f64; 4], SearchError> {
        check_index(index, self.len())?;
        let n_mag = self.magnitudes.len();
        let [strike, dip, rake] = self.orientations[index / n_mag];
        Ok([strike, dip, rake, self.magnitudes[index % n_mag]])
    }
}

impl Grid for DoubleCoupleGridRandom {
    fn len(&self) -> usize {
        self.orientations.len() * self.magnitudes.len()
    }

    fn get(&self, index: usize) -> Result<Source, SearchError> {
        let [strike, dip, rake, mw] = self.point(index)?;
        Ok(MomentTensor::from_strike_dip_rake(strike, dip, rake, mw).into())
    }

    fn parameter_names(&self) -> Vec<String> {
        ["strike", "dip", "rake", "magnitude"]
            .map(String::from)
            .to_vec()
    }

    fn parameters(&self, index: usize) -> Result<Vec<f64>, SearchError> {
        Ok(self.point(index)?.to_vec())
    }
}

// ── force, regular ─────────────────────────────────────────────────────

/// Regular force grid over azimuth `phi` in `(0, 360)`, `h = cos(polar angle)`
/// in `(-1, 1)`, and force magnitude in N.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceGridRegular {
    phi: Vec<f64>,
    h: Vec<f64>,
    magnitude: Vec<f64>,
}

impl ForceGridRegular {
    /// Create a grid with `npts_per_axis` points on each direction axis.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidGrid`] if `npts_per_axis` is zero or
    /// `magnitudes_in_n` is empty or non-finite.
    pub fn new(npts_per_axis: usize, magnitudes_in_n: Vec<f64>) -> Result<Self, SearchError> {
        if npts_per_axis == 0 {
            return Err(SearchError::InvalidGrid {
                reason: "npts_per_axis must be at least 1".to_string(),
            });
        }
        check_magnitudes(&magnitudes_in_n)?;
        Ok(Self {
            phi: open_interval(0.0, 360.0, npts_per_axis),
            h: open_interval(-1.0, 1.0, npts_per_axis),
            magnitude: magnitudes_in_n,
        })
    }

    fn shape(&self) -> [usize; 3] {
        [self.phi.len(), self.h.len(), self.magnitude.len()]
    }

    fn point(&self, index: usize) -> Result<[f64; 3], SearchError> {
        check_index(index, self.len())?;
        let i = unravel(index, &self.shape());
        Ok([self.phi[i[0]], self.h[i[1]], self.magnitude[i[2]]])
    }
}

impl Grid for ForceGridRegular {
    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn get(&self, index: usize) -> Result<Source, SearchError> {
        let [phi, h, f0] = self.point(index)?;
        Ok(Force::from_angles(phi, h, f0).into())
    }

    fn parameter_names(&self) -> Vec<String> {
        ["phi", "h", "magnitude_in_n"].map(String::from).to_vec()
    }

    fn parameters(&self, index: usize) -> Result<Vec<f64>, SearchError> {
        Ok(self.point(index)?.to_vec())
    }

    fn axes(&self) -> Option<Vec<Axis>> {
        Some(vec![
            Axis::new("phi", self.phi.clone()),
            Axis::new("h", self.h.clone()),
            Axis::new("magnitude_in_n", self.magnitude.clone()),
        ])
    }
}

// ── explicit list ──────────────────────────────────────────────────────

/// An explicit list of sources of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Source>", into = "Vec<Source>")]
pub struct UnstructuredGrid {
    sources: Vec<Source>,
}

impl UnstructuredGrid {
    /// Create a grid from sources.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidGrid`] if `sources` is empty or mixes
    /// moment tensors and forces.
    pub fn new(sources: Vec<Source>) -> Result<Self, SearchError> {
        let Some(first) = sources.first() else {
            return Err(SearchError::InvalidGrid {
                reason: "no sources".to_string(),
            });
        };
        let kind = first.kind();
        if let Some(index) = sources.iter().position(|s| s.kind() != kind) {
            return Err(SearchError::InvalidGrid {
                reason: format!("source {index} is not a {kind}"),
            });
        }
        Ok(Self { sources })
    }

    /// Return the sources.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }
}

impl TryFrom<Vec<Source>> for UnstructuredGrid {
    type Error = SearchError;

    fn try_from(sources: Vec<Source>) -> Result<Self, Self::Error> {
        Self::new(sources)
    }
}

impl From<UnstructuredGrid> for Vec<Source> {
    fn from(grid: UnstructuredGrid) -> Self {
        grid.sources
    }
}

impl Grid for UnstructuredGrid {
    fn len(&self) -> usize {
        self.sources.len()
    }

    fn get(&self, index: usize) -> Result<Source, SearchError> {
        check_index(index, self.len())?;
        Ok(self.sources[index])
    }

    fn parameter_names(&self) -> Vec<String> {
        let names: &[&str] = match self.sources[0].kind() {
            SourceKind::MomentTensor => &["mrr", "mtt", "mpp", "mrt", "mrp", "mtp"],
            SourceKind::Force => &["fr", "ft", "fp"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    fn parameters(&self, index: usize) -> Result<Vec<f64>, SearchError> {
        Ok(self.get(index)?.weights().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_dc_axes_are_open_intervals() {
        let grid = DoubleCoupleGridRegular::new(4, vec![4.0, 4.5]).unwrap();
        assert_eq!(grid.len(), 4 * 4 * 4 * 2);
        let axes = grid.axes().unwrap();
        assert_eq!(axes[0].values, vec![45.0, 135.0, 225.0, 315.0]);
        assert_eq!(axes[2].values, vec![-67.5, -22.5, 22.5, 67.5]);
        for dip in &axes[1].values {
            assert!(*dip > 0.0 && *dip < 90.0);
        }
        // Dip decreases as cos(dip) increases.
        assert!(axes[1].values.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn regular_dc_is_c_ordered() {
        let grid = DoubleCoupleGridRegular::new(3, vec![4.0, 5.0]).unwrap();
        let axes = grid.axes().unwrap();
        let index = ((2 * 3 + 1) * 3) * 2 + 1;
        let p = grid.parameters(index).unwrap();
        assert_eq!(
            p,
            vec![axes[0].values[2], axes[1].values[1], axes[2].values[0], 5.0]
        );
        let mt = grid.get(index).unwrap();
        assert!((mt.magnitude().unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn get_is_idempotent_and_bounded() {
        let grid = DoubleCoupleGridRegular::new(2, vec![4.0]).unwrap();
        assert_eq!(grid.get(5).unwrap(), grid.get(5).unwrap());
        assert!(matches!(
            grid.get(grid.len()),
            Err(SearchError::IndexOutOfRange { index: 8, len: 8 })
        ));
    }

    #[test]
    fn random_grid_is_seeded() {
        let a = DoubleCoupleGridRandom::new(50, vec![4.0, 4.2], 7).unwrap();
        let b = DoubleCoupleGridRandom::new(50, vec![4.0, 4.2], 7).unwrap();
        let c = DoubleCoupleGridRandom::new(50, vec![4.0, 4.2], 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 100);
        assert!(a.axes().is_none());
        let p = a.parameters(3).unwrap();
        assert_eq!(p[3], 4.2);
        assert_eq!(&p[..3], &a.parameters(2).unwrap()[..3]);
        assert!(p[0] >= 0.0 && p[0] < 360.0);
        assert!(p[1] >= 0.0 && p[1] <= 90.0);
        assert!(p[2] >= -90.0 && p[2] < 90.0);
    }

    #[test]
    fn force_grid_produces_requested_magnitude() {
        let grid = ForceGridRegular::new(3, vec![1e10]).unwrap();
        assert_eq!(grid.len(), 9);
        for i in 0..grid.len() {
            let Source::Force(f) = grid.get(i).unwrap() else {
                panic!("expected a force");
            };
            assert!((f.magnitude() - 1e10).abs() < 1e-3);
        }
    }

    #[test]
    fn unstructured_rejects_mixed_kinds() {
        let mt = Source::from(MomentTensor::new([1.0; 6]).unwrap());
        let f = Source::from(Force::new([1.0; 3]).unwrap());
        assert!(UnstructuredGrid::new(vec![]).is_err());
        assert!(UnstructuredGrid::new(vec![mt, f]).is_err());
        let grid = UnstructuredGrid::new(vec![f, f]).unwrap();
        assert_eq!(grid.parameter_names(), vec!["fr", "ft", "fp"]);
        assert_eq!(grid.parameters(1).unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn invalid_construction() {
        assert!(DoubleCoupleGridRegular::new(0, vec![4.0]).is_err());
        assert!(DoubleCoupleGridRegular::new(2, vec![]).is_err());
        assert!(ForceGridRegular::new(2, vec![f64::NAN]).is_err());
        assert!(DoubleCoupleGridRandom::new(0, vec![4.0], 1).is_err());
    }

    #[test]
    fn unravel_c_order() {
        assert_eq!(unravel(0, &[2, 3, 4]), vec![0, 0, 0]);
        assert_eq!(unravel(23, &[2, 3, 4]), vec![1, 2, 3]);
        assert_eq!(unravel(5, &[2, 3, 4]), vec![0, 1, 1]);
    }
}
