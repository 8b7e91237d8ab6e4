//! Score surfaces and their reductions to one-dimensional profiles.
//!
//! A [`ScoreSurface`] is either a labelled array over a regular grid
//! ([`ArraySurface`]) or a table with one row per point
//! ([`TableSurface`]). Both implement [`SurfaceReduction`].

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::grid::Axis;

/// Reductions shared by every surface variant.
pub trait SurfaceReduction: Sized {
    /// Minimum along every axis except `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownAxis`] if `axis` does not exist.
    fn reduce_min(&self, axis: &str) -> Result<Profile, SurfaceError>;

    /// Maximum along every axis except `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownAxis`] if `axis` does not exist.
    fn reduce_max(&self, axis: &str) -> Result<Profile, SurfaceError>;

    /// Convert misfit values to `exp(-misfit / (2 sigma^2))`, renormalized to sum 1.
    ///
    /// The minimum misfit is subtracted first. NaN values map to zero.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::InvalidSigma`] | `sigma` is not finite and positive |
    /// | [`SurfaceError::NoFiniteValues`] | every value is NaN |
    fn likelihood(&self, sigma: f64) -> Result<Self, SurfaceError>;

    /// Sum over every axis except `axis`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::UnknownAxis`] | `axis` does not exist |
    /// | [`SurfaceError::Unsupported`] | the surface is a table |
    fn marginal(&self, axis: &str) -> Result<Profile, SurfaceError>;
}

/// A one-dimensional reduction of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Name of the retained axis.
    pub axis: String,
    /// Coordinates along the retained axis.
    pub coordinates: Vec<f64>,
    /// Reduced value at each coordinate. NaN where no finite value exists.
    pub values: Vec<f64>,
    /// Flat surface index of the arg-reducing point per coordinate, if any.
    pub arg_indices: Vec<Option<usize>>,
}

impl Profile {
    /// Coordinate with the smallest finite value, ties to the first.
    #[must_use]
    pub fn argmin(&self) -> Option<usize> {
        crate::result::argmin(&self.values)
    }

    fn normalize(&mut self) {
        let total: f64 = self.values.iter().filter(|v| v.is_finite()).sum();
        if total > 0.0 {
            for v in &mut self.values {
                *v /= total;
            }
        }
    }
}

/// What a depth (or any axis) profile reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// Minimum misfit.
    #[default]
    Misfit,
    /// Maximum likelihood, renormalized over the profile.
    Likelihood,
    /// Marginal likelihood.
    Marginal,
}

impl ProfileMode {
    /// Lower-case mode name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Misfit => "misfit",
            Self::Likelihood => "likelihood",
            Self::Marginal => "marginal",
        }
    }
}

// ── array ──────────────────────────────────────────────────────────────

/// Values over the Cartesian product of labelled axes, in C order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArrayRepr")]
pub struct ArraySurface {
    axes: Vec<Axis>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct ArrayRepr {
    axes: Vec<Axis>,
    values: Vec<f64>,
}

impl TryFrom<ArrayRepr> for ArraySurface {
    type Error = SurfaceError;

    fn try_from(repr: ArrayRepr) -> Result<Self, Self::Error> {
        Self::new(repr.axes, repr.values)
    }
}

impl ArraySurface {
    /// Create an array surface.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::Malformed`] | no axes, an empty axis, or a repeated axis name |
    /// | [`SurfaceError::ShapeMismatch`] | `values.len()` differs from the product of axis lengths |
    pub fn new(axes: Vec<Axis>, values: Vec<f64>) -> Result<Self, SurfaceError> {
        if axes.is_empty() {
            return Err(SurfaceError::Malformed {
                reason: "array surface needs at least one axis".to_string(),
            });
        }
        for (i, axis) in axes.iter().enumerate() {
            if axis.is_empty() {
                return Err(SurfaceError::Malformed {
                    reason: format!("axis {} has no coordinates", axis.name),
                });
            }
            if axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(SurfaceError::Malformed {
                    reason: format!("axis {} appears twice", axis.name),
                });
            }
        }
        let expected: usize = axes.iter().map(Axis::len).product();
        if values.len() != expected {
            return Err(SurfaceError::ShapeMismatch {
                expected,
                got: values.len(),
            });
        }
        Ok(Self { axes, values })
    }

    /// Return the axes.
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Return the values in C order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Return the axis lengths.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    /// Position of the named axis.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownAxis`] if no axis has that name.
    pub fn axis_position(&self, name: &str) -> Result<usize, SurfaceError> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| SurfaceError::UnknownAxis {
                name: name.to_string(),
            })
    }

    /// Coordinate position along axis `k` of every flat index.
    fn keys(&self, k: usize) -> impl Iterator<Item = usize> + '_ {
        let len = self.axes[k].len();
        let stride: usize = self.axes[k + 1..].iter().map(Axis::len).product();
        (0..self.values.len()).map(move |i| (i / stride) % len)
    }

    fn reduce(&self, axis: &str, better: fn(f64, f64) -> bool) -> Result<Profile, SurfaceError> {
        let k = self.axis_position(axis)?;
        let coordinates = self.axes[k].values.clone();
        let (values, arg_indices) =
            fold_extreme(self.keys(k), coordinates.len(), &self.values, better);
        Ok(Profile {
            axis: axis.to_string(),
            coordinates,
            values,
            arg_indices,
        })
    }
}

impl SurfaceReduction for ArraySurface {
    fn reduce_min(&self, axis: &str) -> Result<Profile, SurfaceError> {
        self.reduce(axis, |a, b| a < b)
    }

    fn reduce_max(&self, axis: &str) -> Result<Profile, SurfaceError> {
        self.reduce(axis, |a, b| a > b)
    }

    fn likelihood(&self, sigma: f64) -> Result<Self, SurfaceError> {
        Ok(Self {
            axes: self.axes.clone(),
            values: likelihood_values(&self.values, sigma)?,
        })
    }

    fn marginal(&self, axis: &str) -> Result<Profile, SurfaceError> {
        let k = self.axis_position(axis)?;
        let coordinates = self.axes[k].values.clone();
        let mut values = vec![0.0; coordinates.len()];
        for (key, v) in self.keys(k).zip(&self.values) {
            if v.is_finite() {
                values[key] += v;
            }
        }
        Ok(Profile {
            axis: axis.to_string(),
            arg_indices: vec![None; coordinates.len()],
            coordinates,
            values,
        })
    }
}

// ── table ──────────────────────────────────────────────────────────────

/// One row of parameter values per point, with a value per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr")]
pub struct TableSurface {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct TableRepr {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl TryFrom<TableRepr> for TableSurface {
    type Error = SurfaceError;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        Self::new(repr.columns, repr.rows, repr.values)
    }
}

impl TableSurface {
    /// Create a table surface.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::Malformed`] | no columns, a row of the wrong width, or a non-finite parameter |
    /// | [`SurfaceError::ShapeMismatch`] | `values.len()` differs from `rows.len()` |
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
        values: Vec<f64>,
    ) -> Result<Self, SurfaceError> {
        if columns.is_empty() {
            return Err(SurfaceError::Malformed {
                reason: "table surface needs at least one column".to_string(),
            });
        }
        if values.len() != rows.len() {
            return Err(SurfaceError::ShapeMismatch {
                expected: rows.len(),
                got: values.len(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SurfaceError::Malformed {
                    reason: format!(
                        "row {i} has {} entries, expected {}",
                        row.len(),
                        columns.len()
                    ),
                });
            }
            if row.iter().any(|p| !p.is_finite()) {
                return Err(SurfaceError::Malformed {
                    reason: format!("row {i} has a non-finite parameter"),
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            values,
        })
    }

    /// Return the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the parameter rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Return one value per row.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Position of the named column.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownAxis`] if no column has that name.
    pub fn column_position(&self, name: &str) -> Result<usize, SurfaceError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SurfaceError::UnknownAxis {
                name: name.to_string(),
            })
    }

    fn reduce(&self, axis: &str, better: fn(f64, f64) -> bool) -> Result<Profile, SurfaceError> {
        let k = self.column_position(axis)?;
        let mut coordinates: Vec<f64> = self.rows.iter().map(|r| r[k]).collect();
        coordinates.sort_by(f64::total_cmp);
        coordinates.dedup();
        let keys = self
            .rows
            .iter()
            .map(|r| coordinates.partition_point(|c| *c < r[k]));
        let (values, arg_indices) = fold_extreme(keys, coordinates.len(), &self.values, better);
        Ok(Profile {
            axis: axis.to_string(),
            coordinates,
            values,
            arg_indices,
        })
    }
}

impl SurfaceReduction for TableSurface {
    fn reduce_min(&self, axis: &str) -> Result<Profile, SurfaceError> {
        self.reduce(axis, |a, b| a < b)
    }

    fn reduce_max(&self, axis: &str) -> Result<Profile, SurfaceError> {
        self.reduce(axis, |a, b| a > b)
    }

    fn likelihood(&self, sigma: f64) -> Result<Self, SurfaceError> {
        Ok(Self {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            values: likelihood_values(&self.values, sigma)?,
        })
    }

    fn marginal(&self, _axis: &str) -> Result<Profile, SurfaceError> {
        Err(SurfaceError::Unsupported {
            operation: "marginal",
            variant: "table",
        })
    }
}

// ── tagged surface ─────────────────────────────────────────────────────

/// A score surface over a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSurface {
    /// Regular grid with labelled axes.
    Array(ArraySurface),
    /// Irregular grid, one row per point.
    Table(TableSurface),
}

impl ScoreSurface {
    /// Return the values, one per grid point.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Array(s) => s.values(),
            Self::Table(s) => s.values(),
        }
    }

    /// Return the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Return true if the surface has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Return `"array"` or `"table"`.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Table(_) => "table",
        }
    }

    /// Flatten to one row per point in C order. Tables are returned as is.
    #[must_use]
    pub fn to_table(&self) -> TableSurface {
        let array = match self {
            Self::Table(table) => return table.clone(),
            Self::Array(array) => array,
        };
        let shape = array.shape();
        let rows = (0..array.values.len())
            .map(|i| {
                let mut rest = i;
                let mut row = vec![0.0; shape.len()];
                for k in (0..shape.len()).rev() {
                    row[k] = array.axes[k].values[rest % shape[k]];
                    rest /= shape[k];
                }
                row
            })
            .collect();
        TableSurface {
            columns: array.axes.iter().map(|a| a.name.clone()).collect(),
            rows,
            values: array.values.clone(),
        }
    }

    /// Profile along `axis` for the given mode.
    ///
    /// The likelihood profile is renormalized to sum 1 over the axis.
    /// `sigma` is ignored for [`ProfileMode::Misfit`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SurfaceError::MissingSigma`] | likelihood or marginal mode without `sigma` |
    /// | [`SurfaceError::UnknownAxis`] | `axis` does not exist |
    /// | [`SurfaceError::Unsupported`] | marginal mode on a table |
    /// | [`SurfaceError::InvalidSigma`] / [`SurfaceError::NoFiniteValues`] | as in [`SurfaceReduction::likelihood`] |
    pub fn profile(
        &self,
        axis: &str,
        mode: ProfileMode,
        sigma: Option<f64>,
    ) -> Result<Profile, SurfaceError> {
        if mode == ProfileMode::Misfit {
            return self.reduce_min(axis);
        }
        let sigma = sigma.ok_or(SurfaceError::MissingSigma {
            mode: mode.as_str(),
        })?;
        let likelihood = self.likelihood(sigma)?;
        match mode {
            ProfileMode::Likelihood => {
                let mut profile = likelihood.reduce_max(axis)?;
                profile.normalize();
                Ok(profile)
            }
            _ => likelihood.marginal(axis),
        }
    }
}

impl SurfaceReduction for ScoreSurface {
    fn reduce_min(&self, axis: &str) -> Result<Profile, SurfaceError> {
        match self {
            Self::Array(s) => s.reduce_min(axis),
            Self::Table(s) => s.reduce_min(axis),
        }
    }

    fn reduce_max(&self, axis: &str) -> Result<Profile, SurfaceError> {
        match self {
            Self::Array(s) => s.reduce_max(axis),
            Self::Table(s) => s.reduce_max(axis),
        }
    }

    fn likelihood(&self, sigma: f64) -> Result<Self, SurfaceError> {
        match self {
            Self::Array(s) => s.likelihood(sigma).map(Self::Array),
            Self::Table(s) => s.likelihood(sigma).map(Self::Table),
        }
    }

    fn marginal(&self, axis: &str) -> Result<Profile, SurfaceError> {
        match self {
            Self::Array(s) => s.marginal(axis),
            Self::Table(s) => s.marginal(axis),
        }
    }
}

impl From<ArraySurface> for ScoreSurface {
    fn from(surface: ArraySurface) -> Self {
        Self::Array(surface)
    }
}

impl From<TableSurface> for ScoreSurface {
    fn from(surface: TableSurface) -> Self {
        Self::Table(surface)
    }
}

// ── helpers ────────────────────────────────────────────────────────────

/// Per-key extreme of `values`, skipping NaN. Ties keep the lowest index.
fn fold_extreme(
    keys: impl Iterator<Item = usize>,
    n_keys: usize,
    values: &[f64],
    better: fn(f64, f64) -> bool,
) -> (Vec<f64>, Vec<Option<usize>>) {
    let mut best = vec![f64::NAN; n_keys];
    let mut arg = vec![None; n_keys];
    for (i, (key, &v)) in keys.zip(values).enumerate() {
        if v.is_nan() {
            continue;
        }
        if arg[key].is_none() || better(v, best[key]) {
            best[key] = v;
            arg[key] = Some(i);
        }
    }
    (best, arg)
}

fn likelihood_values(values: &[f64], sigma: f64) -> Result<Vec<f64>, SurfaceError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(SurfaceError::InvalidSigma { sigma });
    }
    let min = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        return Err(SurfaceError::NoFiniteValues);
    }
    let scale = 2.0 * sigma * sigma;
    let mut out: Vec<f64> = values
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { (-(v - min) / scale).exp() })
        .collect();
    let total: f64 = out.iter().sum();
    for v in &mut out {
        *v /= total;
    }
    Ok(out)
}
