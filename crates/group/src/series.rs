//! Time-indexed values over one or more locations.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::GroupError;
use crate::time::TimeAxis;

/// Values indexed by `(location, time)`.
///
/// The `location` axis holds independent points (grid cells, realizations)
/// or, for multivariate methods, the variables of a single point. Missing
/// values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    time: TimeAxis,
    values: Array2<f64>,
}

impl Series {
    /// Creates a series from a `(location, time)` array.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ShapeMismatch`] if the number of columns differs
    /// from the length of `time`.
    pub fn new(time: TimeAxis, values: Array2<f64>) -> Result<Self, GroupError> {
        if values.ncols() != time.len() {
            return Err(GroupError::ShapeMismatch {
                what: "time",
                expected: time.len(),
                got: values.ncols(),
            });
        }
        Ok(Self { time, values })
    }

    /// Single-location series.
    pub fn from_vec(time: TimeAxis, values: Vec<f64>) -> Result<Self, GroupError> {
        let n = values.len();
        let values = Array2::from_shape_vec((1, n), values).map_err(|_| {
            GroupError::ShapeMismatch {
                what: "time",
                expected: time.len(),
                got: n,
            }
        })?;
        Self::new(time, values)
    }

    /// Stacks single-location rows into one series sharing `time`.
    pub fn from_rows(time: TimeAxis, rows: &[Vec<f64>]) -> Result<Self, GroupError> {
        let n = time.len();
        let mut values = Array2::from_elem((rows.len(), n), f64::NAN);
        for (l, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(GroupError::ShapeMismatch {
                    what: "time",
                    expected: n,
                    got: row.len(),
                });
            }
            values.row_mut(l).assign(&ArrayView1::from(row.as_slice()));
        }
        Self::new(time, values)
    }

    /// The time axis.
    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// All values, shape `(location, time)`.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Consumes `self` and returns the owned value array.
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Number of locations.
    pub fn n_loc(&self) -> usize {
        self.values.nrows()
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns `true` if the series has no time steps.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Values of one location as an owned vector.
    pub fn row(&self, loc: usize) -> Vec<f64> {
        self.values.index_axis(Axis(0), loc).to_vec()
    }

    /// Same time axis, new values.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ShapeMismatch`] if `values` has a different
    /// number of time steps.
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self, GroupError> {
        Self::new(self.time.clone(), values)
    }

    /// Applies `f` element-wise, keeping the time axis.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            time: self.time.clone(),
            values: self.values.mapv(f),
        }
    }
}
