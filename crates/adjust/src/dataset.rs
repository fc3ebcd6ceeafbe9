//! Named arrays with labelled dimensions.
//!
//! A [`Dataset`] is the unit of exchange of the block adapter: kernels
//! receive one and return one, and trained parameters convert to one for
//! inspection or export.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array, ArrayD, ArrayView, Axis, Dimension};
use sdba_group::Series;

use crate::error::AdjustError;

/// Dimension label of an array axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    /// Independent series: spatial point, realization or variable.
    Location,
    /// Calendar time.
    Time,
    /// Group label of a [`sdba_group::Grouper`].
    Group,
    /// Position inside a windowed group.
    Sample,
    /// Node of a quantile or probability grid.
    Quantile,
    /// NpdfT iteration.
    Iteration,
    /// Matrix row.
    Row,
    /// Matrix column.
    Col,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dim::Location => "location",
            Dim::Time => "time",
            Dim::Group => "group",
            Dim::Sample => "sample",
            Dim::Quantile => "quantile",
            Dim::Iteration => "iteration",
            Dim::Row => "row",
            Dim::Col => "col",
        };
        f.write_str(name)
    }
}

/// An `f64` array whose axes carry [`Dim`] labels.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    dims: Vec<Dim>,
    data: ArrayD<f64>,
}

impl DataArray {
    /// Labels the axes of `data` with `dims`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::ShapeContract`] if the number of labels differs
    /// from the array rank or a label repeats.
    pub fn new<D: Dimension>(dims: &[Dim], data: Array<f64, D>) -> Result<Self, AdjustError> {
        if dims.len() != data.ndim() {
            return Err(AdjustError::shape(
                "array",
                format!("{} labels for a {}-d array", dims.len(), data.ndim()),
            ));
        }
        for (i, d) in dims.iter().enumerate() {
            if dims[..i].contains(d) {
                return Err(AdjustError::shape("array", format!("dimension {d} repeats")));
            }
        }
        Ok(Self {
            dims: dims.to_vec(),
            data: data.into_dyn(),
        })
    }

    pub(crate) fn from_parts(dims: Vec<Dim>, data: ArrayD<f64>) -> Self {
        debug_assert_eq!(dims.len(), data.ndim());
        Self { dims, data }
    }

    /// The values of `series`, labelled `[Location, Time]`.
    pub fn from_series(series: &Series) -> Self {
        Self::from_parts(
            vec![Dim::Location, Dim::Time],
            series.values().to_owned().into_dyn(),
        )
    }

    /// Axis labels.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// The values.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Consumes the array, returning its values.
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// Position of `dim`, if present.
    pub fn axis(&self, dim: Dim) -> Option<Axis> {
        self.dims.iter().position(|&d| d == dim).map(Axis)
    }

    /// Length along `dim`, if present.
    pub fn len_of(&self, dim: Dim) -> Option<usize> {
        self.axis(dim).map(|ax| self.data.len_of(ax))
    }
}

/// A set of named [`DataArray`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    vars: BTreeMap<String, DataArray>,
}

impl Dataset {
    /// An empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `array` under `name`, replacing any previous entry.
    pub fn with(mut self, name: impl Into<String>, array: DataArray) -> Self {
        self.vars.insert(name.into(), array);
        self
    }

    /// Inserts `array` under `name`, returning the previous entry.
    pub fn insert(&mut self, name: impl Into<String>, array: DataArray) -> Option<DataArray> {
        self.vars.insert(name.into(), array)
    }

    /// The array stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::MissingVariable`] if there is none.
    pub fn get(&self, name: &str) -> Result<&DataArray, AdjustError> {
        self.vars.get(name).ok_or_else(|| AdjustError::MissingVariable {
            name: name.to_string(),
        })
    }

    /// Removes and returns the array stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::MissingVariable`] if there is none.
    pub fn take(&mut self, name: &str) -> Result<DataArray, AdjustError> {
        self.vars
            .remove(name)
            .ok_or_else(|| AdjustError::MissingVariable {
                name: name.to_string(),
            })
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// `(name, array)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataArray)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the dataset holds no variable.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Typed view of `name`, checking that its labels equal `dims`.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::MissingVariable`] or
    /// [`AdjustError::ShapeContract`].
    pub fn view<D: Dimension>(
        &self,
        name: &str,
        dims: &[Dim],
    ) -> Result<ArrayView<'_, f64, D>, AdjustError> {
        let array = self.get(name)?;
        check_dims(name, array, dims)?;
        array
            .data
            .view()
            .into_dimensionality::<D>()
            .map_err(|e| AdjustError::shape(name, e.to_string()))
    }

    /// Like [`Dataset::view`] but removes the variable and returns it owned.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::MissingVariable`] or
    /// [`AdjustError::ShapeContract`].
    pub fn take_as<D: Dimension>(
        &mut self,
        name: &str,
        dims: &[Dim],
    ) -> Result<Array<f64, D>, AdjustError> {
        let array = self.take(name)?;
        check_dims(name, &array, dims)?;
        array
            .data
            .into_dimensionality::<D>()
            .map_err(|e| AdjustError::shape(name, e.to_string()))
    }
}

fn check_dims(name: &str, array: &DataArray, dims: &[Dim]) -> Result<(), AdjustError> {
    if array.dims != dims {
        return Err(AdjustError::shape(
            name,
            format!("expected dims {dims:?}, got {:?}", array.dims),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Ix2, Ix3};

    fn sample() -> Dataset {
        let af = DataArray::new(&[Dim::Group, Dim::Location], Array2::<f64>::zeros((12, 3))).unwrap();
        Dataset::new().with("af", af)
    }

    #[test]
    fn rejects_bad_labels() {
        let a = Array2::<f64>::zeros((2, 2));
        assert!(DataArray::new(&[Dim::Time], a.clone()).is_err());
        assert!(DataArray::new(&[Dim::Time, Dim::Time], a).is_err());
    }

    #[test]
    fn axis_lookup() {
        let ds = sample();
        let af = ds.get("af").unwrap();
        assert_eq!(af.axis(Dim::Location), Some(Axis(1)));
        assert_eq!(af.len_of(Dim::Group), Some(12));
        assert_eq!(af.len_of(Dim::Time), None);
    }

    #[test]
    fn missing_variable() {
        let ds = sample();
        assert!(matches!(
            ds.get("hist_q"),
            Err(AdjustError::MissingVariable { .. })
        ));
    }

    #[test]
    fn typed_view_checks_dims() {
        let ds = sample();
        let v = ds.view::<Ix2>("af", &[Dim::Group, Dim::Location]).unwrap();
        assert_eq!(v.dim(), (12, 3));
        assert!(matches!(
            ds.view::<Ix2>("af", &[Dim::Location, Dim::Group]),
            Err(AdjustError::ShapeContract { .. })
        ));
        assert!(ds.view::<Ix3>("af", &[Dim::Group, Dim::Location]).is_err());
    }

    #[test]
    fn take_removes() {
        let mut ds = sample();
        let af: Array2<f64> = ds.take_as("af", &[Dim::Group, Dim::Location]).unwrap();
        assert_eq!(af.dim(), (12, 3));
        assert!(ds.is_empty());
    }
}
