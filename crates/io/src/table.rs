//! Daily tables: a time column plus named value columns.

use std::collections::BTreeMap;

use sdba_group::{Series, TimeAxis};

use crate::error::IoError;

/// A daily table read from or written to Parquet.
///
/// Columns are named `<role>_<variable>` (`ref_tas`, `hist_pr`, `sim_tas`,
/// `scen_tas`, ...). The variables of one role become the locations of a
/// [`Series`], in the order requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    time: TimeAxis,
    columns: BTreeMap<String, Vec<f64>>,
}

impl Table {
    /// Empty table on `time`.
    pub fn new(time: TimeAxis) -> Self {
        Self {
            time,
            columns: BTreeMap::new(),
        }
    }

    /// Time axis shared by every column.
    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Adds or replaces a column.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] if `values` does not have one entry
    /// per row.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), IoError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(IoError::Validation {
                count: 1,
                details: format!(
                    "column '{name}' has {} rows, table has {}",
                    values.len(),
                    self.len()
                ),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Column names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Values of column `name`.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Variables present for `role`, i.e. the `x` of every `<role>_x`
    /// column, sorted.
    pub fn variables(&self, role: &str) -> Vec<String> {
        let prefix = format!("{role}_");
        self.columns
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Builds a series with one location per variable of `role`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] if a `<role>_<variable>` column is
    /// absent and [`IoError::Validation`] if `variables` is empty.
    pub fn series(&self, role: &str, variables: &[String]) -> Result<Series, IoError> {
        if variables.is_empty() {
            return Err(IoError::Validation {
                count: 1,
                details: format!("no variables requested for '{role}'"),
            });
        }
        let rows = variables
            .iter()
            .map(|v| {
                let name = format!("{role}_{v}");
                self.column(&name)
                    .map(<[f64]>::to_vec)
                    .ok_or(IoError::MissingColumn {
                        name,
                        source_name: "table".to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Series::from_rows(self.time.clone(), &rows)?)
    }

    /// Inserts the locations of `series` as `<role>_<variable>` columns.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidTime`] if `series` is not on this table's
    /// time axis and [`IoError::Validation`] if the number of variables
    /// does not match its locations.
    pub fn insert_series(
        &mut self,
        role: &str,
        variables: &[String],
        series: &Series,
    ) -> Result<(), IoError> {
        if series.time() != &self.time {
            return Err(IoError::InvalidTime {
                reason: format!("'{role}' series is not on the table's time axis"),
            });
        }
        if variables.len() != series.n_loc() {
            return Err(IoError::Validation {
                count: 1,
                details: format!(
                    "{} variables for {} locations of '{role}'",
                    variables.len(),
                    series.n_loc()
                ),
            });
        }
        for (l, v) in variables.iter().enumerate() {
            self.insert(format!("{role}_{v}"), series.row(l))?;
        }
        Ok(())
    }
}
