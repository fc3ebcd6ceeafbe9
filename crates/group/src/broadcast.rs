//! Expansion of per-group statistics back onto a time axis.

use ndarray::{Array2, ArrayView2};

use crate::error::GroupError;
use crate::grouper::Grouper;
use crate::time::TimeAxis;

/// Expands `factor`, shaped `(location, group)`, onto every date of `time`.
///
/// With `smooth = false` each date takes its own group's value. With
/// `smooth = true` neighbouring group values are blended linearly with a
/// circular group axis (see [`Grouper::blend`]). A NaN group value only
/// contaminates the dates that give it a non-zero weight.
///
/// # Errors
///
/// Returns [`GroupError::ShapeMismatch`] if `factor` does not have one column
/// per group label.
pub fn broadcast(
    factor: ArrayView2<'_, f64>,
    time: &TimeAxis,
    grouper: &Grouper,
    smooth: bool,
) -> Result<Array2<f64>, GroupError> {
    let (n_loc, n_groups) = factor.dim();
    if n_groups != grouper.n_groups() {
        return Err(GroupError::ShapeMismatch {
            what: "group",
            expected: grouper.n_groups(),
            got: n_groups,
        });
    }

    let mut out = Array2::zeros((n_loc, time.len()));
    for (t, &date) in time.dates().iter().enumerate() {
        let weights = grouper.blend(date, smooth);
        for l in 0..n_loc {
            out[[l, t]] = weights
                .iter()
                .filter(|(_, w)| *w > 0.0)
                .map(|&(g, w)| w * factor[[l, g]])
                .sum();
        }
    }
    Ok(out)
}
