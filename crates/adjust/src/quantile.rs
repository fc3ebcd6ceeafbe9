//! Quantile grids and grouped interpolation of adjustment factors.

use ndarray::{Array2, ArrayView2, ArrayView3};
use sdba_group::{GroupProp, Grouper, TimeAxis};
use sdba_stats::{Extrapolation, Interp, interp_on_quantiles_1d};

use crate::error::AdjustError;

/// `n` equally spaced mid-point probabilities in `(0, 1)`, optionally
/// bracketed by `eps` and `1 - eps`.
///
/// ```
/// use sdba_adjust::equally_spaced_nodes;
///
/// assert_eq!(equally_spaced_nodes(4, None), vec![0.125, 0.375, 0.625, 0.875]);
/// assert_eq!(equally_spaced_nodes(1, Some(0.01)), vec![0.01, 0.5, 0.99]);
/// ```
pub fn equally_spaced_nodes(n: usize, eps: Option<f64>) -> Vec<f64> {
    let dq = 0.5 / n as f64;
    let mid = (0..n).map(|i| dq + 2.0 * dq * i as f64);
    match eps {
        None => mid.collect(),
        Some(e) => std::iter::once(e)
            .chain(mid)
            .chain(std::iter::once(1.0 - e))
            .collect(),
    }
}

/// Evaluates a per-group factor curve at every value of `newx`.
///
/// `newx` is shaped `(location, time)`; `xq` and `yq` are shaped
/// `(group, location, quantile)` and hold, per group, the curve nodes and
/// their factors. Each time step reads the curve of its own group with
/// [`Interp::Nearest`]. With [`Interp::Linear`] the curves of the two
/// neighbouring groups are both evaluated and blended by the date's position
/// between group centers, the group axis being circular.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] when the arrays disagree on the
/// number of locations, groups or nodes, or `newx` does not match `time`.
pub fn interp_on_quantiles(
    newx: ArrayView2<'_, f64>,
    xq: ArrayView3<'_, f64>,
    yq: ArrayView3<'_, f64>,
    time: &TimeAxis,
    grouper: &Grouper,
    interp: Interp,
    extrap: Extrapolation,
) -> Result<Array2<f64>, AdjustError> {
    let (n_loc, n_time) = newx.dim();
    if n_time != time.len() {
        return Err(AdjustError::shape(
            "newx",
            format!("{n_time} time steps, axis has {}", time.len()),
        ));
    }
    if xq.dim() != yq.dim() {
        return Err(AdjustError::shape(
            "af",
            format!("nodes {:?} and factors {:?} differ", xq.dim(), yq.dim()),
        ));
    }
    let (n_groups, q_loc, _) = xq.dim();
    if n_groups != grouper.n_groups() || q_loc != n_loc {
        return Err(AdjustError::shape(
            "af",
            format!(
                "expected {} groups by {n_loc} locations, got {n_groups} by {q_loc}",
                grouper.n_groups()
            ),
        ));
    }

    // (time, weight) lists of each group
    let smooth = interp == Interp::Linear && grouper.prop() != GroupProp::None;
    let mut queries: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_groups];
    for (t, &date) in time.dates().iter().enumerate() {
        for (g, w) in grouper.blend(date, smooth) {
            if w > 0.0 {
                queries[g].push((t, w));
            }
        }
    }

    let mut out = Array2::zeros((n_loc, n_time));
    for l in 0..n_loc {
        for (g, steps) in queries.iter().enumerate() {
            if steps.is_empty() {
                continue;
            }
            let x: Vec<f64> = steps.iter().map(|&(t, _)| newx[[l, t]]).collect();
            let nodes = xq.slice(ndarray::s![g, l, ..]).to_vec();
            let factors = yq.slice(ndarray::s![g, l, ..]).to_vec();
            let values = interp_on_quantiles_1d(&x, &nodes, &factors, interp, extrap);
            for (&(t, w), v) in steps.iter().zip(values) {
                out[[l, t]] += w * v;
            }
        }
    }
    Ok(out)
}
