//! Interpolation of adjustment factors on a quantile grid.

/// Interpolation method between grid nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interp {
    /// Value of the closest node.
    Nearest,
    /// Piecewise-linear between the two bracketing nodes.
    #[default]
    Linear,
}

/// Policy for query points outside the trained grid.
///
/// Has no `Default`: [`interp_on_quantiles_1d`] always takes it explicitly.
/// The adjustment configs start from `Constant` and let callers override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// Clamp to the first or last valid node value.
    Constant,
    /// Fill with NaN.
    Nan,
}

/// Evaluates the curve `(oldx, oldy)` at every `newx`.
///
/// `oldx` must be sorted ascending once NaN pairs are removed. NaN queries
/// stay NaN. If every query or every node is NaN, the whole output is NaN.
pub fn interp_on_quantiles_1d(
    newx: &[f64],
    oldx: &[f64],
    oldy: &[f64],
    interp: Interp,
    extrap: Extrapolation,
) -> Vec<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = oldx
        .iter()
        .zip(oldy.iter())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .unzip();

    if xs.is_empty() {
        return vec![f64::NAN; newx.len()];
    }

    let (lo_fill, hi_fill) = match extrap {
        Extrapolation::Constant => (ys[0], ys[ys.len() - 1]),
        Extrapolation::Nan => (f64::NAN, f64::NAN),
    };

    newx.iter()
        .map(|&x| {
            if x.is_nan() {
                f64::NAN
            } else if x < xs[0] {
                lo_fill
            } else if x > xs[xs.len() - 1] {
                hi_fill
            } else {
                eval_inside(&xs, &ys, x, interp)
            }
        })
        .collect()
}

/// Evaluates at `x` known to lie within `[xs[0], xs[last]]`.
fn eval_inside(xs: &[f64], ys: &[f64], x: f64, interp: Interp) -> f64 {
    // first index whose node is strictly greater than x
    let hi = xs.partition_point(|&v| v <= x);
    if hi == 0 {
        return ys[0];
    }
    if hi == xs.len() {
        return ys[xs.len() - 1];
    }
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    let frac = if span > 0.0 { (x - xs[lo]) / span } else { 0.0 };
    match interp {
        Interp::Linear => ys[lo] + frac * (ys[hi] - ys[lo]),
        Interp::Nearest => {
            if frac > 0.5 {
                ys[hi]
            } else {
                ys[lo]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_inside_grid() {
        let out = interp_on_quantiles_1d(
            &[0.25, 0.5],
            &[0.0, 1.0],
            &[10.0, 20.0],
            Interp::Linear,
            Extrapolation::Constant,
        );
        assert_relative_eq!(out[0], 12.5);
        assert_relative_eq!(out[1], 15.0);
    }

    #[test]
    fn constant_extrapolation_clamps() {
        let out = interp_on_quantiles_1d(
            &[-1.0, 2.0],
            &[0.0, 1.0],
            &[10.0, 20.0],
            Interp::Linear,
            Extrapolation::Constant,
        );
        assert_eq!(out, vec![10.0, 20.0]);
    }

    #[test]
    fn nan_extrapolation_fills() {
        let out = interp_on_quantiles_1d(
            &[-1.0, 0.5, 2.0],
            &[0.0, 1.0],
            &[10.0, 20.0],
            Interp::Linear,
            Extrapolation::Nan,
        );
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 15.0);
        assert!(out[2].is_nan());
    }

    #[test]
    fn nearest_picks_closest_node() {
        let out = interp_on_quantiles_1d(
            &[0.4, 0.6],
            &[0.0, 1.0],
            &[10.0, 20.0],
            Interp::Nearest,
            Extrapolation::Constant,
        );
        assert_eq!(out, vec![10.0, 20.0]);
    }

    #[test]
    fn nan_nodes_are_skipped() {
        let out = interp_on_quantiles_1d(
            &[0.5],
            &[0.0, f64::NAN, 1.0],
            &[0.0, 99.0, 2.0],
            Interp::Linear,
            Extrapolation::Constant,
        );
        assert_relative_eq!(out[0], 1.0);
    }

    #[test]
    fn all_nan_nodes_give_nan() {
        let out = interp_on_quantiles_1d(
            &[0.5, 0.7],
            &[f64::NAN],
            &[f64::NAN],
            Interp::Linear,
            Extrapolation::Constant,
        );
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn monotonic_for_increasing_curve() {
        let grid: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        let af: Vec<f64> = grid.iter().map(|q| q * q + q).collect();
        let queries: Vec<f64> = (0..=200).map(|i| -0.25 + i as f64 / 133.0).collect();
        for interp in [Interp::Linear, Interp::Nearest] {
            let out =
                interp_on_quantiles_1d(&queries, &grid, &af, interp, Extrapolation::Constant);
            for w in out.windows(2) {
                assert!(w[1] >= w[0], "{interp:?}: {} then {}", w[0], w[1]);
            }
        }
    }
}
