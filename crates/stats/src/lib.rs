//! NaN-aware statistical helpers for the sdba bias-adjustment engine.
//!
//! Missing values are encoded as `NaN` throughout the workspace. Every
//! reducer in this crate skips them, and returns `NaN` when nothing valid is
//! left instead of inventing a value.
//!
//! | Module | Description |
//! |--------|-------------|
//! | (root) | means, spreads, quantiles, ranks, ECDF |
//! | `interp` | 1-D interpolation of adjustment factors on quantile grids |
//! | `poly` | polynomial least squares used by detrending |

mod interp;
mod poly;

pub use interp::{Extrapolation, Interp, interp_on_quantiles_1d};
pub use poly::{polyfit, polyval};

/// Mean of the finite-or-infinite (non-NaN) values. Returns NaN if none.
pub fn nanmean(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|x| !x.is_nan())
        .fold((0.0, 0usize), |(s, n), &x| (s + x, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Number of non-NaN values.
pub fn count_valid(data: &[f64]) -> usize {
    data.iter().filter(|x| !x.is_nan()).count()
}

/// Standard deviation of the non-NaN values with `ddof` delta degrees of
/// freedom. Returns NaN if fewer than `ddof + 1` valid values.
pub fn nanstd(data: &[f64], ddof: usize) -> f64 {
    let n = count_valid(data);
    if n <= ddof {
        return f64::NAN;
    }
    let mean = nanmean(data);
    let ss: f64 = data
        .iter()
        .filter(|x| !x.is_nan())
        .map(|&x| (x - mean) * (x - mean))
        .sum();
    (ss / (n - ddof) as f64).sqrt()
}

/// Centers and scales `data` to zero mean and unit (population) standard
/// deviation.
///
/// Returns the standardized values together with the mean and standard
/// deviation that were removed. NaN entries stay NaN.
pub fn standardize(data: &[f64]) -> (Vec<f64>, f64, f64) {
    let mean = nanmean(data);
    let sd = nanstd(data, 0);
    let out = data.iter().map(|&x| (x - mean) / sd).collect();
    (out, mean, sd)
}

/// Linear (type 7) quantile of pre-sorted, NaN-free data.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "quantile_type7: input must not be empty"
    );
    let n = sorted.len();
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Returns the non-NaN values of `data`, sorted ascending.
pub fn sorted_valid(data: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Empirical quantiles of `data` at each probability in `probs`, ignoring NaN.
///
/// Probabilities that are themselves NaN yield NaN. If `data` holds no valid
/// value, every quantile is NaN.
pub fn nanquantile(data: &[f64], probs: &[f64]) -> Vec<f64> {
    let sorted = sorted_valid(data);
    probs
        .iter()
        .map(|&p| {
            if sorted.is_empty() || p.is_nan() {
                f64::NAN
            } else {
                quantile_type7(&sorted, p.clamp(0.0, 1.0))
            }
        })
        .collect()
}

/// Ranks of `data` starting at 1, ties resolved by their average position.
///
/// NaN entries get a NaN rank and do not count toward the ranks of others.
pub fn rank_average(data: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..data.len()).filter(|&i| !data[i].is_nan()).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));

    let mut ranks = vec![f64::NAN; data.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && data[order[end]] == data[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) share ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg;
        }
        start = end;
    }
    ranks
}

/// Normalized percentile ranks in `[0, 1]`.
///
/// Average ranks are rescaled with `(r - r_min) / (r_max - r_min)`, so the
/// smallest valid value maps to 0 and the largest to 1. When every valid value
/// is tied the result is NaN (0 / 0), as is the rank of a NaN entry.
pub fn rank_pct(data: &[f64]) -> Vec<f64> {
    let ranks = rank_average(data);
    let (mn, mx) = ranks
        .iter()
        .filter(|r| !r.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(r), hi.max(r))
        });
    ranks.iter().map(|&r| (r - mn) / (mx - mn)).collect()
}

/// Fraction of valid values of `data` that are lower or equal to `value`.
///
/// Returns NaN if `data` has no valid values.
pub fn ecdf(data: &[f64], value: f64) -> f64 {
    let n = count_valid(data);
    if n == 0 {
        return f64::NAN;
    }
    data.iter().filter(|&&x| !x.is_nan() && x <= value).count() as f64 / n as f64
}

/// Value of `x` with the same non-exceedance probability as `y_value` in `y`.
///
/// The probability of `y_value` counts an implicit `-inf` sample, giving
/// `(count(y <= y_value) + 1) / (n_y + 1)`; it is then looked up in `x` with
/// [`nanquantile`].
pub fn map_cdf(x: &[f64], y: &[f64], y_value: f64) -> f64 {
    let n = count_valid(y);
    let below = y.iter().filter(|&&v| !v.is_nan() && v <= y_value).count();
    let q = (below + 1) as f64 / (n + 1) as f64;
    nanquantile(x, &[q])[0]
}

/// Reorders the values of `data` so that they follow the rank structure of
/// `order`: the k-th smallest value of `data` lands where `order` has its k-th
/// smallest value.
///
/// Positions where either input is NaN are left NaN and take no part in the
/// shuffle.
pub fn reorder_by_rank(data: &[f64], order: &[f64]) -> Vec<f64> {
    let valid: Vec<usize> = (0..data.len().min(order.len()))
        .filter(|&i| !data[i].is_nan() && !order[i].is_nan())
        .collect();
    let mut values: Vec<f64> = valid.iter().map(|&i| data[i]).collect();
    values.sort_by(f64::total_cmp);

    let mut by_order = valid.clone();
    by_order.sort_by(|&a, &b| order[a].total_cmp(&order[b]));

    let mut out = vec![f64::NAN; data.len()];
    for (k, &i) in by_order.iter().enumerate() {
        out[i] = values[k];
    }
    out
}
