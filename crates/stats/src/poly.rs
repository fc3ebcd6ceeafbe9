//! Polynomial least squares.

use nalgebra::{DMatrix, DVector};

/// Least-squares polynomial coefficients of `y` against `x`, lowest order
/// first (`c[0] + c[1] x + ... + c[degree] x^degree`).
///
/// Pairs where either coordinate is NaN are ignored. Returns `None` when no
/// valid pair is left or the solve fails. With fewer points than
/// coefficients the minimum-norm solution is returned.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.is_empty() {
        return None;
    }

    let n = pairs.len();
    let n_coef = degree + 1;
    let design = DMatrix::from_fn(n, n_coef, |i, j| pairs[i].0.powi(j as i32));
    let rhs = DVector::from_iterator(n, pairs.iter().map(|p| p.1));

    let svd = design.svd(true, true);
    let coef = svd.solve(&rhs, 1e-12).ok()?;
    Some(coef.iter().copied().collect())
}

/// Evaluates polynomial `coef` (lowest order first) at `x` with Horner's rule.
pub fn polyval(coef: &[f64], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_exact_quadratic() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 - 2.0 * v + 0.5 * v * v).collect();
        let c = polyfit(&x, &y, 2).unwrap();
        assert_relative_eq!(c[0], 1.5, epsilon = 1e-9);
        assert_relative_eq!(c[1], -2.0, epsilon = 1e-9);
        assert_relative_eq!(c[2], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn degree_zero_is_mean() {
        let c = polyfit(&[0.0, 1.0, 2.0], &[1.0, 2.0, 6.0], 0).unwrap();
        assert_relative_eq!(c[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn nan_pairs_ignored() {
        let c = polyfit(&[0.0, 1.0, f64::NAN, 2.0], &[1.0, 3.0, 100.0, 5.0], 1).unwrap();
        assert_relative_eq!(c[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(c[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn no_valid_points() {
        assert!(polyfit(&[f64::NAN], &[1.0], 1).is_none());
    }

    #[test]
    fn horner() {
        assert_relative_eq!(polyval(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_relative_eq!(polyval(&[], 2.0), 0.0);
    }
}
