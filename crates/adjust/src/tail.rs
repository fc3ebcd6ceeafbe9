//! Tail distributions for cluster maxima.
//!
//! The generalized Pareto distribution is fitted by maximum likelihood with
//! its location fixed at the threshold, minimizing the negative
//! log-likelihood with Nelder-Mead over `(shape, ln scale)`. The exponential
//! tail is the `shape = 0` special case and has a closed-form fit.

use std::fmt;
use std::str::FromStr;

use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;
use statrs::distribution::{ContinuousCDF, Exp};

use crate::error::AdjustError;

/// Shapes smaller than this are treated as the exponential limit.
const SHAPE_EPS: f64 = 1e-9;

/// Family of the tail distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailDist {
    /// Generalized Pareto.
    #[default]
    GenPareto,
    /// Exponential (generalized Pareto with zero shape).
    Exponential,
}

impl fmt::Display for TailDist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailDist::GenPareto => f.write_str("genpareto"),
            TailDist::Exponential => f.write_str("expon"),
        }
    }
}

impl FromStr for TailDist {
    type Err = AdjustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genpareto" | "gpd" => Ok(TailDist::GenPareto),
            "expon" | "exponential" => Ok(TailDist::Exponential),
            other => Err(AdjustError::config(format!(
                "unknown tail distribution '{other}' (expected genpareto or expon)"
            ))),
        }
    }
}

/// Parameters of a fitted tail distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailParams {
    dist: TailDist,
    shape: f64,
    loc: f64,
    scale: f64,
}

impl TailParams {
    /// Validated parameters. Returns `None` unless `loc` and `shape` are
    /// finite and `scale` is finite and positive. The shape of an
    /// exponential tail is forced to 0.
    pub fn new(dist: TailDist, shape: f64, loc: f64, scale: f64) -> Option<Self> {
        if !(shape.is_finite() && loc.is_finite() && scale.is_finite() && scale > 0.0) {
            return None;
        }
        let shape = match dist {
            TailDist::GenPareto => shape,
            TailDist::Exponential => 0.0,
        };
        Some(Self {
            dist,
            shape,
            loc,
            scale,
        })
    }

    /// Distribution family.
    pub fn dist(&self) -> TailDist {
        self.dist
    }

    /// Shape (ξ).
    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// Location (the threshold).
    pub fn loc(&self) -> f64 {
        self.loc
    }

    /// Scale (σ).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Cumulative probability of `x`; 0 below the location, NaN for NaN.
    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let z = (x - self.loc) / self.scale;
        if z <= 0.0 {
            return 0.0;
        }
        match self.dist {
            TailDist::Exponential => match Exp::new(1.0 / self.scale) {
                Ok(exp) => exp.cdf(x - self.loc),
                Err(_) => f64::NAN,
            },
            TailDist::GenPareto if self.shape.abs() < SHAPE_EPS => 1.0 - (-z).exp(),
            TailDist::GenPareto => {
                let base = 1.0 + self.shape * z;
                if base <= 0.0 {
                    // beyond the upper end point of a bounded tail
                    1.0
                } else {
                    1.0 - base.powf(-1.0 / self.shape)
                }
            }
        }
    }

    /// Quantile function; NaN outside `[0, 1]`.
    pub fn ppf(&self, p: f64) -> f64 {
        if !(0.0..=1.0).contains(&p) {
            return f64::NAN;
        }
        match self.dist {
            TailDist::Exponential => self.loc - self.scale * (1.0 - p).ln(),
            TailDist::GenPareto if self.shape.abs() < SHAPE_EPS => {
                self.loc - self.scale * (1.0 - p).ln()
            }
            TailDist::GenPareto => {
                self.loc + self.scale * ((1.0 - p).powf(-self.shape) - 1.0) / self.shape
            }
        }
    }
}

/// Fits `dist` to the exceedances `excess` (values minus `loc`, all
/// positive) with the location fixed at `loc`.
///
/// # Errors
///
/// Returns [`AdjustError::FitFailed`] (reported at `location`) when there is
/// no exceedance, too few for a generalized Pareto fit, or the optimizer
/// fails.
pub fn fit_tail(
    dist: TailDist,
    excess: &[f64],
    loc: f64,
    location: usize,
) -> Result<TailParams, AdjustError> {
    let fail = |reason: &str| AdjustError::FitFailed {
        location,
        reason: reason.to_string(),
    };
    let excess: Vec<f64> = excess.iter().copied().filter(|v| v.is_finite()).collect();
    if excess.is_empty() {
        return Err(fail("no cluster maxima above threshold"));
    }
    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;

    match dist {
        TailDist::Exponential => TailParams::new(dist, 0.0, loc, mean)
            .ok_or_else(|| fail("degenerate exceedances")),
        TailDist::GenPareto => {
            if excess.len() < 2 {
                return Err(fail("at least 2 cluster maxima are needed"));
            }
            let (shape0, scale0) = moment_start(&excess, mean);
            let simplex = vec![
                vec![shape0, scale0.ln()],
                vec![shape0 + 0.2, scale0.ln()],
                vec![shape0, scale0.ln() + 0.3],
            ];
            let solver = NelderMead::new(simplex)
                .with_sd_tolerance(1e-10)
                .map_err(|e| fail(&e.to_string()))?;
            let result = Executor::new(GpdCost { excess: &excess }, solver)
                .configure(|state| state.max_iters(2000))
                .run()
                .map_err(|e| fail(&e.to_string()))?;
            let best = result
                .state()
                .best_param
                .as_ref()
                .ok_or_else(|| fail("optimizer returned no parameters"))?;
            TailParams::new(dist, best[0], loc, best[1].exp())
                .ok_or_else(|| fail("non-finite parameters"))
        }
    }
}

/// Method-of-moments starting point, falling back to an exponential start
/// when the sample variance is unusable.
fn moment_start(excess: &[f64], mean: f64) -> (f64, f64) {
    let n = excess.len() as f64;
    let var = excess.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let ratio = mean * mean / var;
    let shape = 0.5 * (1.0 - ratio);
    let scale = 0.5 * mean * (ratio + 1.0);
    if shape.is_finite() && shape > -0.5 && scale.is_finite() && scale > 0.0 {
        (shape, scale)
    } else {
        (0.1, mean.max(f64::MIN_POSITIVE))
    }
}

/// Negative log-likelihood of the generalized Pareto over
/// `(shape, ln scale)`.
struct GpdCost<'a> {
    excess: &'a [f64],
}

impl CostFunction for GpdCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let (shape, scale) = (params[0], params[1].exp());
        if shape <= -1.0 || !scale.is_finite() || scale <= 0.0 {
            return Ok(f64::MAX);
        }
        let n = self.excess.len() as f64;
        let nll = if shape.abs() < SHAPE_EPS {
            n * scale.ln() + self.excess.iter().map(|y| y / scale).sum::<f64>()
        } else {
            let mut acc = 0.0;
            for &y in self.excess {
                let base = 1.0 + shape * y / scale;
                if base <= 0.0 {
                    return Ok(f64::MAX);
                }
                acc += base.ln();
            }
            n * scale.ln() + (1.0 + 1.0 / shape) * acc
        };
        Ok(if nll.is_finite() { nll } else { f64::MAX })
    }
}
