//! Adjustment of extreme values.
//!
//! Tail distributions are fitted on cluster maxima above a joint ref/hist
//! threshold. Every hist extreme gets the factor that moves it to the ref
//! value of equal probability. Simulated extremes are located on their own
//! fitted tail, take the factor of their probability, and are blended into
//! the base scenario with a power-law transition that starts at the
//! threshold.

use std::ops::Range;

use ndarray::{Array1, Array2, ArrayView1, Ix1, Ix2};
use sdba_stats::{interp_on_quantiles_1d, nanquantile};
use tracing::debug;

use crate::block::{BlockSpec, map_blocks};
use crate::config::ExtremeConfig;
use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};
use crate::tail::{TailDist, TailParams, fit_tail};

/// A run of consecutive values above the lower threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    /// Index of the first value.
    pub start: usize,
    /// Index of the last value (inclusive).
    pub end: usize,
    /// Index of the maximum, first one on ties.
    pub argmax: usize,
    /// Maximum value.
    pub max: f64,
}

/// Clusters of `data`: maximal runs of values `> u2` holding at least one
/// value `> u1`. NaN ends a run.
///
/// ```
/// use sdba_adjust::get_clusters;
///
/// let data = [0.0, 2.0, 5.0, 2.0, 0.0, 3.0, 0.0, 6.0, 6.0, 0.0];
/// let clusters = get_clusters(&data, 4.0, 1.0);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!((clusters[0].start, clusters[0].end, clusters[0].max), (1, 3, 5.0));
/// assert_eq!(clusters[1].argmax, 7);
/// ```
pub fn get_clusters(data: &[f64], u1: f64, u2: f64) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut current: Option<Cluster> = None;
    for (i, &v) in data.iter().enumerate() {
        if v > u2 {
            let c = current.get_or_insert(Cluster {
                start: i,
                end: i,
                argmax: i,
                max: v,
            });
            c.end = i;
            if v > c.max {
                c.max = v;
                c.argmax = i;
            }
        } else if let Some(c) = current.take() {
            if c.max > u1 {
                clusters.push(c);
            }
        }
    }
    if let Some(c) = current {
        if c.max > u1 {
            clusters.push(c);
        }
    }
    clusters
}

/// Fits `dist` on the cluster maxima of `data` above `thresh`.
fn fit_on_clusters(
    data: &[f64],
    thresh: f64,
    cluster_thresh: f64,
    dist: TailDist,
    location: usize,
) -> Result<TailParams, AdjustError> {
    let clusters = get_clusters(data, thresh, cluster_thresh);
    if clusters.is_empty() {
        return Err(AdjustError::FitFailed {
            location,
            reason: format!("no cluster maxima above {thresh}"),
        });
    }
    let excess: Vec<f64> = clusters.iter().map(|c| c.max - thresh).collect();
    fit_tail(dist, &excess, thresh, location)
}

/// Weight of the extreme adjustment at `value`: 0 up to the threshold,
/// rising as `((value - thresh) / (max - thresh) / frac)^power` and capped
/// at 1.
pub fn transition(value: f64, thresh: f64, max: f64, frac: f64, power: f64) -> f64 {
    if value.is_nan() || value <= thresh || max <= thresh {
        return 0.0;
    }
    (((value - thresh) / (max - thresh)) / frac)
        .powf(power)
        .clamp(0.0, 1.0)
}

/// Trained extreme-value parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeParams {
    config: ExtremeConfig,
    px_hist: Array2<f64>,
    af: Array2<f64>,
    thresh: Array1<f64>,
}

impl ExtremeParams {
    /// Configuration used for training.
    pub fn config(&self) -> &ExtremeConfig {
        &self.config
    }

    /// Sorted probabilities of the hist extremes, NaN-padded, shape
    /// `(location, quantile)`.
    pub fn px_hist(&self) -> &Array2<f64> {
        &self.px_hist
    }

    /// Multiplicative factors matching `px_hist`.
    pub fn af(&self) -> &Array2<f64> {
        &self.af
    }

    /// Joint threshold of every location.
    pub fn thresh(&self) -> &Array1<f64> {
        &self.thresh
    }

    /// Trained values as a dataset: `px_hist` and `af` over
    /// `[Location, Quantile]`, `thresh` over `[Location]`.
    pub fn to_dataset(&self) -> Dataset {
        let dims = vec![Dim::Location, Dim::Quantile];
        Dataset::new()
            .with("px_hist", DataArray::from_parts(dims.clone(), self.px_hist.clone().into_dyn()))
            .with("af", DataArray::from_parts(dims, self.af.clone().into_dyn()))
            .with(
                "thresh",
                DataArray::from_parts(vec![Dim::Location], self.thresh.clone().into_dyn()),
            )
    }
}

fn at_or_above(data: &[f64], t: f64) -> Vec<f64> {
    data.iter().copied().filter(|&v| v >= t).collect()
}

/// Smallest and largest value; `(inf, -inf)` when empty.
fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

struct TrainedLocation {
    px_hist: Vec<f64>,
    af: Vec<f64>,
    thresh: f64,
}

fn train_location(
    reference: &[f64],
    hist: &[f64],
    ref_params: Option<TailParams>,
    config: &ExtremeConfig,
    location: usize,
) -> Result<TrainedLocation, AdjustError> {
    let ct = config.cluster_thresh();
    let q = [config.q_thresh()];
    let thresh =
        (nanquantile(&at_or_above(reference, ct), &q)[0] + nanquantile(&at_or_above(hist, ct), &q)[0]) / 2.0;
    if thresh.is_nan() {
        return Err(AdjustError::FitFailed {
            location,
            reason: format!("no values above cluster threshold {ct}"),
        });
    }

    let ref_params = match ref_params {
        Some(p) => p,
        None => fit_on_clusters(reference, thresh, ct, config.dist(), location)?,
    };
    let hist_params = fit_on_clusters(hist, thresh, ct, config.dist(), location)?;

    let px_ref: Vec<f64> = at_or_above(reference, thresh).iter().map(|&v| ref_params.cdf(v)).collect();
    let hist_ext = at_or_above(hist, thresh);
    let px_hist: Vec<f64> = hist_ext.iter().map(|&v| hist_params.cdf(v)).collect();

    let (ref_lo, ref_hi) = min_max(&px_ref);
    let (hist_lo, hist_hi) = min_max(&px_hist);
    let (lo, hi) = (ref_lo.max(hist_lo), ref_hi.min(hist_hi));
    let mut pairs: Vec<(f64, f64)> = px_hist
        .iter()
        .zip(&hist_ext)
        .filter(|&(&p, _)| p >= lo && p <= hi)
        .map(|(&p, &h)| (p, ref_params.ppf(p) / h))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = reference.len();
    let mut px = vec![f64::NAN; n];
    let mut af = vec![f64::NAN; n];
    for (k, (p, f)) in pairs.into_iter().enumerate().take(n) {
        px[k] = p;
        af[k] = f;
    }
    Ok(TrainedLocation {
        px_hist: px,
        af,
        thresh,
    })
}

fn train_chunk(
    range: Range<usize>,
    chunk: &Dataset,
    config: &ExtremeConfig,
) -> Result<Dataset, AdjustError> {
    let reference = chunk.view::<Ix2>("ref", &[Dim::Location, Dim::Time])?;
    let hist = chunk.view::<Ix2>("hist", &[Dim::Location, Dim::Time])?;
    let (n_loc, n_time) = reference.dim();
    let mut px_hist = Array2::from_elem((n_loc, n_time), f64::NAN);
    let mut af = px_hist.clone();
    let mut thresh = Array1::from_elem(n_loc, f64::NAN);
    for l in 0..n_loc {
        let location = range.start + l;
        let ref_params = config.ref_params().and_then(|p| p.get(location).copied());
        let trained = train_location(
            &reference.row(l).to_vec(),
            &hist.row(l).to_vec(),
            ref_params,
            config,
            location,
        )?;
        px_hist.row_mut(l).assign(&ArrayView1::from(trained.px_hist.as_slice()));
        af.row_mut(l).assign(&ArrayView1::from(trained.af.as_slice()));
        thresh[l] = trained.thresh;
    }
    Ok(Dataset::new()
        .with("px_hist", DataArray::new(&[Dim::Location, Dim::Quantile], px_hist)?)
        .with("af", DataArray::new(&[Dim::Location, Dim::Quantile], af)?)
        .with("thresh", DataArray::new(&[Dim::Location], thresh)?))
}

/// Trains the extreme-value factors of every location over the whole
/// series.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration,
/// [`AdjustError::ShapeContract`] if `ref_params` does not hold one tail per
/// location and [`AdjustError::FitFailed`] when a location has no value
/// above `cluster_thresh` or no cluster maxima to fit.
#[tracing::instrument(skip_all, fields(n_loc = input.n_loc(), dist = %config.dist()))]
pub fn train(input: &TrainInput, config: &ExtremeConfig) -> Result<ExtremeParams, AdjustError> {
    config.validate()?;
    if let Some(params) = config.ref_params() {
        if params.len() != input.n_loc() {
            return Err(AdjustError::shape(
                "ref_params",
                format!("{} tails for {} locations", params.len(), input.n_loc()),
            ));
        }
    }
    let ds = Dataset::new()
        .with("ref", DataArray::from_series(input.reference()))
        .with("hist", DataArray::from_series(input.hist()));
    let spec = BlockSpec::new()
        .output("px_hist", &[Dim::Location, Dim::Quantile])
        .output("af", &[Dim::Location, Dim::Quantile])
        .output("thresh", &[Dim::Location]);

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |range, chunk| {
        train_chunk(range, chunk, config)
    })?;
    let px_hist = out.take_as::<Ix2>("px_hist", &[Dim::Location, Dim::Quantile])?;
    let af = out.take_as::<Ix2>("af", &[Dim::Location, Dim::Quantile])?;
    let thresh = out.take_as::<Ix1>("thresh", &[Dim::Location])?;
    debug!(thresh = ?thresh.to_vec(), "extreme thresholds");
    Ok(ExtremeParams {
        config: config.clone(),
        px_hist,
        af,
        thresh,
    })
}

fn adjust_chunk(
    range: Range<usize>,
    chunk: &Dataset,
    config: &ExtremeConfig,
) -> Result<Dataset, AdjustError> {
    let sim = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
    let base = chunk.view::<Ix2>("base", &[Dim::Location, Dim::Time])?;
    let px_hist = chunk.view::<Ix2>("px_hist", &[Dim::Location, Dim::Quantile])?;
    let af = chunk.view::<Ix2>("af", &[Dim::Location, Dim::Quantile])?;
    let thresh = chunk.view::<Ix1>("thresh", &[Dim::Location])?;

    let mut scen = base.to_owned();
    for l in 0..sim.nrows() {
        let s = sim.row(l).to_vec();
        let t = thresh[l];
        let max = s.iter().copied().filter(|v| !v.is_nan()).fold(f64::NEG_INFINITY, f64::max);
        // every weight is 0: the row keeps its base values
        if max <= t {
            continue;
        }
        let sim_params = fit_on_clusters(&s, t, config.cluster_thresh(), config.dist(), range.start + l)?;
        let px: Vec<f64> = s.iter().map(|&v| sim_params.cdf(v)).collect();
        let factors = interp_on_quantiles_1d(
            &px,
            &px_hist.row(l).to_vec(),
            &af.row(l).to_vec(),
            config.interp(),
            config.extrapolation(),
        );
        for (k, (&v, f)) in s.iter().zip(factors).enumerate() {
            let w = transition(v, t, max, config.frac(), config.power());
            if w > 0.0 {
                scen[[l, k]] = w * v * f + (1.0 - w) * base[[l, k]];
            }
        }
    }
    Ok(Dataset::new().with("scen", DataArray::new(&[Dim::Location, Dim::Time], scen)?))
}

/// Adjusts the extremes of `input.sim`.
///
/// The base scenario is `input.scen` when supplied, sim otherwise. Values
/// at or below the trained threshold keep their base value exactly, and a
/// location whose sim never exceeds the threshold is returned unchanged
/// without fitting its tail.
///
/// # Errors
///
/// Returns [`AdjustError::FitFailed`] when the tail fit on the sim clusters
/// of a location fails, and [`AdjustError::ShapeContract`] if sim
/// does not have the trained number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &ExtremeParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let base = input.scen().unwrap_or(sim);
    let mut ds = params.to_dataset();
    ds.insert("sim", DataArray::from_series(sim));
    ds.insert("base", DataArray::from_series(base));
    let spec = BlockSpec::new().output("scen", &[Dim::Location, Dim::Time]);

    let mut out = map_blocks(&ds, &spec, params.config.chunk_size(), |range, chunk| {
        adjust_chunk(range, chunk, &params.config)
    })?;
    let scen = out.take_as::<Ix2>("scen", &[Dim::Location, Dim::Time])?;
    Ok(Adjusted::new(sim.with_values(scen)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Exp};
    use sdba_group::{Series, TimeAxis};

    fn axis(start_year: i32, n: usize) -> TimeAxis {
        TimeAxis::daily(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), n)
    }

    fn exp_series(seed: u64, n: usize, mean: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Exp::new(1.0 / mean).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    fn trained(n: usize) -> (ExtremeParams, Vec<f64>) {
        let input = TrainInput::new(
            Series::from_vec(axis(1980, n), exp_series(1, n, 6.0)).unwrap(),
            Series::from_vec(axis(1980, n), exp_series(2, n, 4.0)).unwrap(),
        )
        .unwrap();
        let params = train(&input, &ExtremeConfig::new(1.0)).unwrap();
        (params, exp_series(3, n, 4.5))
    }

    #[test]
    fn clusters_need_a_peak_above_u1() {
        let data = [5.0, 5.0, f64::NAN, 2.0, 3.0, 0.0, 9.0];
        let clusters = get_clusters(&data, 4.0, 1.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!((clusters[0].start, clusters[0].end, clusters[0].argmax), (0, 1, 0));
        assert_eq!((clusters[1].start, clusters[1].end, clusters[1].max), (6, 6, 9.0));
        assert!(get_clusters(&[0.0, 2.0, 0.0], 4.0, 1.0).is_empty());
    }

    #[test]
    fn transition_shape() {
        assert_eq!(transition(5.0, 5.0, 10.0, 0.25, 1.0), 0.0);
        assert_eq!(transition(4.0, 5.0, 10.0, 0.25, 1.0), 0.0);
        assert_relative_eq!(transition(6.0, 5.0, 10.0, 0.25, 1.0), 0.8);
        assert_eq!(transition(7.0, 5.0, 10.0, 0.25, 1.0), 1.0);
        assert_relative_eq!(transition(6.0, 5.0, 10.0, 0.25, 2.0), 0.64);
        // degenerate range: no blending
        assert_eq!(transition(5.0, 5.0, 5.0, 0.25, 1.0), 0.0);
        assert!(transition(5.0 + 1e-9, 5.0, 10.0, 0.25, 1.0) < 1e-8);
    }

    #[test]
    fn factors_are_sorted_by_probability() {
        let (params, _) = trained(3650);
        let px: Vec<f64> = params.px_hist().row(0).iter().copied().filter(|p| !p.is_nan()).collect();
        assert!(!px.is_empty());
        assert!(px.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(params.px_hist().ncols(), 3650);
        // ref has the heavier tail
        let af: Vec<f64> = params.af().row(0).iter().copied().filter(|f| !f.is_nan()).collect();
        assert!(af.iter().sum::<f64>() / af.len() as f64 > 1.0);
    }

    #[test]
    fn values_below_threshold_are_untouched() {
        let n = 3650;
        let (params, sim) = trained(n);
        let thresh = params.thresh()[0];
        let input = AdjustInput::new(Series::from_vec(axis(2050, n), sim.clone()).unwrap());
        let out = adjust(&params, &input).unwrap();
        let scen = out.scen().row(0);
        let max = sim.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (s, o) in sim.iter().zip(&scen) {
            if *s <= thresh {
                assert_eq!(s, o);
            } else {
                assert!(o.is_finite());
            }
        }
        // the largest value is fully adjusted
        let k = sim.iter().position(|&v| v == max).unwrap();
        assert!(scen[k] != sim[k]);
    }

    #[test]
    fn supplied_base_scenario() {
        let n = 3650;
        let (params, sim) = trained(n);
        let base: Vec<f64> = sim.iter().map(|v| v + 100.0).collect();
        let input = AdjustInput::new(Series::from_vec(axis(2050, n), sim.clone()).unwrap())
            .with_scen(Series::from_vec(axis(2050, n), base.clone()).unwrap())
            .unwrap();
        let out = adjust(&params, &input).unwrap();
        let thresh = params.thresh()[0];
        for ((s, b), o) in sim.iter().zip(&base).zip(out.scen().row(0)) {
            if *s <= thresh {
                assert_eq!(*b, o);
            }
        }
    }

    #[test]
    fn sim_at_or_below_threshold_keeps_base() {
        let n = 3650;
        let (params, sim) = trained(n);
        let thresh = params.thresh()[0];
        let capped: Vec<f64> = sim.iter().map(|&v| v.min(thresh)).collect();
        assert!(capped.contains(&thresh));
        let input = AdjustInput::new(Series::from_vec(axis(2050, n), capped.clone()).unwrap());
        let out = adjust(&params, &input).unwrap();
        assert_eq!(out.scen().row(0).to_vec(), capped);

        let base: Vec<f64> = capped.iter().map(|v| v * 2.0).collect();
        let input = AdjustInput::new(Series::from_vec(axis(2050, n), capped).unwrap())
            .with_scen(Series::from_vec(axis(2050, n), base.clone()).unwrap())
            .unwrap();
        assert_eq!(adjust(&params, &input).unwrap().scen().row(0).to_vec(), base);
    }

    #[test]
    fn no_values_above_cluster_threshold_fails() {
        let input = TrainInput::new(
            Series::from_vec(axis(2000, 10), vec![0.5; 10]).unwrap(),
            Series::from_vec(axis(2000, 10), vec![0.5; 10]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            train(&input, &ExtremeConfig::new(1.0)),
            Err(AdjustError::FitFailed { location: 0, .. })
        ));
    }

    #[test]
    fn ref_params_length_is_checked() {
        let input = TrainInput::new(
            Series::from_vec(axis(2000, 10), vec![2.0; 10]).unwrap(),
            Series::from_vec(axis(2000, 10), vec![2.0; 10]).unwrap(),
        )
        .unwrap();
        let tail = TailParams::new(TailDist::GenPareto, 0.1, 1.0, 1.0).unwrap();
        let config = ExtremeConfig::new(1.0).with_ref_params(vec![tail, tail]);
        assert!(matches!(
            train(&input, &config),
            Err(AdjustError::ShapeContract { .. })
        ));
    }
}
