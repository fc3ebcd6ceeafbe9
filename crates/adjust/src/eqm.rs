//! Empirical quantile mapping (EQM).
//!
//! Training compares the quantiles of ref and hist in every group; adjusting
//! locates each simulated value on the hist quantiles of its group and
//! applies the interpolated factor. The training kernel is shared with DQM
//! (which normalizes both series by their group means first) and QDM.

use ndarray::{Array1, Array2, Array3, Ix2, Ix3};
use sdba_group::{Kind, Series, TimeAxis};
use sdba_stats::{nanmean, nanquantile};
use tracing::{debug, warn};

use crate::adapt_freq::adapt_freq;
use crate::block::{BlockSpec, map_blocks, map_groups};
use crate::config::QuantileConfig;
use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};
use crate::quantile::interp_on_quantiles;
use crate::rng::{base_seed, stream_rng};

/// Trained quantile-mapping factors.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileParams {
    config: QuantileConfig,
    af: Array3<f64>,
    hist_q: Array3<f64>,
}

impl QuantileParams {
    /// Configuration used for training.
    pub fn config(&self) -> &QuantileConfig {
        &self.config
    }

    /// Factors, shape `(group, location, quantile)`.
    pub fn af(&self) -> &Array3<f64> {
        &self.af
    }

    /// Hist quantiles, shape `(group, location, quantile)`.
    pub fn hist_q(&self) -> &Array3<f64> {
        &self.hist_q
    }

    /// Number of locations trained.
    pub fn n_loc(&self) -> usize {
        self.af.dim().1
    }

    /// Trained values as a dataset: `af` and `hist_q` over
    /// `[Group, Location, Quantile]`, `quantiles` over `[Quantile]`.
    pub fn to_dataset(&self) -> Dataset {
        let dims = vec![Dim::Group, Dim::Location, Dim::Quantile];
        Dataset::new()
            .with("af", DataArray::from_parts(dims.clone(), self.af.clone().into_dyn()))
            .with("hist_q", DataArray::from_parts(dims, self.hist_q.clone().into_dyn()))
            .with(
                "quantiles",
                DataArray::from_parts(
                    vec![Dim::Quantile],
                    Array1::from(self.config.quantiles().to_vec()).into_dyn(),
                ),
            )
    }
}

/// Output of the shared training kernel.
pub(crate) struct QuantileTraining {
    pub(crate) params: QuantileParams,
    /// Group-mean factor `(group, location)`, only when normalizing.
    pub(crate) scaling: Option<Array2<f64>>,
}

/// Trains EQM factors.
///
/// With `adapt_freq_thresh` set, hist is first frequency-adapted to ref in
/// every group, each `(location, group)` drawing from its own seeded stream.
/// Groups without valid data get NaN factors.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration and
/// propagates block-execution contract errors.
#[tracing::instrument(skip_all, fields(n_loc = input.n_loc(), nq = config.quantiles().len()))]
pub fn train(input: &TrainInput, config: &QuantileConfig) -> Result<QuantileParams, AdjustError> {
    Ok(train_quantiles(input, config, false)?.params)
}

pub(crate) fn train_quantiles(
    input: &TrainInput,
    config: &QuantileConfig,
    normalize: bool,
) -> Result<QuantileTraining, AdjustError> {
    config.validate()?;
    let time = input.reference().time();
    let ds = Dataset::new()
        .with("ref", DataArray::from_series(input.reference()))
        .with("hist", DataArray::from_series(input.hist()));
    let mut spec = BlockSpec::new()
        .output("af", &[Dim::Group, Dim::Location, Dim::Quantile])
        .output("hist_q", &[Dim::Group, Dim::Location, Dim::Quantile]);
    if normalize {
        spec = spec.output("scaling", &[Dim::Group, Dim::Location]);
    }

    let seed = config.adapt_freq_thresh().map(|_| base_seed(config.seed()));
    let kind = config.kind();
    let quantiles = config.quantiles();

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |range, chunk| {
        map_groups(chunk, time, config.group(), &spec, |block| {
            let reference = block.data().view::<Ix2>("ref", &[Dim::Location, Dim::Sample])?;
            let hist = block.data().view::<Ix2>("hist", &[Dim::Location, Dim::Sample])?;
            let n_loc = reference.nrows();
            if hist.iter().all(|v| v.is_nan()) {
                warn!(group = block.group(), "empty group, factors are NaN");
            }

            let mut af = Array2::from_elem((n_loc, quantiles.len()), f64::NAN);
            let mut hist_q = af.clone();
            let mut scaling = Array1::from_elem(n_loc, f64::NAN);
            for l in 0..n_loc {
                let mut r = reference.row(l).to_vec();
                let mut h = hist.row(l).to_vec();
                if let (Some(thresh), Some(base)) = (config.adapt_freq_thresh(), seed) {
                    let mut rng = stream_rng(base, range.start + l, block.group());
                    h = adapt_freq(&r, &h, thresh, &mut rng).into_sim_ad();
                }
                if normalize {
                    let (ref_mean, hist_mean) = (nanmean(&r), nanmean(&h));
                    normalize_by(&mut r, ref_mean, kind);
                    normalize_by(&mut h, hist_mean, kind);
                    scaling[l] = kind.get(hist_mean, ref_mean);
                }
                let ref_q = nanquantile(&r, quantiles);
                let hq = nanquantile(&h, quantiles);
                for (k, (&hv, &rv)) in hq.iter().zip(ref_q.iter()).enumerate() {
                    af[[l, k]] = kind.get(hv, rv);
                    hist_q[[l, k]] = hv;
                }
            }

            let mut result = Dataset::new()
                .with("af", DataArray::new(&[Dim::Location, Dim::Quantile], af)?)
                .with("hist_q", DataArray::new(&[Dim::Location, Dim::Quantile], hist_q)?);
            if normalize {
                result.insert("scaling", DataArray::new(&[Dim::Location], scaling)?);
            }
            Ok(result)
        })
    })?;

    let dims = [Dim::Group, Dim::Location, Dim::Quantile];
    let af = out.take_as::<Ix3>("af", &dims)?;
    let hist_q = out.take_as::<Ix3>("hist_q", &dims)?;
    let scaling = if normalize {
        Some(out.take_as::<Ix2>("scaling", &[Dim::Group, Dim::Location])?)
    } else {
        None
    };
    debug!(shape = ?af.dim(), "quantile factors trained");
    Ok(QuantileTraining {
        params: QuantileParams {
            config: config.clone(),
            af,
            hist_q,
        },
        scaling,
    })
}

/// `x - mean` or `x / mean`.
fn normalize_by(values: &mut [f64], mean: f64, kind: Kind) {
    let factor = kind.invert(mean);
    values.iter_mut().for_each(|v| *v = kind.apply(*v, factor));
}

/// Adjusts `input.sim` with the trained factors.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &QuantileParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let scen = map_quantiles(params, input.sim())?;
    Ok(Adjusted::new(scen))
}

/// Quantile-maps `sim`: interpolates the factor at each value's position on
/// the hist quantiles of its group and applies it.
pub(crate) fn map_quantiles(params: &QuantileParams, sim: &Series) -> Result<Series, AdjustError> {
    let config = &params.config;
    let dims = vec![Dim::Group, Dim::Location, Dim::Quantile];
    let ds = Dataset::new()
        .with("sim", DataArray::from_series(sim))
        .with("af", DataArray::from_parts(dims.clone(), params.af.clone().into_dyn()))
        .with("hist_q", DataArray::from_parts(dims, params.hist_q.clone().into_dyn()));
    let spec = BlockSpec::new().output("scen", &[Dim::Location, Dim::Time]);

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        let scen = map_chunk(chunk, sim.time(), config)?;
        Ok(Dataset::new().with("scen", DataArray::new(&[Dim::Location, Dim::Time], scen)?))
    })?;
    let scen = out.take_as::<Ix2>("scen", &[Dim::Location, Dim::Time])?;
    Ok(sim.with_values(scen)?)
}

fn map_chunk(
    chunk: &Dataset,
    time: &TimeAxis,
    config: &QuantileConfig,
) -> Result<Array2<f64>, AdjustError> {
    let dims = [Dim::Group, Dim::Location, Dim::Quantile];
    let sim = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
    let af = chunk.view::<Ix3>("af", &dims)?;
    let hist_q = chunk.view::<Ix3>("hist_q", &dims)?;
    let factor = interp_on_quantiles(
        sim,
        hist_q,
        af,
        time,
        &config.group(),
        config.interp(),
        config.extrapolation(),
    )?;
    let kind = config.kind();
    let mut scen = sim.to_owned();
    scen.zip_mut_with(&factor, |v, &f| *v = kind.apply(*v, f));
    Ok(scen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Gamma};
    use sdba_group::{GroupProp, Grouper};

    fn axis(n: usize) -> TimeAxis {
        TimeAxis::daily(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), n)
    }

    #[test]
    fn identical_series_give_identity_factors() {
        let values: Vec<f64> = (1..=5).map(f64::from).collect();
        let series = Series::from_vec(axis(5), values).unwrap();
        let input = TrainInput::new(series.clone(), series.clone()).unwrap();
        let params = train(&input, &QuantileConfig::new()).unwrap();
        assert!(params.af().iter().all(|&f| f.abs() < 1e-12));

        let out = adjust(&params, &AdjustInput::new(series.clone())).unwrap();
        for (a, b) in out.scen().values().iter().zip(series.values().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn identical_series_give_unit_factors() {
        let values: Vec<f64> = (1..=8).map(|v| f64::from(v) * 0.5).collect();
        let series = Series::from_vec(axis(8), values).unwrap();
        let input = TrainInput::new(series.clone(), series.clone()).unwrap();
        let config = QuantileConfig::new().with_kind(Kind::Multiplicative);
        let params = train(&input, &config).unwrap();
        assert!(params.af().iter().all(|&f| (f - 1.0).abs() < 1e-12));

        let out = adjust(&params, &AdjustInput::new(series.clone())).unwrap();
        for (a, b) in out.scen().values().iter().zip(series.values().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn shifted_reference_is_recovered() {
        let mut rng = StdRng::seed_from_u64(4);
        let n = 3 * 365;
        let hist: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..10.0)).collect();
        let reference: Vec<f64> = hist.iter().map(|v| v + 3.0).collect();
        let input = TrainInput::new(
            Series::from_vec(axis(n), reference).unwrap(),
            Series::from_vec(axis(n), hist.clone()).unwrap(),
        )
        .unwrap();
        let config = QuantileConfig::new()
            .with_group(Grouper::plain(GroupProp::Month))
            .with_interp(sdba_stats::Interp::Linear);
        let params = train(&input, &config).unwrap();
        assert!(params.af().iter().all(|&f| (f - 3.0).abs() < 1e-9));

        let out = adjust(&params, &AdjustInput::new(Series::from_vec(axis(n), hist.clone()).unwrap())).unwrap();
        for (s, h) in out.scen().row(0).iter().zip(&hist) {
            assert_relative_eq!(*s, h + 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn multiplicative_gamma_matches_reference_quantiles() {
        let mut rng = StdRng::seed_from_u64(9);
        let n = 4000;
        let hist_dist = Gamma::new(2.0, 1.0).unwrap();
        let ref_dist = Gamma::new(2.0, 2.0).unwrap();
        let hist: Vec<f64> = (0..n).map(|_| hist_dist.sample(&mut rng)).collect();
        let reference: Vec<f64> = (0..n).map(|_| ref_dist.sample(&mut rng)).collect();
        let input = TrainInput::new(
            Series::from_vec(axis(n), reference.clone()).unwrap(),
            Series::from_vec(axis(n), hist.clone()).unwrap(),
        )
        .unwrap();
        let config = QuantileConfig::new()
            .with_kind(Kind::Multiplicative)
            .with_nquantiles(50)
            .with_interp(sdba_stats::Interp::Linear);
        let params = train(&input, &config).unwrap();
        let out = adjust(&params, &AdjustInput::new(Series::from_vec(axis(n), hist).unwrap())).unwrap();

        let probs = [0.1, 0.5, 0.9];
        let expected = nanquantile(&reference, &probs);
        let got = nanquantile(&out.scen().row(0), &probs);
        for (e, g) in expected.iter().zip(&got) {
            assert!((e - g).abs() / e < 0.05, "expected {e}, got {g}");
        }
    }

    #[test]
    fn adapt_freq_is_seeded_per_location() {
        let n = 365;
        let mut rng = StdRng::seed_from_u64(2);
        let reference: Vec<Vec<f64>> = (0..3)
            .map(|_| (0..n).map(|i| if i % 3 == 0 { 0.0 } else { rng.random_range(1.0..5.0) }).collect())
            .collect();
        let hist: Vec<Vec<f64>> = (0..3)
            .map(|_| (0..n).map(|i| if i % 3 == 0 { rng.random_range(1.0..5.0) } else { 0.0 }).collect())
            .collect();
        let input = TrainInput::new(
            Series::from_rows(axis(n), &reference).unwrap(),
            Series::from_rows(axis(n), &hist).unwrap(),
        )
        .unwrap();
        let config = QuantileConfig::new().with_adapt_freq_thresh(0.5).with_seed(17);
        let whole = train(&input, &config).unwrap();
        let chunked = train(&input, &config.clone().with_chunk_size(1)).unwrap();
        assert_eq!(whole, chunked);
        assert_eq!(whole, train(&input, &config).unwrap());
    }

    #[test]
    fn empty_group_has_nan_factors() {
        // January only: every other month is empty
        let input = TrainInput::new(
            Series::from_vec(axis(31), vec![2.0; 31]).unwrap(),
            Series::from_vec(axis(31), vec![1.0; 31]).unwrap(),
        )
        .unwrap();
        let config = QuantileConfig::new().with_group(Grouper::plain(GroupProp::Month));
        let params = train(&input, &config).unwrap();
        assert!(params.af().slice(ndarray::s![0, 0, ..]).iter().all(|&f| f == 1.0));
        assert!(params.af().slice(ndarray::s![1, 0, ..]).iter().all(|f| f.is_nan()));
    }

    #[test]
    fn dataset_view() {
        let series = Series::from_vec(axis(5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let params = train(
            &TrainInput::new(series.clone(), series).unwrap(),
            &QuantileConfig::new().with_nquantiles(3),
        )
        .unwrap();
        let ds = params.to_dataset();
        assert_eq!(ds.names().collect::<Vec<_>>(), vec!["af", "hist_q", "quantiles"]);
        assert_eq!(ds.get("af").unwrap().data().shape(), &[1, 1, 5]);
    }
}
