//! N-dimensional probability density function transform (NpdfT).
//!
//! The locations of the input series are the variables of one multivariate
//! distribution. Training standardizes ref and hist in every group, then
//! repeatedly rotates both with a random orthogonal matrix and
//! quantile-maps each rotated hist component onto the matching ref
//! component, recording the additive factors. Adjusting replays the same
//! rotations on the standardized simulation and finally reorders a base
//! scenario so that it follows the rank structure of the result.
//!
//! ```text
//! for each iteration i:
//!     y = R_i x           rotate
//!     y_v += af_q[i, v]   at the rank of each component
//!     x = R_iᵀ y          rotate back
//! scen = reorder(base scen, ranks of x)
//! ```

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView2, ArrayView3, Axis, Ix2, Ix3, Ix4, s};
use rand::Rng;
use rand_distr::StandardNormal;
use sdba_group::{Kind, get_correction};
use sdba_stats::{
    Extrapolation, Interp, interp_on_quantiles_1d, nanquantile, rank_pct, reorder_by_rank,
    standardize,
};
use tracing::{debug, warn};

use crate::block::{BlockSpec, map_groups};
use crate::config::{NpdfConfig, QuantileConfig};
use crate::dataset::{DataArray, Dataset, Dim};
use crate::eqm::{self, QuantileParams};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};
use crate::rng::make_rng;

/// Draws `n_iter` Haar-distributed `n x n` orthogonal matrices, shape
/// `(iteration, row, col)`.
///
/// Each matrix is the Q factor of a standard normal matrix, its columns
/// flipped so that the diagonal of R is positive.
pub fn random_rotations<R: Rng + ?Sized>(n_iter: usize, n: usize, rng: &mut R) -> Array3<f64> {
    let mut out = Array3::zeros((n_iter, n, n));
    for i in 0..n_iter {
        let gaussian = DMatrix::<f64>::from_fn(n, n, |_, _| rng.sample(StandardNormal));
        let qr = gaussian.qr();
        let (q, r) = (qr.q(), qr.r());
        for col in 0..n {
            let sign = if r[(col, col)] < 0.0 { -1.0 } else { 1.0 };
            for row in 0..n {
                out[[i, row, col]] = sign * q[(row, col)];
            }
        }
    }
    out
}

/// Trained NpdfT parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NpdfParams {
    config: NpdfConfig,
    af_q: Array4<f64>,
    rotations: Array3<f64>,
    base: QuantileParams,
}

impl NpdfParams {
    /// Configuration used for training.
    pub fn config(&self) -> &NpdfConfig {
        &self.config
    }

    /// Additive factors in standardized rotated space, shape
    /// `(group, iteration, variable, quantile)`.
    pub fn af_q(&self) -> &Array4<f64> {
        &self.af_q
    }

    /// Rotation matrices, shape `(iteration, row, col)`.
    pub fn rotations(&self) -> &Array3<f64> {
        &self.rotations
    }

    /// Per-variable quantile mapping producing the default base scenario.
    pub fn base(&self) -> &QuantileParams {
        &self.base
    }

    /// Trained values as a dataset: `af_q`, `rotations`, and the base
    /// mapping as `base_af` and `base_hist_q`.
    pub fn to_dataset(&self) -> Dataset {
        let mut base = self.base.to_dataset();
        let mut ds = Dataset::new()
            .with(
                "af_q",
                DataArray::from_parts(
                    vec![Dim::Group, Dim::Iteration, Dim::Location, Dim::Quantile],
                    self.af_q.clone().into_dyn(),
                ),
            )
            .with(
                "rotations",
                DataArray::from_parts(
                    vec![Dim::Iteration, Dim::Row, Dim::Col],
                    self.rotations.clone().into_dyn(),
                ),
            );
        for name in ["af", "hist_q"] {
            if let Ok(array) = base.take(name) {
                ds.insert(format!("base_{name}"), array);
            }
        }
        ds
    }
}

/// Indices of the sample slots where every variable is valid.
fn complete_columns(x: &ArrayView2<'_, f64>) -> Vec<usize> {
    (0..x.ncols())
        .filter(|&c| x.column(c).iter().all(|v| !v.is_nan()))
        .collect()
}

/// `(variable, column)` matrix of the complete columns, each variable
/// standardized.
fn standardized(x: &ArrayView2<'_, f64>, cols: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), cols.len()));
    for (v, row) in x.rows().into_iter().enumerate() {
        let picked: Vec<f64> = cols.iter().map(|&c| row[c]).collect();
        let (z, _, _) = standardize(&picked);
        out.row_mut(v).assign(&Array1::from(z));
    }
    out
}

/// Adds to row `v` of `y` the factor of each value's rank.
fn shift_by_rank(
    y: &mut Array2<f64>,
    v: usize,
    quantiles: &[f64],
    af: &[f64],
    interp: Interp,
    extrap: Extrapolation,
) {
    let ranks = rank_pct(&y.row(v).to_vec());
    let delta = interp_on_quantiles_1d(&ranks, quantiles, af, interp, extrap);
    y.row_mut(v)
        .iter_mut()
        .zip(delta)
        .for_each(|(value, d)| *value += d);
}

/// Sequential sweep of one group: returns `(iteration, variable, quantile)`
/// factors.
fn train_group(
    reference: Array2<f64>,
    mut hist: Array2<f64>,
    rotations: ArrayView3<'_, f64>,
    config: &NpdfConfig,
) -> Array3<f64> {
    let quantiles = config.quantiles();
    let n_var = reference.nrows();
    let n_iter = rotations.len_of(Axis(0));
    let mut af_q = Array3::from_elem((n_iter, n_var, quantiles.len()), f64::NAN);

    for (i, rot) in rotations.outer_iter().enumerate() {
        let ref_rot = rot.dot(&reference);
        let mut hist_rot = rot.dot(&hist);
        for v in 0..n_var {
            let ref_q = nanquantile(&ref_rot.row(v).to_vec(), quantiles);
            let hist_q = nanquantile(&hist_rot.row(v).to_vec(), quantiles);
            let af = get_correction(&hist_q, &ref_q, Kind::Additive);
            shift_by_rank(&mut hist_rot, v, quantiles, &af, config.interp(), config.extrapolation());
            af_q.slice_mut(s![i, v, ..]).assign(&Array1::from(af));
        }
        hist = rot.t().dot(&hist_rot);
    }
    af_q
}

/// Trains NpdfT: the rotation sweep in every group, plus a per-variable EQM
/// used as the default base scenario.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration and
/// propagates block-execution contract errors.
#[tracing::instrument(skip_all, fields(n_var = input.n_loc(), n_iter = config.n_iter()))]
pub fn train(input: &TrainInput, config: &NpdfConfig) -> Result<NpdfParams, AdjustError> {
    config.validate()?;
    let n_var = input.n_loc();
    let rotations = random_rotations(config.n_iter(), n_var, &mut make_rng(config.seed()));

    let base_config = QuantileConfig::new()
        .with_group(config.group())
        .with_kind(config.base_kind())
        .with_quantiles(config.quantiles().to_vec())
        .with_interp(config.interp())
        .with_extrapolation(config.extrapolation());
    let base = eqm::train(input, &base_config)?;

    let ds = Dataset::new()
        .with("ref", DataArray::from_series(input.reference()))
        .with("hist", DataArray::from_series(input.hist()));
    let spec = BlockSpec::new().output(
        "af_q",
        &[Dim::Group, Dim::Iteration, Dim::Location, Dim::Quantile],
    );
    let mut out = map_groups(&ds, input.reference().time(), config.group(), &spec, |block| {
        let reference = block.data().view::<Ix2>("ref", &[Dim::Location, Dim::Sample])?;
        let hist = block.data().view::<Ix2>("hist", &[Dim::Location, Dim::Sample])?;
        let (ref_cols, hist_cols) = (complete_columns(&reference), complete_columns(&hist));
        let af_q = if ref_cols.is_empty() || hist_cols.is_empty() {
            warn!(group = block.group(), "empty group, factors are NaN");
            Array3::from_elem((config.n_iter(), n_var, config.quantiles().len()), f64::NAN)
        } else {
            train_group(
                standardized(&reference, &ref_cols),
                standardized(&hist, &hist_cols),
                rotations.view(),
                config,
            )
        };
        Ok(Dataset::new().with(
            "af_q",
            DataArray::new(&[Dim::Iteration, Dim::Location, Dim::Quantile], af_q)?,
        ))
    })?;

    let af_q = out.take_as::<Ix4>(
        "af_q",
        &[Dim::Group, Dim::Iteration, Dim::Location, Dim::Quantile],
    )?;
    debug!(shape = ?af_q.dim(), "npdf factors trained");
    Ok(NpdfParams {
        config: config.clone(),
        af_q,
        rotations,
        base,
    })
}

/// Adjusts `input.sim`.
///
/// The base scenario is `input.scen` when supplied, the base EQM applied to
/// sim otherwise. Within every group the base scenario is reordered to the
/// ranks of the transformed simulation; slots where a variable of sim is
/// missing keep their base value.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of variables.
#[tracing::instrument(skip_all, fields(n_var = input.sim().n_loc()))]
pub fn adjust(params: &NpdfParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let n_var = params.rotations.len_of(Axis(1));
    if sim.n_loc() != n_var {
        return Err(AdjustError::shape(
            "sim",
            format!("{} variables, trained on {n_var}", sim.n_loc()),
        ));
    }
    let base = match input.scen() {
        Some(scen) => scen.clone(),
        None => eqm::map_quantiles(&params.base, sim)?,
    };

    let config = &params.config;
    let quantiles = config.quantiles();
    let ds = Dataset::new()
        .with("sim", DataArray::from_series(sim))
        .with("scen", DataArray::from_series(&base))
        .with(
            "af_q",
            DataArray::from_parts(
                vec![Dim::Group, Dim::Iteration, Dim::Location, Dim::Quantile],
                params.af_q.clone().into_dyn(),
            ),
        );
    let spec = BlockSpec::new().output("scen", &[Dim::Location, Dim::Time]);

    let mut out = map_groups(&ds, sim.time(), config.group(), &spec, |block| {
        let x = block.data().view::<Ix2>("sim", &[Dim::Location, Dim::Sample])?;
        let scen = block.data().view::<Ix2>("scen", &[Dim::Location, Dim::Sample])?;
        let af_q = block
            .data()
            .view::<Ix3>("af_q", &[Dim::Iteration, Dim::Location, Dim::Quantile])?;

        let cols = complete_columns(&x);
        let mut z = standardized(&x, &cols);
        for (i, rot) in params.rotations.outer_iter().enumerate() {
            let mut y = rot.dot(&z);
            for v in 0..n_var {
                let af = af_q.slice(s![i, v, ..]).to_vec();
                shift_by_rank(&mut y, v, quantiles, &af, config.interp(), config.extrapolation());
            }
            z = rot.t().dot(&y);
        }

        let mut reordered = scen.to_owned();
        for v in 0..n_var {
            let mut order = vec![f64::NAN; x.ncols()];
            for (k, &c) in cols.iter().enumerate() {
                order[c] = z[[v, k]];
            }
            let shuffled = reorder_by_rank(&scen.row(v).to_vec(), &order);
            for (slot, value) in shuffled.into_iter().enumerate() {
                if !value.is_nan() {
                    reordered[[v, slot]] = value;
                }
            }
        }
        Ok(Dataset::new().with("scen", DataArray::new(&[Dim::Location, Dim::Sample], reordered)?))
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
    use sdba_group::{Series, TimeAxis};
    use sdba_stats::rank_average;

    fn axis(start_year: i32, n: usize) -> TimeAxis {
        TimeAxis::daily(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), n)
    }

    fn normals(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.sample(StandardNormal)).collect()
    }

    fn spearman(a: &[f64], b: &[f64]) -> f64 {
        let (ra, rb) = (rank_average(a), rank_average(b));
        let n = ra.len() as f64;
        let (ma, mb) = (ra.iter().sum::<f64>() / n, rb.iter().sum::<f64>() / n);
        let cov: f64 = ra.iter().zip(&rb).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = ra.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = rb.iter().map(|y| (y - mb).powi(2)).sum();
        cov / (va * vb).sqrt()
    }

    fn correlated_input(n: usize) -> (TrainInput, Series) {
        let mut rng = StdRng::seed_from_u64(99);
        let z1 = normals(&mut rng, n);
        let z2 = normals(&mut rng, n);
        let corr: Vec<f64> = z1.iter().zip(&z2).map(|(a, b)| 0.9 * a + 0.436 * b).collect();
        let reference = Series::from_rows(axis(1990, n), &[z1, corr]).unwrap();
        let hist_rows = [normals(&mut rng, n), normals(&mut rng, n)];
        let hist = Series::from_rows(axis(1990, n), &hist_rows).unwrap();
        let sim_rows = [normals(&mut rng, n), normals(&mut rng, n)];
        let sim = Series::from_rows(axis(2050, n), &sim_rows).unwrap();
        (TrainInput::new(reference, hist).unwrap(), sim)
    }

    #[test]
    fn rotations_are_orthogonal() {
        let rots = random_rotations(5, 3, &mut StdRng::seed_from_u64(1));
        for rot in rots.outer_iter() {
            let prod = rot.dot(&rot.t());
            for ((i, j), v) in prod.indexed_iter() {
                assert_relative_eq!(*v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-10);
            }
        }
        assert_eq!(rots, random_rotations(5, 3, &mut StdRng::seed_from_u64(1)));
    }

    #[test]
    fn dependence_is_transferred() {
        let n = 1500;
        let (input, sim) = correlated_input(n);
        let config = NpdfConfig::new().with_seed(5);
        let params = train(&input, &config).unwrap();
        assert_eq!(params.af_q().dim(), (1, 20, 2, 22));

        let out = adjust(&params, &AdjustInput::new(sim.clone())).unwrap();
        let scen = out.scen();
        assert!(spearman(&sim.row(0), &sim.row(1)).abs() < 0.1);
        let rho = spearman(&scen.row(0), &scen.row(1));
        assert!(rho > 0.5, "rank correlation {rho}");
    }

    #[test]
    fn supplied_scenario_is_only_reordered() {
        let n = 400;
        let (input, sim) = correlated_input(n);
        let params = train(&input, &NpdfConfig::new().with_n_iter(5).with_seed(2)).unwrap();
        let base = sim.map(|v| 10.0 + 2.0 * v);
        let out = adjust(&params, &AdjustInput::new(sim).with_scen(base.clone()).unwrap()).unwrap();
        for v in 0..2 {
            let mut expected = base.row(v);
            let mut got = out.scen().row(v);
            expected.sort_by(f64::total_cmp);
            got.sort_by(f64::total_cmp);
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn seeded_training_is_reproducible() {
        let (input, _) = correlated_input(200);
        let config = NpdfConfig::new().with_n_iter(3).with_seed(8);
        assert_eq!(train(&input, &config).unwrap(), train(&input, &config).unwrap());
    }

    #[test]
    fn wrong_variable_count() {
        let (input, _) = correlated_input(100);
        let params = train(&input, &NpdfConfig::new().with_n_iter(2).with_seed(1)).unwrap();
        let sim = Series::from_vec(axis(2050, 100), vec![0.0; 100]).unwrap();
        assert!(matches!(
            adjust(&params, &AdjustInput::new(sim)),
            Err(AdjustError::ShapeContract { .. })
        ));
    }

    #[test]
    fn dataset_names() {
        let (input, _) = correlated_input(50);
        let params = train(&input, &NpdfConfig::new().with_n_iter(2).with_seed(1)).unwrap();
        let names: Vec<String> = params.to_dataset().names().map(String::from).collect();
        assert_eq!(names, vec!["af_q", "base_af", "base_hist_q", "rotations"]);
    }
}
