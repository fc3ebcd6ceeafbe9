//! Local intensity scaling (LOCI).
//!
//! The hist threshold is the hist value whose non-exceedance probability
//! equals that of the reference threshold. The factor scales the mean
//! intensity above the hist threshold onto the mean intensity above the
//! reference threshold.

use ndarray::{Array1, Array2, Ix2};
use sdba_group::broadcast;
use sdba_stats::{Interp, map_cdf, nanmean};
use tracing::warn;

use crate::block::{BlockSpec, map_blocks, map_groups};
use crate::config::LociConfig;
use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};

/// Trained LOCI parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LociParams {
    config: LociConfig,
    af: Array2<f64>,
    hist_thresh: Array2<f64>,
}

impl LociParams {
    /// Configuration used for training.
    pub fn config(&self) -> &LociConfig {
        &self.config
    }

    /// Intensity factors, shape `(group, location)`.
    pub fn af(&self) -> &Array2<f64> {
        &self.af
    }

    /// Hist thresholds, shape `(group, location)`.
    pub fn hist_thresh(&self) -> &Array2<f64> {
        &self.hist_thresh
    }

    /// Trained values as a dataset: `af` and `hist_thresh` over
    /// `[Group, Location]`.
    pub fn to_dataset(&self) -> Dataset {
        let dims = vec![Dim::Group, Dim::Location];
        Dataset::new()
            .with("af", DataArray::from_parts(dims.clone(), self.af.clone().into_dyn()))
            .with(
                "hist_thresh",
                DataArray::from_parts(dims, self.hist_thresh.clone().into_dyn()),
            )
    }
}

/// Mean of the values at or above `thresh`; NaN if there are none.
fn mean_above(values: &[f64], thresh: f64) -> f64 {
    let above: Vec<f64> = values.iter().copied().filter(|&v| v >= thresh).collect();
    nanmean(&above)
}

/// Trains LOCI factors.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration and
/// propagates block-execution contract errors.
#[tracing::instrument(skip_all, fields(n_loc = input.n_loc(), thresh = config.thresh()))]
pub fn train(input: &TrainInput, config: &LociConfig) -> Result<LociParams, AdjustError> {
    config.validate()?;
    let time = input.reference().time();
    let thresh = config.thresh();
    let ds = Dataset::new()
        .with("ref", DataArray::from_series(input.reference()))
        .with("hist", DataArray::from_series(input.hist()));
    let spec = BlockSpec::new()
        .output("af", &[Dim::Group, Dim::Location])
        .output("hist_thresh", &[Dim::Group, Dim::Location]);

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        map_groups(chunk, time, config.group(), &spec, |block| {
            let reference = block.data().view::<Ix2>("ref", &[Dim::Location, Dim::Sample])?;
            let hist = block.data().view::<Ix2>("hist", &[Dim::Location, Dim::Sample])?;
            if hist.iter().all(|v| v.is_nan()) {
                warn!(group = block.group(), "empty group, intensity factor is NaN");
            }
            let n_loc = reference.nrows();
            let mut af = Array1::from_elem(n_loc, f64::NAN);
            let mut sth = Array1::from_elem(n_loc, f64::NAN);
            for l in 0..n_loc {
                let r = reference.row(l).to_vec();
                let h = hist.row(l).to_vec();
                let s = map_cdf(&h, &r, thresh);
                sth[l] = s;
                af[l] = (mean_above(&r, thresh) - thresh) / (mean_above(&h, s) - s);
            }
            Ok(Dataset::new()
                .with("af", DataArray::new(&[Dim::Location], af)?)
                .with("hist_thresh", DataArray::new(&[Dim::Location], sth)?))
        })
    })?;

    let af = out.take_as::<Ix2>("af", &[Dim::Group, Dim::Location])?;
    let hist_thresh = out.take_as::<Ix2>("hist_thresh", &[Dim::Group, Dim::Location])?;
    Ok(LociParams {
        config: config.clone(),
        af,
        hist_thresh,
    })
}

/// Adjusts `input.sim`: `max(0, af * (sim - hist_thresh) + thresh)`.
///
/// NaN in sim stays NaN.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &LociParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let config = &params.config;
    let thresh = config.thresh();
    let group = config.group();
    let smooth = config.interp() == Interp::Linear;

    let mut ds = params.to_dataset();
    ds.insert("sim", DataArray::from_series(sim));
    let spec = BlockSpec::new().output("scen", &[Dim::Location, Dim::Time]);

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        let values = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
        let af = chunk.view::<Ix2>("af", &[Dim::Group, Dim::Location])?;
        let sth = chunk.view::<Ix2>("hist_thresh", &[Dim::Group, Dim::Location])?;
        let factor = broadcast(af.t(), sim.time(), &group, smooth)?;
        let sth = broadcast(sth.t(), sim.time(), &group, smooth)?;

        let mut scen = values.to_owned();
        ndarray::Zip::from(&mut scen)
            .and(&factor)
            .and(&sth)
            .for_each(|v, &f, &s| {
                let x = f * (*v - s) + thresh;
                // f64::max would turn a NaN factor into 0
                *v = if x.is_nan() { f64::NAN } else { x.max(0.0) };
            });
        Ok(Dataset::new().with("scen", DataArray::new(&[Dim::Location, Dim::Time], scen)?))
    })?;

    let scen = out.take_as::<Ix2>("scen", &[Dim::Location, Dim::Time])?;
    Ok(Adjusted::new(sim.with_values(scen)?))
}
