//! Detrended quantile mapping (DQM).
//!
//! Quantiles are trained on ref and hist normalized by their group means,
//! together with the factor between those means. The simulation is scaled
//! by that factor, its polynomial trend removed, the residual
//! quantile-mapped and the trend put back, so the simulated trend survives
//! the adjustment.

use ndarray::{Array2, Ix2};
use sdba_group::{GroupProp, broadcast};
use sdba_stats::Interp;

use crate::block::{BlockSpec, map_blocks};
use crate::config::DqmConfig;
use crate::dataset::{DataArray, Dataset, Dim};
use crate::detrend::PolyDetrend;
use crate::eqm::{QuantileParams, map_quantiles, train_quantiles};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};

/// Trained DQM parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DqmParams {
    config: DqmConfig,
    quantile: QuantileParams,
    scaling: Array2<f64>,
}

impl DqmParams {
    /// Configuration used for training.
    pub fn config(&self) -> &DqmConfig {
        &self.config
    }

    /// Quantile factors of the normalized series.
    pub fn quantile(&self) -> &QuantileParams {
        &self.quantile
    }

    /// Mean factors, shape `(group, location)`.
    pub fn scaling(&self) -> &Array2<f64> {
        &self.scaling
    }

    /// Trained values as a dataset: the quantile variables plus `scaling`
    /// over `[Group, Location]`.
    pub fn to_dataset(&self) -> Dataset {
        self.quantile.to_dataset().with(
            "scaling",
            DataArray::from_parts(
                vec![Dim::Group, Dim::Location],
                self.scaling.clone().into_dyn(),
            ),
        )
    }
}

/// Trains DQM factors.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration and
/// propagates block-execution contract errors.
#[tracing::instrument(skip_all, fields(n_loc = input.n_loc(), degree = config.detrend_degree()))]
pub fn train(input: &TrainInput, config: &DqmConfig) -> Result<DqmParams, AdjustError> {
    config.validate()?;
    let trained = train_quantiles(input, config.quantile(), true)?;
    let scaling = trained
        .scaling
        .ok_or_else(|| AdjustError::shape("scaling", "normalized training returned no scaling"))?;
    Ok(DqmParams {
        config: config.clone(),
        quantile: trained.params,
        scaling,
    })
}

/// Adjusts `input.sim`: scale, detrend, quantile-map, retrend.
///
/// The returned [`Adjusted::trend`] is the trend fitted on the scaled
/// simulation.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &DqmParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let qconfig = params.config.quantile();
    let group = qconfig.group();
    let kind = qconfig.kind();
    // day-of-year factors are too close to blend
    let smooth = qconfig.interp() == Interp::Linear && group.prop() != GroupProp::DayOfYear;

    let ds = Dataset::new()
        .with("sim", DataArray::from_series(sim))
        .with(
            "scaling",
            DataArray::from_parts(
                vec![Dim::Group, Dim::Location],
                params.scaling.clone().into_dyn(),
            ),
        );
    let spec = BlockSpec::new().output("scaled", &[Dim::Location, Dim::Time]);
    let mut out = map_blocks(&ds, &spec, qconfig.chunk_size(), |_, chunk| {
        let values = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
        let scaling = chunk.view::<Ix2>("scaling", &[Dim::Group, Dim::Location])?;
        let factor = broadcast(scaling.t(), sim.time(), &group, smooth)?;
        let mut scaled = values.to_owned();
        scaled.zip_mut_with(&factor, |v, &f| *v = kind.apply(*v, f));
        Ok(Dataset::new().with("scaled", DataArray::new(&[Dim::Location, Dim::Time], scaled)?))
    })?;
    let scaled = sim.with_values(out.take_as::<Ix2>("scaled", &[Dim::Location, Dim::Time])?)?;

    let fitted = PolyDetrend::new(params.config.detrend_degree())
        .with_kind(kind)
        .with_group(group)
        .with_preserve_mean(params.config.preserve_mean())
        .fit(&scaled)?;
    let residual = fitted.detrend(&scaled)?;
    let mapped = map_quantiles(&params.quantile, &residual)?;
    let scen = fitted.retrend(&mapped)?;
    Ok(Adjusted::new(scen).with_trend(fitted.into_series()))
}
