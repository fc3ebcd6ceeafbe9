//! Quantile delta mapping (QDM).
//!
//! Training is the EQM training. Adjusting ranks each simulated value within
//! its own group and applies the factor found at that rank on the quantile
//! grid, so the change between hist and sim quantiles is preserved.

use ndarray::{Array1, Array2, Array3, Ix2, Ix3};
use sdba_stats::rank_pct;

use crate::block::{BlockSpec, map_blocks, map_groups};
use crate::dataset::{DataArray, Dataset, Dim};
use crate::eqm::QuantileParams;
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted};
use crate::quantile::interp_on_quantiles;

/// Adjusts `input.sim` with EQM-trained factors.
///
/// The percentile ranks of sim (0 for the smallest value of a group, 1 for
/// the largest) are returned as [`Adjusted::sim_q`].
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &QuantileParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let config = params.config();
    let time = sim.time();
    let group = config.group();
    let kind = config.kind();
    let dims = vec![Dim::Group, Dim::Location, Dim::Quantile];

    let ds = Dataset::new()
        .with("sim", DataArray::from_series(sim))
        .with("af", DataArray::from_parts(dims.clone(), params.af().clone().into_dyn()));
    let spec = BlockSpec::new()
        .output("scen", &[Dim::Location, Dim::Time])
        .output("sim_q", &[Dim::Location, Dim::Time]);
    let rank_spec = BlockSpec::new().output("sim_q", &[Dim::Location, Dim::Time]);
    let quantiles = Array1::from(config.quantiles().to_vec());

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        let values = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
        let af = chunk.view::<Ix3>("af", &dims)?;
        let ranked = map_groups(chunk, time, group.main_only(), &rank_spec, |block| {
            let x = block.data().view::<Ix2>("sim", &[Dim::Location, Dim::Sample])?;
            let mut q = Array2::from_elem(x.dim(), f64::NAN);
            for (l, row) in x.rows().into_iter().enumerate() {
                q.row_mut(l).assign(&Array1::from(rank_pct(&row.to_vec())));
            }
            Ok(Dataset::new().with("sim_q", DataArray::new(&[Dim::Location, Dim::Sample], q)?))
        })?;
        let sim_q = ranked.view::<Ix2>("sim_q", &[Dim::Location, Dim::Time])?;

        let grid: Array3<f64> = quantiles
            .broadcast(af.dim())
            .ok_or_else(|| AdjustError::shape("quantiles", "cannot broadcast onto af"))?
            .to_owned();
        let factor = interp_on_quantiles(
            sim_q,
            grid.view(),
            af,
            time,
            &group,
            config.interp(),
            config.extrapolation(),
        )?;
        let mut scen = values.to_owned();
        scen.zip_mut_with(&factor, |v, &f| *v = kind.apply(*v, f));
        Ok(Dataset::new()
            .with("scen", DataArray::new(&[Dim::Location, Dim::Time], scen)?)
            .with("sim_q", DataArray::new(&[Dim::Location, Dim::Time], sim_q.to_owned())?))
    })?;

    let scen = out.take_as::<Ix2>("scen", &[Dim::Location, Dim::Time])?;
    let sim_q = out.take_as::<Ix2>("sim_q", &[Dim::Location, Dim::Time])?;
    Ok(Adjusted::new(sim.with_values(scen)?).with_sim_q(sim.with_values(sim_q)?))
}
