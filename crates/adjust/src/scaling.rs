//! Scaling: one correction factor per group between the mean of hist and
//! the mean of ref.

use ndarray::{Array1, Array2, Ix2};
use sdba_group::broadcast;
use sdba_stats::{Interp, nanmean};
use tracing::warn;

use crate::block::{BlockSpec, map_blocks, map_groups};
use crate::config::ScalingConfig;
use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;
use crate::input::{AdjustInput, Adjusted, TrainInput};

/// Trained scaling factors.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingParams {
    config: ScalingConfig,
    af: Array2<f64>,
}

impl ScalingParams {
    /// Configuration used for training.
    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Factors, shape `(group, location)`.
    pub fn af(&self) -> &Array2<f64> {
        &self.af
    }

    /// Trained values as a dataset: `af` over `[Group, Location]`.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::new().with(
            "af",
            DataArray::from_parts(vec![Dim::Group, Dim::Location], self.af.clone().into_dyn()),
        )
    }
}

/// Computes `af = mean(ref) (-|/) mean(hist)` for every group and location.
///
/// Groups without a valid hist or ref value get a NaN factor.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for an invalid configuration and
/// propagates block-execution contract errors.
#[tracing::instrument(skip_all, fields(n_loc = input.n_loc(), group = %config.group().prop().name()))]
pub fn train(input: &TrainInput, config: &ScalingConfig) -> Result<ScalingParams, AdjustError> {
    config.validate()?;
    let time = input.reference().time();
    let ds = Dataset::new()
        .with("ref", DataArray::from_series(input.reference()))
        .with("hist", DataArray::from_series(input.hist()));
    let spec = BlockSpec::new().output("af", &[Dim::Group, Dim::Location]);
    let kind = config.kind();

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        map_groups(chunk, time, config.group(), &spec, |block| {
            let reference = block.data().view::<Ix2>("ref", &[Dim::Location, Dim::Sample])?;
            let hist = block.data().view::<Ix2>("hist", &[Dim::Location, Dim::Sample])?;
            if hist.iter().all(|v| v.is_nan()) {
                warn!(group = block.group(), "empty group, scaling factor is NaN");
            }
            let af: Array1<f64> = reference
                .rows()
                .into_iter()
                .zip(hist.rows())
                .map(|(r, h)| kind.get(nanmean(&h.to_vec()), nanmean(&r.to_vec())))
                .collect();
            Ok(Dataset::new().with("af", DataArray::new(&[Dim::Location], af)?))
        })
    })?;

    let af = out.take_as::<Ix2>("af", &[Dim::Group, Dim::Location])?;
    Ok(ScalingParams {
        config: config.clone(),
        af,
    })
}

/// Applies the trained factors to `input.sim`.
///
/// With [`Interp::Linear`] the factors of neighbouring groups are blended.
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if sim does not have the trained
/// number of locations.
#[tracing::instrument(skip_all, fields(n_loc = input.sim().n_loc()))]
pub fn adjust(params: &ScalingParams, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
    let sim = input.sim();
    let config = &params.config;
    let ds = Dataset::new()
        .with("sim", DataArray::from_series(sim))
        .with("af", params.to_dataset().take("af")?);
    let spec = BlockSpec::new().output("scen", &[Dim::Location, Dim::Time]);
    let smooth = config.interp() == Interp::Linear;

    let mut out = map_blocks(&ds, &spec, config.chunk_size(), |_, chunk| {
        let values = chunk.view::<Ix2>("sim", &[Dim::Location, Dim::Time])?;
        let af = chunk.view::<Ix2>("af", &[Dim::Group, Dim::Location])?;
        let factor = broadcast(af.t(), sim.time(), &config.group(), smooth)?;
        let mut scen = values.to_owned();
        scen.zip_mut_with(&factor, |v, &f| *v = config.kind().apply(*v, f));
        Ok(Dataset::new().with("scen", DataArray::new(&[Dim::Location, Dim::Time], scen)?))
    })?;

    let scen = out.take_as::<Ix2>("scen", &[Dim::Location, Dim::Time])?;
    Ok(Adjusted::new(sim.with_values(scen)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use sdba_group::{GroupProp, Grouper, Kind, Series, TimeAxis};

    fn series(start: (i32, u32, u32), rows: &[Vec<f64>]) -> Series {
        let (y, m, d) = start;
        let time = TimeAxis::daily(NaiveDate::from_ymd_opt(y, m, d).unwrap(), rows[0].len());
        Series::from_rows(time, rows).unwrap()
    }

    #[test]
    fn multiplicative_factor_doubles() {
        let reference = series((2000, 1, 1), &[vec![3.0, 4.0, 5.0]]);
        let hist = series((2000, 1, 1), &[vec![1.0, 2.0, 3.0]]);
        let config = ScalingConfig::new().with_kind(Kind::Multiplicative);
        let params = train(&TrainInput::new(reference, hist).unwrap(), &config).unwrap();
        assert_relative_eq!(params.af()[[0, 0]], 2.0);

        let sim = series((2050, 1, 1), &[vec![1.0, 2.0, 3.0]]);
        let out = adjust(&params, &AdjustInput::new(sim)).unwrap();
        assert_eq!(out.scen().row(0), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn monthly_additive_factors() {
        let time = TimeAxis::daily(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(), 365);
        let months: Vec<usize> = time.dates().iter().map(|d| GroupProp::Month.label(*d)).collect();
        let hist: Vec<f64> = months.iter().map(|&m| m as f64).collect();
        let reference: Vec<f64> = months.iter().map(|&m| 2.0 * m as f64).collect();
        let input = TrainInput::new(
            Series::from_vec(time.clone(), reference).unwrap(),
            Series::from_vec(time.clone(), hist.clone()).unwrap(),
        )
        .unwrap();
        let config = ScalingConfig::new().with_group(Grouper::plain(GroupProp::Month));
        let params = train(&input, &config).unwrap();
        for m in 0..12 {
            assert_relative_eq!(params.af()[[m, 0]], m as f64);
        }
        let out = adjust(&params, &AdjustInput::new(Series::from_vec(time, hist).unwrap())).unwrap();
        for (t, &m) in months.iter().enumerate() {
            assert_relative_eq!(out.scen().values()[[0, t]], 2.0 * m as f64);
        }
    }

    #[test]
    fn chunking_does_not_change_factors() {
        let rows: Vec<Vec<f64>> = (0..5).map(|l| vec![l as f64, 1.0 + l as f64, 2.0]).collect();
        let shifted: Vec<Vec<f64>> = rows.iter().map(|r| r.iter().map(|v| v + 1.5).collect()).collect();
        let input = TrainInput::new(series((2000, 1, 1), &shifted), series((2000, 1, 1), &rows)).unwrap();
        let whole = train(&input, &ScalingConfig::new()).unwrap();
        let chunked = train(&input, &ScalingConfig::new().with_chunk_size(2)).unwrap();
        assert_eq!(whole.af(), chunked.af());
        assert!(whole.af().iter().all(|&f| (f - 1.5).abs() < 1e-12));
    }

    #[test]
    fn location_mismatch_on_adjust() {
        let input = TrainInput::new(
            series((2000, 1, 1), &[vec![1.0, 2.0]]),
            series((2000, 1, 1), &[vec![1.0, 2.0]]),
        )
        .unwrap();
        let params = train(&input, &ScalingConfig::new()).unwrap();
        let sim = series((2000, 1, 1), &[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(adjust(&params, &AdjustInput::new(sim)).is_err());
    }
}
