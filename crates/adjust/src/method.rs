//! The closed set of adjustment methods.

use std::fmt;

use crate::config::{DqmConfig, ExtremeConfig, LociConfig, NpdfConfig, QuantileConfig, ScalingConfig};
use crate::dataset::Dataset;
use crate::dqm::DqmParams;
use crate::eqm::QuantileParams;
use crate::error::AdjustError;
use crate::extremes::ExtremeParams;
use crate::input::{AdjustInput, Adjusted, TrainInput};
use crate::loci::LociParams;
use crate::npdf::NpdfParams;
use crate::scaling::ScalingParams;
use crate::{dqm, eqm, extremes, loci, npdf, qdm, scaling};

/// An adjustment method with its configuration.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use sdba_adjust::{AdjustInput, Adjustment, ScalingConfig, TrainInput};
/// use sdba_group::{Kind, Series, TimeAxis};
///
/// let time = TimeAxis::daily(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 3);
/// let reference = Series::from_vec(time.clone(), vec![3.0, 4.0, 5.0]).unwrap();
/// let hist = Series::from_vec(time.clone(), vec![1.0, 2.0, 3.0]).unwrap();
///
/// let method = Adjustment::Scaling(ScalingConfig::new().with_kind(Kind::Multiplicative));
/// let trained = method.train(&TrainInput::new(reference, hist).unwrap()).unwrap();
/// let sim = Series::from_vec(time, vec![1.0, 2.0, 3.0]).unwrap();
/// let out = trained.adjust(&AdjustInput::new(sim)).unwrap();
/// assert_eq!(out.scen().row(0), vec![2.0, 4.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    /// Per-group mean scaling.
    Scaling(ScalingConfig),
    /// Empirical quantile mapping.
    Eqm(QuantileConfig),
    /// Detrended quantile mapping.
    Dqm(DqmConfig),
    /// Quantile delta mapping.
    Qdm(QuantileConfig),
    /// Local intensity scaling.
    Loci(LociConfig),
    /// N-dimensional probability density function transform.
    NpdfT(NpdfConfig),
    /// Extreme-value adjustment.
    ExtremeValues(ExtremeConfig),
}

impl Adjustment {
    /// Short method name.
    pub fn name(&self) -> &'static str {
        match self {
            Adjustment::Scaling(_) => "scaling",
            Adjustment::Eqm(_) => "eqm",
            Adjustment::Dqm(_) => "dqm",
            Adjustment::Qdm(_) => "qdm",
            Adjustment::Loci(_) => "loci",
            Adjustment::NpdfT(_) => "npdft",
            Adjustment::ExtremeValues(_) => "extremes",
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), AdjustError> {
        match self {
            Adjustment::Scaling(c) => c.validate(),
            Adjustment::Eqm(c) | Adjustment::Qdm(c) => c.validate(),
            Adjustment::Dqm(c) => c.validate(),
            Adjustment::Loci(c) => c.validate(),
            Adjustment::NpdfT(c) => c.validate(),
            Adjustment::ExtremeValues(c) => c.validate(),
        }
    }

    /// Trains the method on `input`.
    ///
    /// # Errors
    ///
    /// Propagates the configuration, contract and fitting errors of the
    /// method.
    #[tracing::instrument(skip_all, fields(method = self.name()))]
    pub fn train(&self, input: &TrainInput) -> Result<Trained, AdjustError> {
        Ok(match self {
            Adjustment::Scaling(c) => Trained::Scaling(scaling::train(input, c)?),
            Adjustment::Eqm(c) => Trained::Eqm(eqm::train(input, c)?),
            Adjustment::Dqm(c) => Trained::Dqm(dqm::train(input, c)?),
            Adjustment::Qdm(c) => Trained::Qdm(eqm::train(input, c)?),
            Adjustment::Loci(c) => Trained::Loci(loci::train(input, c)?),
            Adjustment::NpdfT(c) => Trained::NpdfT(npdf::train(input, c)?),
            Adjustment::ExtremeValues(c) => Trained::ExtremeValues(extremes::train(input, c)?),
        })
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trained parameters of an [`Adjustment`].
///
/// Immutable once trained; adjust calls only borrow it and can run
/// concurrently.
#[derive(Debug, Clone, PartialEq)]
pub enum Trained {
    /// Scaling factors.
    Scaling(ScalingParams),
    /// EQM factors.
    Eqm(QuantileParams),
    /// DQM factors.
    Dqm(DqmParams),
    /// QDM factors (EQM-trained).
    Qdm(QuantileParams),
    /// LOCI factors.
    Loci(LociParams),
    /// NpdfT factors and rotations.
    NpdfT(NpdfParams),
    /// Extreme-value factors.
    ExtremeValues(ExtremeParams),
}

impl Trained {
    /// Short method name.
    pub fn name(&self) -> &'static str {
        match self {
            Trained::Scaling(_) => "scaling",
            Trained::Eqm(_) => "eqm",
            Trained::Dqm(_) => "dqm",
            Trained::Qdm(_) => "qdm",
            Trained::Loci(_) => "loci",
            Trained::NpdfT(_) => "npdft",
            Trained::ExtremeValues(_) => "extremes",
        }
    }

    /// Adjusts `input` with the trained parameters.
    ///
    /// # Errors
    ///
    /// Propagates the contract and fitting errors of the method.
    #[tracing::instrument(skip_all, fields(method = self.name()))]
    pub fn adjust(&self, input: &AdjustInput) -> Result<Adjusted, AdjustError> {
        match self {
            Trained::Scaling(p) => scaling::adjust(p, input),
            Trained::Eqm(p) => eqm::adjust(p, input),
            Trained::Dqm(p) => dqm::adjust(p, input),
            Trained::Qdm(p) => qdm::adjust(p, input),
            Trained::Loci(p) => loci::adjust(p, input),
            Trained::NpdfT(p) => npdf::adjust(p, input),
            Trained::ExtremeValues(p) => extremes::adjust(p, input),
        }
    }

    /// Trained values as a dataset with the method's declared variables.
    pub fn to_dataset(&self) -> Dataset {
        match self {
            Trained::Scaling(p) => p.to_dataset(),
            Trained::Eqm(p) | Trained::Qdm(p) => p.to_dataset(),
            Trained::Dqm(p) => p.to_dataset(),
            Trained::Loci(p) => p.to_dataset(),
            Trained::NpdfT(p) => p.to_dataset(),
            Trained::ExtremeValues(p) => p.to_dataset(),
        }
    }
}
