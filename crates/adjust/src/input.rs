//! Inputs and outputs of the two phases.

use sdba_group::Series;

use crate::error::AdjustError;

/// Training data: the reference and the historical simulation over the same
/// period.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainInput {
    reference: Series,
    hist: Series,
}

impl TrainInput {
    /// Pairs `reference` with `hist`.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::TimeMismatch`] if the time axes differ and
    /// [`AdjustError::ShapeContract`] if the location counts differ.
    pub fn new(reference: Series, hist: Series) -> Result<Self, AdjustError> {
        if reference.time() != hist.time() {
            return Err(AdjustError::TimeMismatch {
                left: "ref",
                right: "hist",
            });
        }
        if reference.n_loc() != hist.n_loc() {
            return Err(AdjustError::shape(
                "hist",
                format!(
                    "{} locations, ref has {}",
                    hist.n_loc(),
                    reference.n_loc()
                ),
            ));
        }
        Ok(Self { reference, hist })
    }

    /// Reference (observed) series.
    pub fn reference(&self) -> &Series {
        &self.reference
    }

    /// Historical simulation.
    pub fn hist(&self) -> &Series {
        &self.hist
    }

    /// Number of locations.
    pub fn n_loc(&self) -> usize {
        self.reference.n_loc()
    }
}

/// Adjustment data: the simulation to correct and, for methods that refine
/// an existing scenario, the base scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustInput {
    sim: Series,
    scen: Option<Series>,
}

impl AdjustInput {
    /// Input holding only `sim`.
    pub fn new(sim: Series) -> Self {
        Self { sim, scen: None }
    }

    /// Attaches a base scenario.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::TimeMismatch`] if `scen` is not on the time
    /// axis of sim and [`AdjustError::ShapeContract`] if its location count
    /// differs.
    pub fn with_scen(mut self, scen: Series) -> Result<Self, AdjustError> {
        if scen.time() != self.sim.time() {
            return Err(AdjustError::TimeMismatch {
                left: "scen",
                right: "sim",
            });
        }
        if scen.n_loc() != self.sim.n_loc() {
            return Err(AdjustError::shape(
                "scen",
                format!("{} locations, sim has {}", scen.n_loc(), self.sim.n_loc()),
            ));
        }
        self.scen = Some(scen);
        Ok(self)
    }

    /// Simulation to adjust.
    pub fn sim(&self) -> &Series {
        &self.sim
    }

    /// Base scenario, if supplied.
    pub fn scen(&self) -> Option<&Series> {
        self.scen.as_ref()
    }
}

/// Result of an adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjusted {
    scen: Series,
    trend: Option<Series>,
    sim_q: Option<Series>,
}

impl Adjusted {
    pub(crate) fn new(scen: Series) -> Self {
        Self {
            scen,
            trend: None,
            sim_q: None,
        }
    }

    pub(crate) fn with_trend(mut self, trend: Series) -> Self {
        self.trend = Some(trend);
        self
    }

    pub(crate) fn with_sim_q(mut self, sim_q: Series) -> Self {
        self.sim_q = Some(sim_q);
        self
    }

    /// The adjusted scenario.
    pub fn scen(&self) -> &Series {
        &self.scen
    }

    /// Consumes the result, returning the scenario.
    pub fn into_scen(self) -> Series {
        self.scen
    }

    /// Trend removed from the scaled simulation (DQM only).
    pub fn trend(&self) -> Option<&Series> {
        self.trend.as_ref()
    }

    /// Percentile ranks of the simulation within its group (QDM only).
    pub fn sim_q(&self) -> Option<&Series> {
        self.sim_q.as_ref()
    }
}
