//! Per-method configuration.
//!
//! Every method has a builder-style configuration with documented defaults.
//! Settings needed by the adjust phase (interpolation, extrapolation) are
//! part of the configuration and travel with the trained parameters.

use sdba_group::{Grouper, Kind};
use sdba_stats::{Extrapolation, Interp};

use crate::error::AdjustError;
use crate::quantile::equally_spaced_nodes;
use crate::tail::{TailDist, TailParams};

/// Default number of mid-point quantile nodes.
pub const DEFAULT_NQUANTILES: usize = 20;

/// End-node offset of the default quantile grid.
const DEFAULT_EPS: f64 = 1e-6;

fn default_quantiles() -> Vec<f64> {
    equally_spaced_nodes(DEFAULT_NQUANTILES, Some(DEFAULT_EPS))
}

fn validate_quantiles(quantiles: &[f64]) -> Result<(), AdjustError> {
    if quantiles.is_empty() {
        return Err(AdjustError::config("quantiles must not be empty"));
    }
    if quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
        return Err(AdjustError::config(format!(
            "quantiles must lie in [0, 1], got {quantiles:?}"
        )));
    }
    if quantiles.windows(2).any(|w| w[0] >= w[1]) {
        return Err(AdjustError::config("quantiles must be strictly increasing"));
    }
    Ok(())
}

fn validate_chunk(chunk_size: Option<usize>) -> Result<(), AdjustError> {
    if chunk_size == Some(0) {
        return Err(AdjustError::config("chunk_size must be >= 1"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

/// Configuration of the Scaling method.
///
/// ```
/// use sdba_adjust::ScalingConfig;
/// use sdba_group::{GroupProp, Grouper, Kind};
///
/// let config = ScalingConfig::new()
///     .with_group(Grouper::plain(GroupProp::Month))
///     .with_kind(Kind::Multiplicative);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingConfig {
    group: Grouper,
    kind: Kind,
    interp: Interp,
    chunk_size: Option<usize>,
}

impl ScalingConfig {
    /// Defaults: no grouping, `kind = Additive`, `interp = Nearest`, no
    /// chunking.
    pub fn new() -> Self {
        Self {
            group: Grouper::none(),
            kind: Kind::Additive,
            interp: Interp::Nearest,
            chunk_size: None,
        }
    }

    /// Sets the grouping.
    pub fn with_group(mut self, group: Grouper) -> Self {
        self.group = group;
        self
    }

    /// Sets the correction kind.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets how factors are broadcast between groups.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Runs on chunks of `n` locations.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Grouping.
    pub fn group(&self) -> Grouper {
        self.group
    }

    /// Correction kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Interpolation between groups.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Location chunk size, `None` for a single block.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), AdjustError> {
        validate_chunk(self.chunk_size)
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EQM / QDM
// ---------------------------------------------------------------------------

/// Configuration shared by empirical quantile mapping (EQM) and quantile
/// delta mapping (QDM).
///
/// ```
/// use sdba_adjust::QuantileConfig;
///
/// let config = QuantileConfig::new()
///     .with_nquantiles(50)
///     .with_adapt_freq_thresh(1.0)
///     .with_seed(7);
/// assert_eq!(config.quantiles().len(), 52);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileConfig {
    group: Grouper,
    kind: Kind,
    quantiles: Vec<f64>,
    adapt_freq_thresh: Option<f64>,
    interp: Interp,
    extrapolation: Extrapolation,
    seed: Option<u64>,
    chunk_size: Option<usize>,
}

impl QuantileConfig {
    /// Defaults: no grouping, `kind = Additive`, 20 equally spaced nodes
    /// plus `1e-6` and `1 - 1e-6`, no frequency adaptation,
    /// `interp = Nearest`, `extrapolation = Constant`, OS-seeded RNG, no
    /// chunking.
    pub fn new() -> Self {
        Self {
            group: Grouper::none(),
            kind: Kind::Additive,
            quantiles: default_quantiles(),
            adapt_freq_thresh: None,
            interp: Interp::Nearest,
            extrapolation: Extrapolation::Constant,
            seed: None,
            chunk_size: None,
        }
    }

    /// Sets the grouping.
    pub fn with_group(mut self, group: Grouper) -> Self {
        self.group = group;
        self
    }

    /// Sets the correction kind.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Uses `n` equally spaced nodes plus the default end nodes.
    pub fn with_nquantiles(mut self, n: usize) -> Self {
        self.quantiles = equally_spaced_nodes(n, Some(DEFAULT_EPS));
        self
    }

    /// Uses an explicit quantile grid.
    pub fn with_quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    /// Adapts the frequency of hist values under `thresh` before training.
    pub fn with_adapt_freq_thresh(mut self, thresh: f64) -> Self {
        self.adapt_freq_thresh = Some(thresh);
        self
    }

    /// Sets the interpolation of factors between quantiles and groups.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Sets the policy beyond the trained quantiles.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Seeds the frequency-adaptation draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Runs on chunks of `n` locations.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Grouping.
    pub fn group(&self) -> Grouper {
        self.group
    }

    /// Correction kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Quantile grid.
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Frequency-adaptation threshold, if any.
    pub fn adapt_freq_thresh(&self) -> Option<f64> {
        self.adapt_freq_thresh
    }

    /// Interpolation.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Extrapolation policy.
    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    /// RNG seed, if set.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Location chunk size, `None` for a single block.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Validates the quantile grid, the adaptation threshold and the chunk
    /// size.
    pub fn validate(&self) -> Result<(), AdjustError> {
        validate_quantiles(&self.quantiles)?;
        if let Some(t) = self.adapt_freq_thresh {
            if !t.is_finite() {
                return Err(AdjustError::config(format!(
                    "adapt_freq_thresh must be finite, got {t}"
                )));
            }
        }
        validate_chunk(self.chunk_size)
    }
}

impl Default for QuantileConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// DQM
// ---------------------------------------------------------------------------

/// Configuration of detrended quantile mapping (DQM): the quantile settings
/// plus the trend removed from the simulation before mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct DqmConfig {
    quantile: QuantileConfig,
    detrend_degree: usize,
    preserve_mean: bool,
}

impl DqmConfig {
    /// Defaults: [`QuantileConfig::new`], linear trend, mean not preserved.
    pub fn new() -> Self {
        Self {
            quantile: QuantileConfig::new(),
            detrend_degree: 1,
            preserve_mean: false,
        }
    }

    /// Replaces the quantile settings.
    pub fn with_quantile(mut self, quantile: QuantileConfig) -> Self {
        self.quantile = quantile;
        self
    }

    /// Sets the degree of the polynomial trend.
    pub fn with_detrend_degree(mut self, degree: usize) -> Self {
        self.detrend_degree = degree;
        self
    }

    /// Whether the trend removal keeps each group's mean.
    pub fn with_preserve_mean(mut self, preserve: bool) -> Self {
        self.preserve_mean = preserve;
        self
    }

    /// Quantile settings.
    pub fn quantile(&self) -> &QuantileConfig {
        &self.quantile
    }

    /// Polynomial trend degree.
    pub fn detrend_degree(&self) -> usize {
        self.detrend_degree
    }

    /// Whether the group mean is preserved by detrending.
    pub fn preserve_mean(&self) -> bool {
        self.preserve_mean
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), AdjustError> {
        self.quantile.validate()
    }
}

impl Default for DqmConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// LOCI
// ---------------------------------------------------------------------------

/// Configuration of local intensity scaling (LOCI).
///
/// The threshold has no default: it is the wet-day threshold in data units.
#[derive(Debug, Clone, PartialEq)]
pub struct LociConfig {
    thresh: f64,
    group: Grouper,
    interp: Interp,
    chunk_size: Option<usize>,
}

impl LociConfig {
    /// Threshold `thresh`; defaults: no grouping, `interp = Linear`, no
    /// chunking.
    pub fn new(thresh: f64) -> Self {
        Self {
            thresh,
            group: Grouper::none(),
            interp: Interp::Linear,
            chunk_size: None,
        }
    }

    /// Sets the grouping.
    pub fn with_group(mut self, group: Grouper) -> Self {
        self.group = group;
        self
    }

    /// Sets how factors are broadcast between groups.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Runs on chunks of `n` locations.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Reference threshold.
    pub fn thresh(&self) -> f64 {
        self.thresh
    }

    /// Grouping.
    pub fn group(&self) -> Grouper {
        self.group
    }

    /// Interpolation between groups.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Location chunk size, `None` for a single block.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), AdjustError> {
        if !self.thresh.is_finite() {
            return Err(AdjustError::config(format!(
                "thresh must be finite, got {}",
                self.thresh
            )));
        }
        validate_chunk(self.chunk_size)
    }
}

// ---------------------------------------------------------------------------
// NpdfT
// ---------------------------------------------------------------------------

/// Configuration of the N-dimensional probability density function
/// transform (NpdfT).
///
/// Locations of the input series are the variables of the multivariate
/// distribution, so NpdfT never chunks along them.
#[derive(Debug, Clone, PartialEq)]
pub struct NpdfConfig {
    n_iter: usize,
    group: Grouper,
    quantiles: Vec<f64>,
    interp: Interp,
    extrapolation: Extrapolation,
    base_kind: Kind,
    seed: Option<u64>,
}

impl NpdfConfig {
    /// Defaults: 20 iterations, no grouping, the default quantile grid,
    /// `interp = Nearest`, `extrapolation = Constant`, additive base
    /// quantile mapping, OS-seeded rotations.
    pub fn new() -> Self {
        Self {
            n_iter: 20,
            group: Grouper::none(),
            quantiles: default_quantiles(),
            interp: Interp::Nearest,
            extrapolation: Extrapolation::Constant,
            base_kind: Kind::Additive,
            seed: None,
        }
    }

    /// Sets the number of rotation iterations.
    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    /// Sets the grouping.
    pub fn with_group(mut self, group: Grouper) -> Self {
        self.group = group;
        self
    }

    /// Uses `n` equally spaced nodes plus the default end nodes.
    pub fn with_nquantiles(mut self, n: usize) -> Self {
        self.quantiles = equally_spaced_nodes(n, Some(DEFAULT_EPS));
        self
    }

    /// Uses an explicit quantile grid.
    pub fn with_quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    /// Sets the interpolation of factors between quantiles.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Sets the policy beyond the trained quantiles.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Sets the kind of the per-variable base quantile mapping.
    pub fn with_base_kind(mut self, kind: Kind) -> Self {
        self.base_kind = kind;
        self
    }

    /// Seeds the random rotations.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of iterations.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Grouping.
    pub fn group(&self) -> Grouper {
        self.group
    }

    /// Quantile grid.
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Interpolation.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Extrapolation policy.
    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    /// Kind of the base quantile mapping.
    pub fn base_kind(&self) -> Kind {
        self.base_kind
    }

    /// RNG seed, if set.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), AdjustError> {
        if self.n_iter == 0 {
            return Err(AdjustError::config("n_iter must be >= 1"));
        }
        validate_quantiles(&self.quantiles)
    }
}

impl Default for NpdfConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ExtremeValues
// ---------------------------------------------------------------------------

/// Configuration of the extreme-value adjustment.
///
/// Extremes are always computed over the whole series (no grouping).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeConfig {
    cluster_thresh: f64,
    q_thresh: f64,
    dist: TailDist,
    ref_params: Option<Vec<TailParams>>,
    frac: f64,
    power: f64,
    interp: Interp,
    extrapolation: Extrapolation,
    chunk_size: Option<usize>,
}

impl ExtremeConfig {
    /// Cluster threshold `cluster_thresh`; defaults: `q_thresh = 0.95`,
    /// generalized Pareto tails fitted on ref too, `frac = 0.25`,
    /// `power = 1`, `interp = Linear`, `extrapolation = Constant`, no
    /// chunking.
    pub fn new(cluster_thresh: f64) -> Self {
        Self {
            cluster_thresh,
            q_thresh: 0.95,
            dist: TailDist::GenPareto,
            ref_params: None,
            frac: 0.25,
            power: 1.0,
            interp: Interp::Linear,
            extrapolation: Extrapolation::Constant,
            chunk_size: None,
        }
    }

    /// Sets the quantile of the values above `cluster_thresh` that defines
    /// the extremes.
    pub fn with_q_thresh(mut self, q: f64) -> Self {
        self.q_thresh = q;
        self
    }

    /// Sets the tail distribution.
    pub fn with_dist(mut self, dist: TailDist) -> Self {
        self.dist = dist;
        self
    }

    /// Uses pre-fitted reference tails, one per location, instead of
    /// fitting them on ref.
    pub fn with_ref_params(mut self, params: Vec<TailParams>) -> Self {
        self.ref_params = Some(params);
        self
    }

    /// Sets the fraction of the range above the threshold over which the
    /// scenario transitions to the extreme adjustment.
    pub fn with_frac(mut self, frac: f64) -> Self {
        self.frac = frac;
        self
    }

    /// Sets the power of the transition.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Sets the interpolation of factors between probabilities.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Sets the policy beyond the trained probabilities.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Runs on chunks of `n` locations.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Cluster threshold.
    pub fn cluster_thresh(&self) -> f64 {
        self.cluster_thresh
    }

    /// Quantile defining the extremes.
    pub fn q_thresh(&self) -> f64 {
        self.q_thresh
    }

    /// Tail distribution.
    pub fn dist(&self) -> TailDist {
        self.dist
    }

    /// Pre-fitted reference tails, if any.
    pub fn ref_params(&self) -> Option<&[TailParams]> {
        self.ref_params.as_deref()
    }

    /// Transition fraction.
    pub fn frac(&self) -> f64 {
        self.frac
    }

    /// Transition power.
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Interpolation.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Extrapolation policy.
    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    /// Location chunk size, `None` for a single block.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Validates this configuration.
    ///
    /// Checks that `cluster_thresh` is finite, `q_thresh` lies in (0, 1),
    /// `frac` in (0, 1], `power` is finite and positive and every supplied
    /// reference tail uses the configured distribution.
    pub fn validate(&self) -> Result<(), AdjustError> {
        if !self.cluster_thresh.is_finite() {
            return Err(AdjustError::config(format!(
                "cluster_thresh must be finite, got {}",
                self.cluster_thresh
            )));
        }
        if !(self.q_thresh > 0.0 && self.q_thresh < 1.0) {
            return Err(AdjustError::config(format!(
                "q_thresh must be in (0, 1), got {}",
                self.q_thresh
            )));
        }
        if !(self.frac > 0.0 && self.frac <= 1.0) {
            return Err(AdjustError::config(format!(
                "frac must be in (0, 1], got {}",
                self.frac
            )));
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(AdjustError::config(format!(
                "power must be finite and > 0, got {}",
                self.power
            )));
        }
        if let Some(params) = &self.ref_params {
            if params.iter().any(|p| p.dist() != self.dist) {
                return Err(AdjustError::config(format!(
                    "ref_params must all be {} tails",
                    self.dist
                )));
            }
        }
        validate_chunk(self.chunk_size)
    }
}
