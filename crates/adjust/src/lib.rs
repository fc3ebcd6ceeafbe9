//! Bias-adjustment methods for gridded climate time series.
//!
//! Every method follows the same two-phase pattern: `train` learns
//! adjustment factors from a reference and a historical simulation, and
//! `adjust` applies them to a simulation of any period. Trained parameters
//! are plain values; they can be reused across any number of adjust calls.
//!
//! # Architecture
//!
//! ```text
//!  TrainInput ──► Adjustment::train ──► Trained ──► Trained::adjust ──► Adjusted
//!                      │                                  │
//!                      ▼                                  ▼
//!        map_blocks (chunks of locations, rayon) ─► map_groups (time groups)
//!                      │
//!                      ▼
//!     sdba-stats kernels (quantiles, ranks, ECDF)  +  sdba-group (Grouper, Kind)
//! ```
//!
//! | Method | Module | Factors |
//! |--------|--------|---------|
//! | Scaling | [`scaling`] | mean ratio/difference per group |
//! | EQM | [`eqm`] | quantile ratio/difference per group |
//! | DQM | [`dqm`] | EQM on detrended, mean-scaled data |
//! | QDM | [`qdm`] | EQM factors picked by sim's own rank |
//! | LOCI | [`loci`] | intensity above a threshold |
//! | NpdfT | [`npdf`] | iterated rotations of standardized variables |
//! | ExtremeValues | [`extremes`] | tail of cluster maxima |
//!
//! Missing values are NaN. A degenerate group (empty, all NaN) yields NaN
//! factors and a warning instead of an error.

mod adapt_freq;
mod block;
mod config;
mod dataset;
mod detrend;
mod error;
mod input;
mod method;
mod quantile;
mod rng;
mod tail;

pub mod dqm;
pub mod eqm;
pub mod extremes;
pub mod loci;
pub mod npdf;
pub mod qdm;
pub mod scaling;

pub use adapt_freq::{AdaptedFreq, adapt_freq};
pub use block::{BlockSpec, GroupBlock, map_blocks, map_groups};
pub use config::{
    DqmConfig, ExtremeConfig, LociConfig, NpdfConfig, QuantileConfig, ScalingConfig,
};
pub use dataset::{DataArray, Dataset, Dim};
pub use detrend::{PolyDetrend, Trend};
pub use dqm::DqmParams;
pub use eqm::QuantileParams;
pub use error::AdjustError;
pub use extremes::{Cluster, ExtremeParams, get_clusters};
pub use input::{AdjustInput, Adjusted, TrainInput};
pub use loci::LociParams;
pub use method::{Adjustment, Trained};
pub use npdf::NpdfParams;
pub use quantile::{equally_spaced_nodes, interp_on_quantiles};
pub use scaling::ScalingParams;
pub use tail::{TailDist, TailParams, fit_tail};

pub use sdba_stats::{Extrapolation, Interp};
