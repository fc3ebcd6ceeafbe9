//! # sdba-group
//!
//! Calendar grouping of time series and the correction operators shared by
//! every bias-adjustment method.
//!
//! ## Architecture
//!
//! ```text
//! Series (location × time)
//!   ├─ group(series, grouper) ──► (GroupedView, Grouping)
//!   │                                  │
//!   │   ungroup(view, &grouping) ◄─────┘   exact inverse at window centers
//!   └─ broadcast(factor, time, grouper, smooth) ──► location × time
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use sdba_group::{GroupProp, Grouper, Series, TimeAxis, group, ungroup};
//!
//! let time = TimeAxis::daily(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 730);
//! let series = Series::from_vec(time, (0..730).map(f64::from).collect()).unwrap();
//!
//! let grouper = Grouper::new(GroupProp::DayOfYear, 31).unwrap();
//! let (view, grouping) = group(&series, grouper);
//! assert_eq!(ungroup(&view, &grouping).unwrap(), series);
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `time` | Strictly increasing date axis |
//! | `series` | `(location, time)` values |
//! | `grouper` | Grouping property and window |
//! | `windowed` | Group / ungroup with padding |
//! | `broadcast` | Per-group values back onto a time axis |
//! | `correction` | Additive and multiplicative operators |
//! | `error` | Error types |

mod broadcast;
mod correction;
mod error;
mod grouper;
mod series;
mod time;
mod windowed;

pub use broadcast::broadcast;
pub use correction::{Kind, apply_correction, get_correction, invert};
pub use error::GroupError;
pub use grouper::{GroupProp, Grouper};
pub use series::Series;
pub use time::TimeAxis;
pub use windowed::{GroupedView, Grouping, group, ungroup};
