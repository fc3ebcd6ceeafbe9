//! Calendar grouping property and window.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::GroupError;
use crate::time::days_in_month;

/// Calendar property that defines the statistical groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupProp {
    /// A single group holding the whole series.
    #[default]
    None,
    /// Calendar month, 12 groups.
    Month,
    /// Day of year, 366 groups (day 366 only occurs in leap years).
    DayOfYear,
    /// Meteorological season (DJF, MAM, JJA, SON), 4 groups.
    Season,
}

impl GroupProp {
    /// Number of group labels, including labels that may end up empty.
    pub fn n_groups(self) -> usize {
        match self {
            GroupProp::None => 1,
            GroupProp::Month => 12,
            GroupProp::DayOfYear => 366,
            GroupProp::Season => 4,
        }
    }

    /// 0-based group label of `date`.
    pub fn label(self, date: NaiveDate) -> usize {
        match self {
            GroupProp::None => 0,
            GroupProp::Month => date.month0() as usize,
            GroupProp::DayOfYear => date.ordinal0() as usize,
            GroupProp::Season => season_of(date.month()),
        }
    }

    /// Continuous position of `date` on the group axis.
    ///
    /// Group `g` is centered at `g`. Months run from `g - 0.5` on day 0 to
    /// `g + 0.5` on their last day, seasons likewise over their three months;
    /// days of year sit exactly on their label.
    pub fn position(self, date: NaiveDate) -> f64 {
        match self {
            GroupProp::None => 0.0,
            GroupProp::DayOfYear => date.ordinal0() as f64,
            GroupProp::Month => {
                date.month0() as f64 - 0.5 + date.day() as f64 / days_in_month(date) as f64
            }
            GroupProp::Season => {
                let month_in_season = (date.month() % 12) / 3 * 3;
                let offset = (date.month() % 12 - month_in_season) as f64;
                let frac = (offset + date.day() as f64 / days_in_month(date) as f64) / 3.0;
                season_of(date.month()) as f64 - 0.5 + frac
            }
        }
    }

    /// Short name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            GroupProp::None => "none",
            GroupProp::Month => "month",
            GroupProp::DayOfYear => "dayofyear",
            GroupProp::Season => "season",
        }
    }
}

fn season_of(month: u32) -> usize {
    ((month % 12) / 3) as usize
}

impl fmt::Display for GroupProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupProp {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "time" | "" => Ok(GroupProp::None),
            "month" | "time.month" => Ok(GroupProp::Month),
            "dayofyear" | "doy" | "time.dayofyear" => Ok(GroupProp::DayOfYear),
            "season" | "time.season" => Ok(GroupProp::Season),
            other => Err(GroupError::UnknownGroup {
                name: other.to_string(),
            }),
        }
    }
}

/// A grouping property with a centered moving window.
///
/// Immutable once constructed. A window of `w` time steps adds, for every
/// member of a group, its `w / 2` neighbours on each side to the group's
/// sample.
///
/// # Example
///
/// ```
/// use sdba_group::{GroupProp, Grouper};
///
/// let g = Grouper::new(GroupProp::DayOfYear, 31).unwrap();
/// assert_eq!(g.half_window(), 15);
/// assert!(Grouper::new(GroupProp::None, 3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grouper {
    prop: GroupProp,
    window: usize,
}

impl Grouper {
    /// Creates a grouper.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidWindow`] if `window` is zero or even and
    /// [`GroupError::WindowWithoutGroup`] if `window > 1` with
    /// [`GroupProp::None`].
    pub fn new(prop: GroupProp, window: usize) -> Result<Self, GroupError> {
        if window == 0 || window % 2 == 0 {
            return Err(GroupError::InvalidWindow { window });
        }
        if prop == GroupProp::None && window != 1 {
            return Err(GroupError::WindowWithoutGroup { window });
        }
        Ok(Self { prop, window })
    }

    /// Grouper without a window.
    pub fn plain(prop: GroupProp) -> Self {
        Self { prop, window: 1 }
    }

    /// No grouping: the whole series forms one group.
    pub fn none() -> Self {
        Self::plain(GroupProp::None)
    }

    /// The grouping property.
    pub fn prop(&self) -> GroupProp {
        self.prop
    }

    /// The window size (odd, >= 1).
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of neighbours on each side of the window center.
    pub fn half_window(&self) -> usize {
        self.window / 2
    }

    /// Number of group labels.
    pub fn n_groups(&self) -> usize {
        self.prop.n_groups()
    }

    /// Same property, window collapsed to 1.
    pub fn main_only(&self) -> Self {
        Self::plain(self.prop)
    }

    /// Groups and weights to combine when evaluating a per-group quantity at
    /// `date`.
    ///
    /// With `smooth = false` the date's own group gets weight 1. Otherwise the
    /// two groups bracketing [`GroupProp::position`] are blended linearly,
    /// wrapping around the end of the group axis. The second weight is 0 when
    /// the date sits exactly on a group center.
    pub fn blend(&self, date: NaiveDate, smooth: bool) -> [(usize, f64); 2] {
        let n = self.n_groups();
        if !smooth || n == 1 {
            let g = self.prop.label(date);
            return [(g, 1.0), (g, 0.0)];
        }
        let pos = self.prop.position(date);
        let lo = pos.floor();
        let frac = pos - lo;
        let g0 = (lo as i64).rem_euclid(n as i64) as usize;
        let g1 = (g0 + 1) % n;
        [(g0, 1.0 - frac), (g1, frac)]
    }
}

impl Default for Grouper {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn labels() {
        let date = d(2001, 3, 2);
        assert_eq!(GroupProp::None.label(date), 0);
        assert_eq!(GroupProp::Month.label(date), 2);
        assert_eq!(GroupProp::DayOfYear.label(date), 60);
        assert_eq!(GroupProp::Season.label(date), 1);
        assert_eq!(GroupProp::Season.label(d(2001, 12, 1)), 0);
        assert_eq!(GroupProp::Season.label(d(2001, 2, 28)), 0);
    }

    #[test]
    fn even_window_rejected() {
        assert_eq!(
            Grouper::new(GroupProp::Month, 2).unwrap_err(),
            GroupError::InvalidWindow { window: 2 }
        );
        assert_eq!(
            Grouper::new(GroupProp::Month, 0).unwrap_err(),
            GroupError::InvalidWindow { window: 0 }
        );
    }

    #[test]
    fn window_without_group_rejected() {
        assert_eq!(
            Grouper::new(GroupProp::None, 3).unwrap_err(),
            GroupError::WindowWithoutGroup { window: 3 }
        );
    }

    #[test]
    fn parse_props() {
        assert_eq!("time.dayofyear".parse::<GroupProp>().unwrap(), GroupProp::DayOfYear);
        assert_eq!("Month".parse::<GroupProp>().unwrap(), GroupProp::Month);
        assert!("week".parse::<GroupProp>().is_err());
    }

    #[test]
    fn month_position_spans_month() {
        // mid-January sits on the January center
        let p = GroupProp::Month.position(d(2001, 1, 15));
        assert_relative_eq!(p, -0.5 + 15.0 / 31.0, epsilon = 1e-12);
        let end = GroupProp::Month.position(d(2001, 1, 31));
        assert_relative_eq!(end, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn blend_wraps_around_year_end() {
        let g = Grouper::plain(GroupProp::Month);
        // Jan 1 lies before the January center: blend December and January
        let [(g0, w0), (g1, w1)] = g.blend(d(2001, 1, 1), true);
        assert_eq!((g0, g1), (11, 0));
        assert_relative_eq!(w0 + w1, 1.0, epsilon = 1e-12);
        assert!(w1 > w0);
    }

    #[test]
    fn blend_nearest_uses_own_group() {
        let g = Grouper::plain(GroupProp::Month);
        let [(g0, w0), (_, w1)] = g.blend(d(2001, 7, 30), false);
        assert_eq!(g0, 6);
        assert_eq!((w0, w1), (1.0, 0.0));
    }
}
