//! Strictly increasing calendar time axis.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::GroupError;

/// An ordered sequence of dates indexing the `time` dimension of a series.
///
/// Cheap to clone: the dates are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    dates: Arc<[NaiveDate]>,
}

impl TimeAxis {
    /// Creates a time axis, checking that dates are strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::UnsortedTime`] at the first out-of-order date.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, GroupError> {
        if let Some(i) = dates.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GroupError::UnsortedTime { index: i + 1 });
        }
        Ok(Self {
            dates: dates.into(),
        })
    }

    /// Daily axis of `n` consecutive days starting at `start`.
    pub fn daily(start: NaiveDate, n: usize) -> Self {
        let dates: Vec<NaiveDate> = start.iter_days().take(n).collect();
        Self {
            dates: dates.into(),
        }
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns `true` if the axis holds no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The dates as a slice.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Date at position `i`.
    pub fn get(&self, i: usize) -> Option<NaiveDate> {
        self.dates.get(i).copied()
    }

    /// Fractional days elapsed since the first date, the abscissa used for
    /// trend fitting.
    pub fn days_since_start(&self) -> Vec<f64> {
        match self.dates.first() {
            Some(&first) => self
                .dates
                .iter()
                .map(|d| (*d - first).num_days() as f64)
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Number of days in the month containing `date`.
pub(crate) fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first + Days::new(31));
    (next - first).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_axis() {
        let t = TimeAxis::daily(d(2000, 12, 30), 3);
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(2), Some(d(2001, 1, 1)));
        assert_eq!(t.days_since_start(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn rejects_unsorted() {
        let err = TimeAxis::new(vec![d(2000, 1, 2), d(2000, 1, 1)]).unwrap_err();
        assert_eq!(err, GroupError::UnsortedTime { index: 1 });
    }

    #[test]
    fn rejects_duplicates() {
        assert!(TimeAxis::new(vec![d(2000, 1, 1), d(2000, 1, 1)]).is_err());
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(d(2000, 2, 10)), 29);
        assert_eq!(days_in_month(d(2001, 2, 10)), 28);
        assert_eq!(days_in_month(d(2001, 12, 31)), 31);
        assert_eq!(days_in_month(d(2001, 4, 1)), 30);
    }
}
