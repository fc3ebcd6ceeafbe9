//! Polynomial detrending per group.

use ndarray::{Array2, Ix2};
use sdba_group::{Grouper, Kind, Series};
use sdba_stats::{nanmean, polyfit, polyval};

use crate::block::{BlockSpec, map_groups};
use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;

const DAYS_PER_YEAR: f64 = 365.25;

/// Polynomial trend model: degree, grouping and correction kind.
///
/// Each group gets its own least-squares polynomial of the values against
/// time (in years since the first date). Window neighbours are not used.
///
/// # Example
///
/// ```
/// use sdba_adjust::PolyDetrend;
/// use sdba_group::Kind;
///
/// let detrend = PolyDetrend::new(2).with_kind(Kind::Multiplicative);
/// assert_eq!(detrend.degree(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyDetrend {
    degree: usize,
    kind: Kind,
    grouper: Grouper,
    preserve_mean: bool,
}

impl PolyDetrend {
    /// A trend of the given degree.
    ///
    /// Defaults: `kind = Additive`, no grouping, `preserve_mean = false`.
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            kind: Kind::Additive,
            grouper: Grouper::none(),
            preserve_mean: false,
        }
    }

    /// Sets the correction kind.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the grouping.
    pub fn with_group(mut self, grouper: Grouper) -> Self {
        self.grouper = grouper;
        self
    }

    /// Whether removing the trend keeps each group's mean.
    pub fn with_preserve_mean(mut self, preserve: bool) -> Self {
        self.preserve_mean = preserve;
        self
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Correction kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Grouping.
    pub fn grouper(&self) -> Grouper {
        self.grouper
    }

    /// Whether the group mean is preserved.
    pub fn preserve_mean(&self) -> bool {
        self.preserve_mean
    }

    /// Fits the trend of `series`.
    ///
    /// Groups with no valid value get a NaN trend.
    ///
    /// # Errors
    ///
    /// Propagates block-execution contract errors.
    pub fn fit(&self, series: &Series) -> Result<Trend, AdjustError> {
        let years: Vec<f64> = series
            .time()
            .days_since_start()
            .iter()
            .map(|d| d / DAYS_PER_YEAR)
            .collect();
        let ds = Dataset::new().with(
            "x",
            DataArray::new(&[Dim::Location, Dim::Time], series.values().to_owned())?,
        );
        let spec = BlockSpec::new().output("trend", &[Dim::Location, Dim::Time]);

        let mut out = map_groups(
            &ds,
            series.time(),
            self.grouper.main_only(),
            &spec,
            |block| {
                let x = block.data().view::<Ix2>("x", &[Dim::Location, Dim::Sample])?;
                let t: Vec<f64> = (0..block.sample_len())
                    .map(|slot| block.time_index(slot).map_or(f64::NAN, |i| years[i]))
                    .collect();
                let mut trend = Array2::from_elem(x.dim(), f64::NAN);
                for (l, row) in x.rows().into_iter().enumerate() {
                    let y = row.to_vec();
                    let Some(coef) = polyfit(&t, &y, self.degree) else {
                        continue;
                    };
                    let mut fitted: Vec<f64> = t
                        .iter()
                        .map(|&ti| if ti.is_nan() { f64::NAN } else { polyval(&coef, ti) })
                        .collect();
                    if self.preserve_mean {
                        let shift = self.kind.invert(nanmean(&fitted));
                        fitted.iter_mut().for_each(|v| *v = self.kind.apply(*v, shift));
                    }
                    trend.row_mut(l).assign(&ndarray::Array1::from(fitted));
                }
                Ok(Dataset::new().with("trend", DataArray::new(&[Dim::Location, Dim::Sample], trend)?))
            },
        )?;

        let trend = out.take_as::<Ix2>("trend", &[Dim::Location, Dim::Time])?;
        Ok(Trend {
            model: *self,
            trend: series.with_values(trend)?,
        })
    }
}

/// A fitted trend: the model plus the trend values over the fitted series'
/// time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    model: PolyDetrend,
    trend: Series,
}

impl Trend {
    /// The model this trend was fitted with.
    pub fn model(&self) -> &PolyDetrend {
        &self.model
    }

    /// Trend values.
    pub fn trend(&self) -> &Series {
        &self.trend
    }

    /// Consumes the trend, returning its values.
    pub fn into_series(self) -> Series {
        self.trend
    }

    /// Removes the trend from `series`.
    ///
    /// # Errors
    ///
    /// Returns [`AdjustError::TimeMismatch`] if `series` is not on the
    /// fitted time axis, or a shape error if its location count differs.
    pub fn detrend(&self, series: &Series) -> Result<Series, AdjustError> {
        let kind = self.model.kind;
        self.combine(series, |v, t| kind.apply(v, kind.invert(t)))
    }

    /// Puts the trend back onto `series`.
    ///
    /// # Errors
    ///
    /// Same as [`Trend::detrend`].
    pub fn retrend(&self, series: &Series) -> Result<Series, AdjustError> {
        let kind = self.model.kind;
        self.combine(series, |v, t| kind.apply(v, t))
    }

    fn combine(&self, series: &Series, op: impl Fn(f64, f64) -> f64) -> Result<Series, AdjustError> {
        if series.time() != self.trend.time() {
            return Err(AdjustError::TimeMismatch {
                left: "series",
                right: "trend",
            });
        }
        if series.n_loc() != self.trend.n_loc() {
            return Err(AdjustError::shape(
                "series",
                format!("{} locations, trend has {}", series.n_loc(), self.trend.n_loc()),
            ));
        }
        let mut values = series.values().to_owned();
        values.zip_mut_with(&self.trend.values(), |v, &t| *v = op(*v, t));
        Ok(series.with_values(values)?)
    }
}
