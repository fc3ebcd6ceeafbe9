//! Windowed re-indexing of a series into `(group, sample)` and back.
//!
//! Every group owns its *members*: the time steps whose label is the group.
//! The group's sample axis enumerates `(member, window offset)` pairs, member
//! major. Offsets that fall outside the series, and slots beyond the last
//! member of a shorter group, are padding: they read as NaN and map to no
//! time step.

use ndarray::{Array2, Array3, Axis};

use crate::error::GroupError;
use crate::grouper::Grouper;
use crate::series::Series;
use crate::time::TimeAxis;

/// Side-channel index produced by [`group`] and required by [`ungroup`].
///
/// Holds the grouper, the original time axis and the member list of every
/// group, so a grouped view can be mapped back exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    grouper: Grouper,
    time: TimeAxis,
    members: Vec<Vec<usize>>,
    max_members: usize,
}

impl Grouping {
    /// Computes group membership of every time step of `time`.
    pub fn new(time: &TimeAxis, grouper: Grouper) -> Self {
        let mut members = vec![Vec::new(); grouper.n_groups()];
        for (t, &date) in time.dates().iter().enumerate() {
            members[grouper.prop().label(date)].push(t);
        }
        let max_members = members.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            grouper,
            time: time.clone(),
            members,
            max_members,
        }
    }

    /// The grouper this index was built with.
    pub fn grouper(&self) -> &Grouper {
        &self.grouper
    }

    /// The original time axis.
    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// Number of group labels.
    pub fn n_groups(&self) -> usize {
        self.members.len()
    }

    /// Time indices whose label is group `g`, in time order.
    pub fn members(&self, g: usize) -> &[usize] {
        &self.members[g]
    }

    /// Length of the sample axis shared by all groups.
    pub fn sample_len(&self) -> usize {
        self.max_members * self.grouper.window()
    }

    /// Time index read by sample slot `slot` of group `g`, or `None` for
    /// padding.
    pub fn source_index(&self, g: usize, slot: usize) -> Option<usize> {
        let window = self.grouper.window();
        let (member, offset) = (slot / window, slot % window);
        let center = *self.members[g].get(member)?;
        let t = (center + offset).checked_sub(self.grouper.half_window())?;
        (t < self.time.len()).then_some(t)
    }

    /// The windowed sample of group `g` for one location, padding as NaN.
    pub fn sample(&self, values: &[f64], g: usize) -> Vec<f64> {
        (0..self.sample_len())
            .map(|slot| self.source_index(g, slot).map_or(f64::NAN, |t| values[t]))
            .collect()
    }

    /// Values of the members of group `g` only, without window neighbours.
    pub fn main_sample(&self, values: &[f64], g: usize) -> Vec<f64> {
        self.members[g].iter().map(|&t| values[t]).collect()
    }

    /// Writes per-member results of group `g` back onto a time-indexed row.
    ///
    /// `group_values` must be ordered like [`Grouping::members`].
    pub fn scatter_main(&self, out: &mut [f64], g: usize, group_values: &[f64]) {
        for (&t, &v) in self.members[g].iter().zip(group_values.iter()) {
            out[t] = v;
        }
    }
}

/// A series re-indexed to `(location, group, sample)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedView {
    data: Array3<f64>,
}

impl GroupedView {
    /// The grouped values.
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Mutable access for in-group transforms; padding slots are ignored by
    /// [`ungroup`].
    pub fn data_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    /// `(group, sample)` slice of one location.
    pub fn location(&self, loc: usize) -> Array2<f64> {
        self.data.index_axis(Axis(0), loc).to_owned()
    }
}

/// Re-indexes `series` into its windowed groups.
///
/// Returns the grouped view together with the [`Grouping`] needed to invert
/// it. With [`crate::GroupProp::None`] there is one group whose sample is the
/// series itself.
pub fn group(series: &Series, grouper: Grouper) -> (GroupedView, Grouping) {
    let grouping = Grouping::new(series.time(), grouper);
    let (n_loc, n_groups, width) = (series.n_loc(), grouping.n_groups(), grouping.sample_len());
    let values = series.values();

    let mut data = Array3::from_elem((n_loc, n_groups, width), f64::NAN);
    for g in 0..n_groups {
        for slot in 0..width {
            if let Some(t) = grouping.source_index(g, slot) {
                for l in 0..n_loc {
                    data[[l, g, slot]] = values[[l, t]];
                }
            }
        }
    }
    (GroupedView { data }, grouping)
}

/// Inverse of [`group`]: rebuilds the time-indexed series from the center
/// window slot of every member.
///
/// # Errors
///
/// Returns [`GroupError::ShapeMismatch`] if the view's group or sample axes
/// do not match `grouping`.
pub fn ungroup(view: &GroupedView, grouping: &Grouping) -> Result<Series, GroupError> {
    let (n_loc, n_groups, width) = view.data.dim();
    if n_groups != grouping.n_groups() {
        return Err(GroupError::ShapeMismatch {
            what: "group",
            expected: grouping.n_groups(),
            got: n_groups,
        });
    }
    if width != grouping.sample_len() {
        return Err(GroupError::ShapeMismatch {
            what: "sample",
            expected: grouping.sample_len(),
            got: width,
        });
    }

    let window = grouping.grouper.window();
    let half = grouping.grouper.half_window();
    let mut out = Array2::from_elem((n_loc, grouping.time.len()), f64::NAN);
    for g in 0..n_groups {
        for (member, &t) in grouping.members[g].iter().enumerate() {
            let slot = member * window + half;
            for l in 0..n_loc {
                out[[l, t]] = view.data[[l, g, slot]];
            }
        }
    }
    Series::new(grouping.time.clone(), out)
}
