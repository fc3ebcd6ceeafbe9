//! Block execution adapter.
//!
//! Kernels are pure functions from a [`Dataset`] to a [`Dataset`]. The
//! adapter materializes their inputs (one group or one chunk of locations at
//! a time), runs them in parallel with rayon and reassembles the outputs.
//! Declared outputs are checked once per call, against the first group or
//! chunk.
//!
//! ```text
//! map_blocks ── chunk 0..k ──┐
//!            ── chunk k..n ──┼─► concatenate along Location
//!                            │
//!   map_groups ── group 0 ──┐│
//!              ── group 1 ──┼┴─► stack along Group / scatter back onto Time
//!              ── ...     ──┘
//! ```

use std::ops::Range;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use rayon::prelude::*;
use sdba_group::{Grouper, Grouping, TimeAxis};
use tracing::debug;

use crate::dataset::{DataArray, Dataset, Dim};
use crate::error::AdjustError;

/// Declared outputs of a block call: variable names and their dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSpec {
    outputs: Vec<(String, Vec<Dim>)>,
}

impl BlockSpec {
    /// A spec with no outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares output `name` with dimensions `dims`.
    pub fn output(mut self, name: &str, dims: &[Dim]) -> Self {
        self.outputs.push((name.to_string(), dims.to_vec()));
        self
    }

    /// Declared `(name, dims)` pairs in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &[Dim])> {
        self.outputs.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    /// Checks `ds` against the declared outputs with every declared dims list
    /// passed through `kernel_dims` first.
    fn check(
        &self,
        ds: &Dataset,
        kernel_dims: impl Fn(&[Dim]) -> Vec<Dim>,
    ) -> Result<(), AdjustError> {
        for name in ds.names() {
            if !self.outputs.iter().any(|(n, _)| n == name) {
                return Err(AdjustError::shape(name, "returned but not declared"));
            }
        }
        for (name, dims) in &self.outputs {
            let expected = kernel_dims(dims);
            let array = ds
                .get(name)
                .map_err(|_| AdjustError::shape(name.as_str(), "declared but not returned"))?;
            if array.dims() != expected.as_slice() {
                return Err(AdjustError::shape(
                    name.as_str(),
                    format!("declared {expected:?}, returned {:?}", array.dims()),
                ));
            }
        }
        Ok(())
    }
}

/// Input of a grouped kernel: the data of a single group.
///
/// Variables with a [`Dim::Time`] axis arrive with it replaced by
/// [`Dim::Sample`] holding the windowed group sample (NaN for padding).
/// Variables with a [`Dim::Group`] axis arrive sliced at this group.
/// Everything else is passed unchanged.
#[derive(Debug)]
pub struct GroupBlock<'a> {
    group: usize,
    grouping: &'a Grouping,
    data: Dataset,
}

impl GroupBlock<'_> {
    /// Group label.
    pub fn group(&self) -> usize {
        self.group
    }

    /// The group's data.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Length of the sample axis.
    pub fn sample_len(&self) -> usize {
        self.grouping.sample_len()
    }

    /// Time index feeding sample slot `slot`, `None` for padding.
    pub fn time_index(&self, slot: usize) -> Option<usize> {
        self.grouping.source_index(self.group, slot)
    }
}

/// How a declared `map_groups` output is reassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assembly {
    /// Leading `Group` axis: one kernel result per group, stacked.
    Stack,
    /// A `Time` axis: kernels return it as `Sample`, center slots are
    /// scattered back onto the time axis.
    Scatter(usize),
}

fn assembly_of(name: &str, dims: &[Dim]) -> Result<Assembly, AdjustError> {
    let time = dims.iter().position(|&d| d == Dim::Time);
    match (dims.first(), time) {
        (Some(Dim::Group), None) => Ok(Assembly::Stack),
        (_, Some(ax)) if !dims.contains(&Dim::Group) => Ok(Assembly::Scatter(ax)),
        _ => Err(AdjustError::shape(
            name,
            "grouped outputs need a leading group axis or a time axis",
        )),
    }
}

fn kernel_dims(dims: &[Dim]) -> Vec<Dim> {
    dims.iter()
        .filter(|&&d| d != Dim::Group)
        .map(|&d| if d == Dim::Time { Dim::Sample } else { d })
        .collect()
}

/// Runs `kernel` once per group label of `grouper` over `time`.
///
/// Every declared output must either start with [`Dim::Group`] (the kernel
/// returns it without that axis, results are stacked) or contain
/// [`Dim::Time`] (the kernel returns it with [`Dim::Sample`] in its place and
/// the center window slot of every member is written back to its time step).
///
/// # Errors
///
/// Returns [`AdjustError::ShapeContract`] if an input's time axis does not
/// match `time`, if the first group's result does not match `spec`, or if
/// later groups return incompatible shapes. Kernel errors are propagated.
pub fn map_groups<F>(
    ds: &Dataset,
    time: &TimeAxis,
    grouper: Grouper,
    spec: &BlockSpec,
    kernel: F,
) -> Result<Dataset, AdjustError>
where
    F: Fn(&GroupBlock<'_>) -> Result<Dataset, AdjustError> + Sync,
{
    let assemblies = spec
        .outputs()
        .map(|(name, dims)| assembly_of(name, dims))
        .collect::<Result<Vec<_>, _>>()?;

    for (name, array) in ds.iter() {
        match array.len_of(Dim::Time) {
            Some(n) if n != time.len() => {
                return Err(AdjustError::shape(
                    name,
                    format!("time length {n} does not match axis of {}", time.len()),
                ));
            }
            _ => {}
        }
        match array.len_of(Dim::Group) {
            Some(n) if n != grouper.n_groups() => {
                return Err(AdjustError::shape(
                    name,
                    format!("{n} groups, grouper has {}", grouper.n_groups()),
                ));
            }
            _ => {}
        }
    }

    let grouping = Grouping::new(time, grouper);
    debug!(
        n_groups = grouping.n_groups(),
        sample_len = grouping.sample_len(),
        "map_groups"
    );

    let results = (0..grouping.n_groups())
        .into_par_iter()
        .map(|g| {
            let block = GroupBlock {
                group: g,
                grouping: &grouping,
                data: slice_group(ds, &grouping, g),
            };
            kernel(&block)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(first) = results.first() {
        spec.check(first, kernel_dims)?;
    }

    let mut out = Dataset::new();
    for ((name, dims), assembly) in spec.outputs().zip(assemblies) {
        let views = results
            .iter()
            .map(|r| r.get(name).map(|a| a.data().view()))
            .collect::<Result<Vec<_>, _>>()?;
        let data = match assembly {
            Assembly::Stack => ndarray::stack(Axis(0), &views)
                .map_err(|e| AdjustError::shape(name, e.to_string()))?,
            Assembly::Scatter(ax) => scatter(name, &views, &grouping, Axis(ax), time.len())?,
        };
        out.insert(name, DataArray::from_parts(dims.to_vec(), data));
    }
    Ok(out)
}

fn slice_group(ds: &Dataset, grouping: &Grouping, g: usize) -> Dataset {
    let mut out = Dataset::new();
    for (name, array) in ds.iter() {
        let sliced = if let Some(ax) = array.axis(Dim::Time) {
            let mut shape = array.data().shape().to_vec();
            shape[ax.index()] = grouping.sample_len();
            let mut data = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
            for slot in 0..grouping.sample_len() {
                if let Some(t) = grouping.source_index(g, slot) {
                    data.index_axis_mut(ax, slot)
                        .assign(&array.data().index_axis(ax, t));
                }
            }
            let dims = array
                .dims()
                .iter()
                .map(|&d| if d == Dim::Time { Dim::Sample } else { d })
                .collect();
            DataArray::from_parts(dims, data)
        } else if let Some(ax) = array.axis(Dim::Group) {
            let dims = array.dims().iter().copied().filter(|&d| d != Dim::Group).collect();
            DataArray::from_parts(dims, array.data().index_axis(ax, g).to_owned())
        } else {
            array.clone()
        };
        out.insert(name, sliced);
    }
    out
}

fn scatter(
    name: &str,
    per_group: &[ArrayViewD<'_, f64>],
    grouping: &Grouping,
    ax: Axis,
    n_time: usize,
) -> Result<ArrayD<f64>, AdjustError> {
    let Some(first) = per_group.first() else {
        return Err(AdjustError::shape(name, "no groups to scatter"));
    };
    let mut shape = first.shape().to_vec();
    shape[ax.index()] = n_time;
    let mut out = ArrayD::from_elem(IxDyn(&shape), f64::NAN);

    let window = grouping.grouper().window();
    let half = grouping.grouper().half_window();
    for (g, result) in per_group.iter().enumerate() {
        if result.shape() != first.shape() {
            return Err(AdjustError::shape(
                name,
                format!("group {g} returned shape {:?}, expected {:?}", result.shape(), first.shape()),
            ));
        }
        for (member, &t) in grouping.members(g).iter().enumerate() {
            out.index_axis_mut(ax, t)
                .assign(&result.index_axis(ax, member * window + half));
        }
    }
    Ok(out)
}

/// Runs `kernel` on chunks of at most `chunk_size` locations, in parallel.
///
/// Every variable with a [`Dim::Location`] axis is sliced; other variables
/// are passed whole. The kernel also receives the global location range of
/// its chunk. Outputs with a location axis are concatenated along it; outputs
/// without one are taken from the first chunk. `None` runs a single call on
/// the full dataset.
///
/// # Errors
///
/// Returns [`AdjustError::InvalidConfig`] for a zero chunk size and
/// [`AdjustError::ShapeContract`] if inputs disagree on the number of
/// locations or the first chunk's result does not match `spec`. Kernel
/// errors are propagated.
pub fn map_blocks<F>(
    ds: &Dataset,
    spec: &BlockSpec,
    chunk_size: Option<usize>,
    kernel: F,
) -> Result<Dataset, AdjustError>
where
    F: Fn(Range<usize>, &Dataset) -> Result<Dataset, AdjustError> + Sync,
{
    if chunk_size == Some(0) {
        return Err(AdjustError::config("chunk_size must be >= 1"));
    }

    let mut n_loc: Option<usize> = None;
    for (name, array) in ds.iter() {
        if let Some(n) = array.len_of(Dim::Location) {
            match n_loc {
                Some(m) if m != n => {
                    return Err(AdjustError::shape(
                        name,
                        format!("{n} locations, other inputs have {m}"),
                    ));
                }
                _ => n_loc = Some(n),
            }
        }
    }
    let n_loc = n_loc.unwrap_or(0);
    let size = chunk_size.unwrap_or(n_loc).max(1);

    if n_loc <= size {
        let out = kernel(0..n_loc, ds)?;
        spec.check(&out, <[Dim]>::to_vec)?;
        return Ok(out);
    }

    let ranges: Vec<Range<usize>> = (0..n_loc)
        .step_by(size)
        .map(|start| start..(start + size).min(n_loc))
        .collect();
    debug!(n_loc, n_chunks = ranges.len(), "map_blocks");

    let results = ranges
        .par_iter()
        .map(|range| kernel(range.clone(), &slice_locations(ds, range)))
        .collect::<Result<Vec<_>, _>>()?;

    spec.check(&results[0], <[Dim]>::to_vec)?;

    let mut out = Dataset::new();
    for (name, dims) in spec.outputs() {
        let arrays = results
            .iter()
            .map(|r| r.get(name))
            .collect::<Result<Vec<_>, _>>()?;
        let data = match arrays[0].axis(Dim::Location) {
            Some(ax) => {
                let views: Vec<_> = arrays.iter().map(|a| a.data().view()).collect();
                ndarray::concatenate(ax, &views)
                    .map_err(|e| AdjustError::shape(name, e.to_string()))?
            }
            None => arrays[0].data().clone(),
        };
        out.insert(name, DataArray::from_parts(dims.to_vec(), data));
    }
    Ok(out)
}

fn slice_locations(ds: &Dataset, range: &Range<usize>) -> Dataset {
    let mut out = Dataset::new();
    for (name, array) in ds.iter() {
        let sliced = match array.axis(Dim::Location) {
            Some(ax) => DataArray::from_parts(
                array.dims().to_vec(),
                array
                    .data()
                    .slice_axis(ax, Slice::from(range.clone()))
                    .to_owned(),
            ),
            None => array.clone(),
        };
        out.insert(name, sliced);
    }
    out
}
