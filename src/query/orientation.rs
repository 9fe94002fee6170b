use std::ops::Range;

use crate::container::{Container, Dataset};
use crate::{Error, Result};

/// Where a container keeps the time axis of its 2-D and 3-D datasets.
///
/// Resolved once per container from the root `version` attribute. 1-D
/// datasets are always indexed by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Version 1: time on axis 1 (`[columns, time]`, `[a, time, b]`).
    Legacy,
    /// Version 2 and later: time on axis 0.
    Current,
}

impl Orientation {
    pub fn of(container: &Container) -> Result<Self> {
        Ok(Self::from_version(container.version()?))
    }

    pub fn from_version(version: u32) -> Self {
        if version <= 1 {
            Orientation::Legacy
        } else {
            Orientation::Current
        }
    }

    pub fn time_axis(self, ndim: usize) -> usize {
        match (self, ndim) {
            (_, 0 | 1) => 0,
            (Orientation::Legacy, _) => 1,
            (Orientation::Current, _) => 0,
        }
    }
}

/// Row-major n-dimensional `f64` array with time on axis 0.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        Some(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Length of the time axis.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements per time step.
    fn stride(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// The values at time step `t`.
    pub fn step(&self, t: usize) -> &[f64] {
        let stride = self.stride();
        &self.data[t * stride..(t + 1) * stride]
    }

    /// Append `other` along the time axis.
    ///
    /// # Errors
    ///
    /// - `Error::ShapeMismatch`: the non-time dimensions differ
    pub fn append_time(&mut self, other: NdArray, dataset: &str) -> Result<()> {
        if self.shape[1..] != other.shape[1..] {
            return Err(Error::ShapeMismatch {
                dataset: dataset.to_string(),
                expected: self.shape[1..].to_vec(),
                found: other.shape[1..].to_vec(),
            });
        }
        self.shape[0] += other.shape[0];
        self.data.extend(other.data);
        Ok(())
    }
}

/// Number of time steps stored in `dataset` under `orientation`.
pub fn time_len(dataset: &Dataset, orientation: Orientation) -> usize {
    let axis = orientation.time_axis(dataset.ndim());
    dataset.shape().get(axis).copied().unwrap_or(0)
}

/// Cut `rows` out of the time axis of `dataset` and return them time-major.
///
/// # Errors
///
/// - `Error::InvalidDimensions`: the dataset is 0-D or has more than 3 axes
/// - `Error::InvalidRange`: `rows` extends past the time axis
pub fn time_major_slice(
    dataset: &Dataset,
    orientation: Orientation,
    rows: Range<usize>,
    name: &str,
) -> Result<NdArray> {
    let shape = dataset.shape();
    if shape.is_empty() || shape.len() > 3 {
        return Err(Error::InvalidDimensions {
            dataset: name.to_string(),
            ndim: shape.len(),
        });
    }
    let steps = time_len(dataset, orientation);
    if rows.start > rows.end || rows.end > steps {
        return Err(Error::InvalidRange(format!(
            "rows {}..{} of {} in {}",
            rows.start, rows.end, steps, name
        )));
    }

    let values = dataset.to_f64();
    let len = rows.end - rows.start;
    let axis = orientation.time_axis(shape.len());

    if axis == 0 {
        let stride: usize = shape[1..].iter().product();
        let mut out_shape = shape.to_vec();
        out_shape[0] = len;
        return Ok(NdArray {
            shape: out_shape,
            data: values[rows.start * stride..rows.end * stride].to_vec(),
        });
    }

    // [outer, time, inner...] -> [time, outer, inner...]
    let outer = shape[0];
    let inner: usize = shape[2..].iter().product();
    let mut data = Vec::with_capacity(len * outer * inner);
    for t in rows.clone() {
        for o in 0..outer {
            let base = (o * steps + t) * inner;
            data.extend_from_slice(&values[base..base + inner]);
        }
    }
    let mut out_shape = vec![len, outer];
    out_shape.extend_from_slice(&shape[2..]);
    Ok(NdArray {
        shape: out_shape,
        data,
    })
}
