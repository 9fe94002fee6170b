use std::collections::BTreeMap;

use crate::columns::ColumnIndex;
use crate::container::{join_name, parent_group, AttrValue, Container, COLUMNS_ATTR};
use crate::query::orientation::{time_len, time_major_slice, Orientation};
use crate::timeseries::MISSING;
use crate::{Error, Result};

/// Rows keyed by epoch-second timestamp, always in ascending time order.
///
/// Merging another table takes the union of timestamps and columns; values
/// from the merged table overwrite existing cells. Cells no table supplied
/// hold [`MISSING`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTable {
    columns: ColumnIndex,
    rows: BTreeMap<i64, Vec<f64>>,
}

impl TimeTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: ColumnIndex::from_names(columns),
            rows: BTreeMap::new(),
        }
    }

    /// Build from a 1-D or 2-D dataset and its group's timestamps.
    ///
    /// 2-D columns are named by the dataset's `columns` attribute, or by
    /// position when it is absent. Columns past the end of a short
    /// attribute are named by position. A 1-D dataset becomes one column named
    /// after the dataset.
    pub fn from_container(container: &Container, dataset: &str, timestamp_key: &str) -> Result<Self> {
        let ds = container.require(dataset)?;
        let ts_name = join_name(&parent_group(dataset), timestamp_key);
        let timestamps = container
            .dataset(&ts_name)
            .ok_or_else(|| Error::MissingTimestamps {
                group: parent_group(dataset),
            })?
            .as_i64()
            .ok_or(Error::Corrupt("timestamp dataset is not 1-D integer"))?;

        let orientation = Orientation::of(container)?;
        let steps = time_len(ds, orientation);
        if ds.ndim() > 2 {
            return Err(Error::InvalidDimensions {
                dataset: dataset.to_string(),
                ndim: ds.ndim(),
            });
        }
        if steps != timestamps.len() {
            return Err(Error::ShapeMismatch {
                dataset: dataset.to_string(),
                expected: vec![timestamps.len()],
                found: ds.shape().to_vec(),
            });
        }
        let slice = time_major_slice(ds, orientation, 0..steps, dataset)?;
        let width = slice.shape().get(1).copied().unwrap_or(1);

        let names: Vec<String> = if ds.ndim() == 1 {
            vec![dataset.rsplit('/').next().unwrap_or(dataset).to_string()]
        } else {
            match ds.attrs().get(COLUMNS_ATTR).and_then(AttrValue::as_str_list) {
                Some(mut names) => {
                    names.truncate(width);
                    names.extend((names.len()..width).map(|i| i.to_string()));
                    names
                }
                None => (0..width).map(|i| i.to_string()).collect(),
            }
        };

        let mut table = Self::new(names);
        for (t, timestamp) in timestamps.iter().enumerate() {
            table.rows.insert(*timestamp, slice.step(t).to_vec());
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.keys().copied()
    }

    pub fn row(&self, timestamp: i64) -> Option<&[f64]> {
        self.rows.get(&timestamp).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (i64, &[f64])> + '_ {
        self.rows.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    /// Values of column `name` in time order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.position(name)?;
        Some(self.rows.values().map(|row| row[idx]).collect())
    }

    /// Set one row, widening the table for unseen columns.
    pub fn insert_row(&mut self, timestamp: i64, values: &[(String, f64)]) {
        for (name, value) in values {
            let idx = self.column_position(name);
            let width = self.columns.len();
            let row = self
                .rows
                .entry(timestamp)
                .or_insert_with(|| vec![MISSING; width]);
            row[idx] = *value;
        }
    }

    /// Keep rows with `start <= t < end`.
    pub fn retain_range(&mut self, start: i64, end: i64) {
        self.rows.retain(|t, _| *t >= start && *t < end);
    }

    /// Reindex onto the union of both time keys and overwrite with `other`.
    pub fn merge(&mut self, other: TimeTable) {
        let mapping: Vec<usize> = other
            .columns
            .names()
            .iter()
            .map(|name| self.column_position(name))
            .collect();
        let width = self.columns.len();
        for (timestamp, values) in other.rows {
            let row = self
                .rows
                .entry(timestamp)
                .or_insert_with(|| vec![MISSING; width]);
            for (src, dst) in mapping.iter().enumerate() {
                row[*dst] = values[src];
            }
        }
    }

    /// Position of `name`, appending a column filled with [`MISSING`] if new.
    fn column_position(&mut self, name: &str) -> usize {
        if let Some(idx) = self.columns.position(name) {
            return idx;
        }
        let idx = self.columns.push(name);
        for row in self.rows.values_mut() {
            row.push(MISSING);
        }
        idx
    }
}
