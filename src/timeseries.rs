//! In-memory fixed-cadence time series.
//!
//! A [`TimeSeries`] owns a dense matrix of `f64` indexed by (time bin, column),
//! the timestamp of every bin, and the entity name of every column. Cells that
//! were never written hold negative zero ([`MISSING`]); a measured zero is
//! positive zero. The two compare equal as floats, so always test with
//! [`is_missing`].
//!
//! ```no_run
//! use hpc_ts::TimeSeries;
//! use time::macros::datetime;
//!
//! let start = datetime!(2017-08-27 00:00 UTC);
//! let end = datetime!(2017-08-28 00:00 UTC);
//! let mut ts = TimeSeries::new("/bytes/readrates", start, end, 10)?;
//! ts.insert_element(start, "bb01", 1024.0);
//! # Ok::<(), hpc_ts::Error>(())
//! ```

use log::warn;
use time::OffsetDateTime;

use crate::columns::ColumnIndex;
use crate::container::Attrs;
use crate::deltas::counter_deltas;
use crate::grid::Grid;
use crate::natural::{natural_sorted, NameOrder};
use crate::{Error, Result};

/// Fill value of a cell that was never populated.
pub const MISSING: f64 = -0.0;

/// Default name of the per-group timestamp dataset.
pub const TIMESTAMP_KEY: &str = "timestamps";

/// True if `value` is the never-populated sentinel rather than a measurement.
#[inline]
pub fn is_missing(value: f64) -> bool {
    value == 0.0 && value.is_sign_negative()
}

/// One connector-produced sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: OffsetDateTime,
    pub entity: String,
    pub value: f64,
}

impl Observation {
    pub fn new(timestamp: OffsetDateTime, entity: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            entity: entity.into(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub(crate) dataset_name: String,
    pub(crate) timestamp_key: String,
    pub(crate) name_order: NameOrder,
    pub(crate) timestamps: Vec<i64>,
    pub(crate) time0: i64,
    pub(crate) timestep: i64,
    pub(crate) columns: ColumnIndex,
    pub(crate) dataset: Grid<f64>,
    pub(crate) group_metadata: Attrs,
    pub(crate) dataset_metadata: Attrs,
}

impl TimeSeries {
    /// Allocate a fresh grid covering `[start, end)` in steps of `timestep`
    /// seconds with no columns.
    ///
    /// The grid has `floor((end - start) / timestep)` rows.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRange`: `timestep` is not positive or `end < start`
    pub fn new(
        dataset_name: impl Into<String>,
        start: OffsetDateTime,
        end: OffsetDateTime,
        timestep: i64,
    ) -> Result<Self> {
        if timestep <= 0 {
            return Err(Error::InvalidRange(format!(
                "timestep must be positive, got {timestep}"
            )));
        }
        let time0 = start.unix_timestamp();
        let span = end.unix_timestamp() - time0;
        if span < 0 {
            return Err(Error::InvalidRange(format!("{start} is after {end}")));
        }
        let rows = (span / timestep) as usize;
        let timestamps = (0..rows as i64).map(|i| time0 + i * timestep).collect();

        Ok(Self {
            dataset_name: dataset_name.into(),
            timestamp_key: TIMESTAMP_KEY.to_string(),
            name_order: NameOrder::default(),
            timestamps,
            time0,
            timestep,
            columns: ColumnIndex::new(),
            dataset: Grid::filled(rows, 0, MISSING),
            group_metadata: Attrs::new(),
            dataset_metadata: Attrs::new(),
        })
    }

    /// Use a different name for the group's timestamp dataset.
    pub fn with_timestamp_key(mut self, key: impl Into<String>) -> Self {
        self.timestamp_key = key.into();
        self
    }

    /// Choose how numeric runs in column names are sorted.
    pub fn with_name_order(mut self, order: NameOrder) -> Self {
        self.name_order = order;
        self
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn timestamp_key(&self) -> &str {
        &self.timestamp_key
    }

    pub fn name_order(&self) -> NameOrder {
        self.name_order
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn time0(&self) -> i64 {
        self.time0
    }

    pub fn timestep(&self) -> i64 {
        self.timestep
    }

    pub fn num_rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    pub fn column_index(&self) -> &ColumnIndex {
        &self.columns
    }

    pub fn dataset(&self) -> &Grid<f64> {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Grid<f64> {
        &mut self.dataset
    }

    pub fn group_metadata(&self) -> &Attrs {
        &self.group_metadata
    }

    pub fn group_metadata_mut(&mut self) -> &mut Attrs {
        &mut self.group_metadata
    }

    pub fn dataset_metadata(&self) -> &Attrs {
        &self.dataset_metadata
    }

    pub fn dataset_metadata_mut(&mut self) -> &mut Attrs {
        &mut self.dataset_metadata
    }

    /// Value at (`row`, column `name`), if both exist.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.dataset.get(row, self.columns.position(name)?)
    }

    /// Append a column named `name` and return its index.
    ///
    /// Adding a name that already exists only warns; the result is a second
    /// column with the same name.
    pub fn add_column(&mut self, name: impl Into<String>) -> usize {
        let index = self.columns.push(name);
        while self.dataset.cols() <= index {
            self.dataset.push_column(MISSING);
        }
        index
    }

    /// Replace the column names wholesale. The matrix width is left alone.
    pub fn set_columns<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.set(names);
    }

    /// Swap two columns, data and names together.
    pub fn swap_columns(&mut self, a: usize, b: usize) {
        self.dataset.swap_columns(a, b);
        self.columns.swap(a, b);
    }

    /// Move columns so they follow `target_order`.
    ///
    /// Names in `target_order` that this series does not have are skipped
    /// with a warning. Columns not named in `target_order` end up wherever
    /// the swaps leave them.
    ///
    /// # Errors
    ///
    /// - `Error::ColumnOutOfRange`: a known column's current position or its
    ///   position in `target_order` lies beyond the matrix width
    pub fn rearrange_columns<S: AsRef<str>>(&mut self, target_order: &[S]) -> Result<()> {
        let width = self.dataset.cols().min(self.columns.len());
        for (new_index, name) in target_order.iter().enumerate() {
            let name = name.as_ref();
            let Some(old_index) = self.columns.position(name) else {
                warn!(
                    "column '{}' in new order not present in {}",
                    name, self.dataset_name
                );
                continue;
            };
            if new_index >= width || old_index >= width {
                return Err(Error::ColumnOutOfRange {
                    column: name.to_string(),
                    index: new_index.max(old_index),
                    width,
                });
            }
            self.swap_columns(old_index, new_index);
        }
        Ok(())
    }

    /// Sort columns by natural order of their names.
    pub fn sort_columns(&mut self) -> Result<()> {
        let target = natural_sorted(self.columns.names().iter().cloned(), self.name_order);
        self.rearrange_columns(&target)
    }

    /// Place `value` in the bin containing `timestamp` and column `entity`,
    /// creating the column if needed.
    ///
    /// Returns false, leaving the matrix untouched, if `timestamp` falls
    /// outside the grid.
    pub fn insert_element(&mut self, timestamp: OffsetDateTime, entity: &str, value: f64) -> bool {
        self.insert_epoch(timestamp.unix_timestamp(), entity, value, None::<fn(f64, f64) -> f64>)
    }

    /// Like [`insert_element`](Self::insert_element), with a reducer applied
    /// on the first write to a cell.
    ///
    /// If the target cell still holds [`MISSING`] the stored value becomes
    /// `reducer(MISSING, value)`. A cell that already holds a measurement is
    /// overwritten with `value` and the reducer is not called.
    pub fn insert_element_with<F>(
        &mut self,
        timestamp: OffsetDateTime,
        entity: &str,
        value: f64,
        reducer: Option<F>,
    ) -> bool
    where
        F: FnOnce(f64, f64) -> f64,
    {
        self.insert_epoch(timestamp.unix_timestamp(), entity, value, reducer)
    }

    /// Epoch-seconds form of [`insert_element_with`](Self::insert_element_with).
    pub fn insert_epoch<F>(
        &mut self,
        timestamp: i64,
        entity: &str,
        value: f64,
        reducer: Option<F>,
    ) -> bool
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let Some(row) = self.row_of(timestamp) else {
            return false;
        };

        let col = match self.columns.position(entity) {
            Some(col) => col,
            None => self.add_column(entity),
        };
        if col >= self.dataset.cols() {
            warn!(
                "column '{}' at {} has no data column in {} ({} wide)",
                entity,
                col,
                self.dataset_name,
                self.dataset.cols()
            );
            return false;
        }

        let cell = &mut self.dataset[(row, col)];
        *cell = match reducer {
            Some(reduce) if is_missing(*cell) => reduce(*cell, value),
            _ => value,
        };
        true
    }

    /// Feed a stream of observations, returning how many landed on the grid.
    pub fn extend_observations<I>(&mut self, observations: I) -> usize
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut placed = 0;
        for obs in observations {
            if self.insert_element(obs.timestamp, &obs.entity, obs.value) {
                placed += 1;
            } else {
                warn!(
                    "observation at {} for '{}' is outside {} ({} rows from {})",
                    obs.timestamp,
                    obs.entity,
                    self.dataset_name,
                    self.num_rows(),
                    self.time0
                );
            }
        }
        placed
    }

    /// Row index of the bin containing `timestamp`, if it is on the grid.
    pub fn row_of(&self, timestamp: i64) -> Option<usize> {
        let index = timestamp.checked_sub(self.time0)?.div_euclid(self.timestep);
        if index < 0 || index as usize >= self.num_rows() {
            return None;
        }
        Some(index as usize)
    }

    /// Per-cell test for the never-populated sentinel; `inverse` flips it to
    /// a presence map.
    pub fn missing_matrix(&self, inverse: bool) -> Grid<bool> {
        self.dataset.map(|v| is_missing(v) != inverse)
    }

    /// Number of cells never populated.
    pub fn missing_count(&self) -> usize {
        self.dataset.iter().filter(|v| is_missing(**v)).count()
    }

    /// Replace the counters with per-bin increments; see [`crate::deltas`].
    /// The last timestamp is dropped to keep the axis aligned.
    pub fn convert_to_deltas(&mut self) {
        self.dataset = counter_deltas(&self.dataset);
        self.timestamps.truncate(self.dataset.rows());
    }

    /// Drop the last `n` rows.
    pub fn trim_rows(&mut self, n: usize) {
        let keep = self.num_rows().saturating_sub(n);
        self.dataset.truncate_rows(keep);
        self.timestamps.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    fn ten_rows() -> TimeSeries {
        let start = datetime!(2018-01-01 00:00 UTC);
        TimeSeries::new("/g/d", start, start + Duration::seconds(100), 10).expect("series")
    }

    #[test]
    fn fresh_series_has_full_grid() {
        let ts = ten_rows();
        assert_eq!(ts.num_rows(), 10);
        assert_eq!(ts.timestep(), 10);
        assert_eq!(ts.timestamps()[9] - ts.timestamps()[0], 90);
        assert!(ts.columns().is_empty());
    }

    #[test]
    fn partial_trailing_bin_is_dropped() {
        let start = datetime!(2018-01-01 00:00 UTC);
        let ts = TimeSeries::new("/g/d", start, start + Duration::seconds(25), 10).expect("series");
        assert_eq!(ts.timestamps(), &[ts.time0(), ts.time0() + 10]);
    }

    #[test]
    fn rejects_bad_ranges() {
        let start = datetime!(2018-01-01 00:00 UTC);
        assert!(TimeSeries::new("/g/d", start, start, 0).is_err());
        assert!(TimeSeries::new("/g/d", start, start - Duration::seconds(1), 10).is_err());
    }

    #[test]
    fn sentinel_coverage() {
        let mut ts = ten_rows();
        for name in ["c0", "c1", "c2"] {
            ts.add_column(name);
        }
        assert!(ts.missing_matrix(false).iter().all(|m| *m));
        assert_eq!(ts.missing_count(), 30);

        let t2 = OffsetDateTime::from_unix_timestamp(ts.time0() + 20).expect("ts");
        assert!(ts.insert_element(t2, "c1", 0.0));

        let missing = ts.missing_matrix(false);
        for row in 0..10 {
            for col in 0..3 {
                assert_eq!(missing[(row, col)], !(row == 2 && col == 1));
            }
        }
        let present = ts.missing_matrix(true);
        assert!(present[(2, 1)]);
        assert_eq!(ts.missing_count(), 29);
    }

    #[test]
    fn insert_out_of_bounds_is_a_no_op() {
        let mut ts = ten_rows();
        ts.add_column("c0");
        let before = ts.dataset().clone();

        let early = OffsetDateTime::from_unix_timestamp(ts.time0() - 10).expect("ts");
        let late = OffsetDateTime::from_unix_timestamp(ts.time0() + 100).expect("ts");
        assert!(!ts.insert_element(early, "c0", 1.0));
        assert!(!ts.insert_element(late, "c0", 1.0));
        assert!(!ts.insert_element(late, "new", 1.0));
        assert_eq!(ts.dataset(), &before);
        assert_eq!(ts.columns(), &["c0"]);
    }

    #[test]
    fn insert_creates_columns_and_bins_by_floor() {
        let mut ts = ten_rows();
        let t = OffsetDateTime::from_unix_timestamp(ts.time0() + 39).expect("ts");
        assert!(ts.insert_element(t, "bb2", 4.0));
        assert_eq!(ts.columns(), &["bb2"]);
        assert_eq!(ts.value(3, "bb2"), Some(4.0));
    }

    #[test]
    fn reducer_applies_only_to_unpopulated_cells() {
        let mut ts = ten_rows();
        let t = OffsetDateTime::from_unix_timestamp(ts.time0()).expect("ts");
        let mut seen = Vec::new();

        assert!(ts.insert_element_with(
            t,
            "c",
            5.0,
            Some(|old: f64, new: f64| {
                seen.push(old);
                new * 2.0
            })
        ));
        assert_eq!(ts.value(0, "c"), Some(10.0));
        assert_eq!(seen.len(), 1);
        assert!(is_missing(seen[0]));

        // populated cell: plain overwrite, reducer untouched
        assert!(ts.insert_element_with(t, "c", 3.0, Some(|_: f64, _: f64| -> f64 {
            panic!("reducer must not run on a populated cell")
        })));
        assert_eq!(ts.value(0, "c"), Some(3.0));
    }

    #[test]
    fn duplicate_column_is_not_deduplicated() {
        let mut ts = ten_rows();
        assert_eq!(ts.add_column("a"), 0);
        assert_eq!(ts.add_column("a"), 1);
        assert_eq!(ts.columns(), &["a", "a"]);
        assert_eq!(ts.dataset().cols(), 2);
    }

    #[test]
    fn rearrange_moves_data_with_names() {
        let mut ts = ten_rows();
        let t = OffsetDateTime::from_unix_timestamp(ts.time0()).expect("ts");
        ts.insert_element(t, "a", 1.0);
        ts.insert_element(t, "b", 2.0);
        ts.insert_element(t, "c", 3.0);

        ts.rearrange_columns(&["c", "a"]).expect("rearrange");
        assert_eq!(ts.columns(), &["c", "a", "b"]);
        assert_eq!(ts.dataset()[(0, 0)], 3.0);
        assert_eq!(ts.dataset()[(0, 1)], 1.0);
        assert_eq!(ts.dataset()[(0, 2)], 2.0);
        assert_eq!(ts.column_index().position("b"), Some(2));
    }

    #[test]
    fn rearrange_skips_unknown_names() {
        let mut ts = ten_rows();
        ts.add_column("a");
        ts.add_column("b");
        ts.rearrange_columns(&["b", "a", "zz"]).expect("rearrange");
        assert_eq!(ts.columns(), &["b", "a"]);
    }

    #[test]
    fn rearrange_fails_when_position_exceeds_width() {
        let mut ts = ten_rows();
        ts.add_column("a");
        ts.add_column("c");
        let err = ts.rearrange_columns(&["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, Error::ColumnOutOfRange { index: 2, .. }));
    }

    #[test]
    fn extreme_epochs_are_off_grid() {
        let mut ts = ten_rows();
        assert_eq!(ts.row_of(i64::MIN), None);
        assert_eq!(ts.row_of(i64::MAX), None);
        assert!(!ts.insert_epoch(i64::MIN, "a", 1.0, None::<fn(f64, f64) -> f64>));
        assert_eq!(ts.missing_count(), 0);
    }

    #[test]
    fn rearrange_fails_for_name_without_data_column() {
        let mut ts = ten_rows();
        ts.add_column("x");
        ts.set_columns(["x", "y"]);
        let err = ts.rearrange_columns(&["y"]).unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnOutOfRange {
                index: 1,
                width: 1,
                ..
            }
        ));
        assert_eq!(ts.dataset().cols(), 1);
    }

    #[test]
    fn sort_columns_is_natural() {
        let mut ts = ten_rows();
        for name in ["bb10", "bb2", "bb1"] {
            ts.add_column(name);
        }
        ts.sort_columns().expect("sort");
        assert_eq!(ts.columns(), &["bb1", "bb2", "bb10"]);
    }

    #[test]
    fn set_columns_leaves_width() {
        let mut ts = ten_rows();
        ts.add_column("a");
        ts.set_columns(["x", "y"]);
        assert_eq!(ts.columns(), &["x", "y"]);
        assert_eq!(ts.dataset().cols(), 1);
        assert_eq!(ts.column_index().position("y"), Some(1));
    }

    #[test]
    fn deltas_shorten_axis() {
        let mut ts = ten_rows();
        let step = ts.timestep();
        for row in 0..10 {
            ts.insert_epoch(
                ts.time0() + row * step,
                "ctr",
                (row * 100) as f64 + 100.0,
                None::<fn(f64, f64) -> f64>,
            );
        }
        ts.convert_to_deltas();
        assert_eq!(ts.num_rows(), 9);
        assert_eq!(ts.dataset().rows(), 9);
        assert!(ts.dataset().column(0).iter().all(|v| *v == 100.0));
    }

    #[test]
    fn trim_rows_drops_tail() {
        let mut ts = ten_rows();
        ts.add_column("a");
        ts.trim_rows(3);
        assert_eq!(ts.num_rows(), 7);
        assert_eq!(ts.dataset().shape(), [7, 1]);
        ts.trim_rows(20);
        assert_eq!(ts.num_rows(), 0);
    }

    #[test]
    fn extend_counts_placed_observations() {
        let mut ts = ten_rows();
        let base = datetime!(2018-01-01 00:00 UTC);
        let placed = ts.extend_observations([
            Observation::new(base, "a", 1.0),
            Observation::new(base + Duration::seconds(50), "b", 2.0),
            Observation::new(base + Duration::seconds(500), "c", 3.0),
        ]);
        assert_eq!(placed, 2);
        assert_eq!(ts.columns(), &["a", "b"]);
    }
}
