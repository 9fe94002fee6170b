//! Range queries across per-day containers.
//!
//! A logical series lives in one container per calendar day, found through a
//! [`DailyLayout`]. Every query takes a half-open `[start, end)` range, walks
//! the UTC days it touches, and opens each existing container in turn. Days
//! without a container are skipped.

pub mod orientation;
mod table;

use std::ops::Range;
use std::path::PathBuf;

use log::debug;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::container::{join_name, parent_group, AttrValue, Attrs, Container, COLUMNS_ATTR};
use crate::layout::DailyLayout;
use crate::timeseries::TIMESTAMP_KEY;
use crate::{Error, Result};

pub use orientation::{NdArray, Orientation};
use orientation::time_major_slice;
pub use table::TimeTable;

/// One existing container and the rows of it that fall inside a query range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSlice {
    pub date: Date,
    pub path: PathBuf,
    pub rows: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct RangeQuery<'a> {
    layout: &'a DailyLayout,
    file_name: String,
    timestamp_key: String,
}

impl<'a> RangeQuery<'a> {
    /// Query containers named `file_name` under `layout`.
    pub fn new(layout: &'a DailyLayout, file_name: impl Into<String>) -> Self {
        Self {
            layout,
            file_name: file_name.into(),
            timestamp_key: TIMESTAMP_KEY.to_string(),
        }
    }

    pub fn with_timestamp_key(mut self, key: impl Into<String>) -> Self {
        self.timestamp_key = key.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Existing containers for every UTC day from `start` through `end`
    /// inclusive, in date order.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRange`: `end` precedes `start`
    /// - `Error::Layout`: the file name or date format yields an invalid path
    pub fn enumerate_containers(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<(Date, PathBuf)>> {
        check_range(start, end)?;
        let last = utc_date(end);
        let mut day = utc_date(start);
        let mut found = Vec::new();
        loop {
            let path = self.layout.container_path(day, &self.file_name)?;
            if path.is_file() {
                found.push((day, path));
            } else {
                debug!("no container for {day} at {}", path.display());
            }
            if day >= last {
                break;
            }
            day = match day.next_day() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(found)
    }

    /// Containers holding at least one row of `dataset` inside `[start, end)`,
    /// with the local row range of each.
    pub fn files_and_indices(
        &self,
        dataset: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<ContainerSlice>> {
        let (t0, t1) = (start.unix_timestamp(), end.unix_timestamp());
        let mut slices = Vec::new();
        for (date, path) in self.enumerate_containers(start, end)? {
            let container = Container::open(&path)?;
            let rows = self.local_rows(&container, dataset, t0, t1)?;
            if rows.is_empty() {
                continue;
            }
            slices.push(ContainerSlice { date, path, rows });
        }
        Ok(slices)
    }

    /// Concatenate the rows of `dataset` inside `[start, end)` across days.
    ///
    /// Each container is read in its own orientation and the result is always
    /// time-major. Returns `None` when no container holds a row in range.
    ///
    /// # Errors
    ///
    /// - `Error::InconsistentMetadata`: the `columns` attribute of `dataset`
    ///   differs between containers
    /// - `Error::ShapeMismatch`: non-time dimensions differ between containers
    pub fn dataset_from_time_range(
        &self,
        dataset: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Option<NdArray>> {
        let (t0, t1) = (start.unix_timestamp(), end.unix_timestamp());
        let mut result: Option<NdArray> = None;
        let mut columns: Option<Option<AttrValue>> = None;

        for (_, path) in self.enumerate_containers(start, end)? {
            let container = Container::open(&path)?;
            let rows = self.local_rows(&container, dataset, t0, t1)?;
            if rows.is_empty() {
                continue;
            }
            let ds = container.require(dataset)?;

            let these = ds.attrs().get(COLUMNS_ATTR).cloned();
            match &columns {
                Some(expected) if *expected != these => {
                    return Err(Error::InconsistentMetadata {
                        key: COLUMNS_ATTR.to_string(),
                        path: path.display().to_string(),
                    });
                }
                Some(_) => {}
                None => columns = Some(these),
            }

            let orientation = Orientation::of(&container)?;
            let slice = time_major_slice(ds, orientation, rows.clone(), dataset)?;
            debug!(
                "added {} rows {}..{} ({:?})",
                path.display(),
                rows.start,
                rows.end,
                orientation
            );
            result = Some(match result.take() {
                Some(mut acc) => {
                    acc.append_time(slice, dataset)?;
                    acc
                }
                None => slice,
            });
        }
        Ok(result)
    }

    /// Merge `dataset` from every container into one table keyed by time and
    /// restricted to `[start, end)`.
    ///
    /// Later days overwrite earlier ones where timestamps overlap.
    pub fn table_from_time_range(
        &self,
        dataset: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<TimeTable> {
        let (t0, t1) = (start.unix_timestamp(), end.unix_timestamp());
        let mut merged = TimeTable::default();
        for (_, path) in self.enumerate_containers(start, end)? {
            let container = Container::open(&path)?;
            let mut table = TimeTable::from_container(&container, dataset, &self.timestamp_key)?;
            table.retain_range(t0, t1);
            debug!("merged {} rows from {}", table.len(), path.display());
            merged.merge(table);
        }
        Ok(merged)
    }

    /// Attributes that must agree across every container holding rows of
    /// `dataset` inside `[start, end)`.
    ///
    /// Each key is `(object, attribute)` where `object` names a dataset or a
    /// group. The result is keyed by attribute name. Containers the data
    /// query would skip are not consulted.
    ///
    /// # Errors
    ///
    /// - `Error::InconsistentMetadata`: an attribute is absent from a
    ///   container or differs from the first container's value
    pub fn metadata_from_time_range(
        &self,
        dataset: &str,
        keys: &[(&str, &str)],
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Attrs> {
        let (t0, t1) = (start.unix_timestamp(), end.unix_timestamp());
        let mut result = Attrs::new();
        let mut first = true;
        for (_, path) in self.enumerate_containers(start, end)? {
            let container = Container::open(&path)?;
            if self.local_rows(&container, dataset, t0, t1)?.is_empty() {
                continue;
            }
            for (object, attr) in keys {
                let inconsistent = || Error::InconsistentMetadata {
                    key: format!("{object}:{attr}"),
                    path: path.display().to_string(),
                };
                let attrs = match container.dataset(object) {
                    Some(ds) => Some(ds.attrs()),
                    None => container.group_attrs(object),
                };
                let value = attrs.and_then(|a| a.get(*attr)).ok_or_else(inconsistent)?;
                if first {
                    result.insert(attr.to_string(), value.clone());
                } else if result.get(*attr) != Some(value) {
                    return Err(inconsistent());
                }
            }
            first = false;
        }
        Ok(result)
    }

    /// Rows of `dataset` in `container` with timestamps in `[t0, t1)`.
    fn local_rows(
        &self,
        container: &Container,
        dataset: &str,
        t0: i64,
        t1: i64,
    ) -> Result<Range<usize>> {
        let group = parent_group(dataset);
        let timestamps = container
            .dataset(&join_name(&group, &self.timestamp_key))
            .ok_or_else(|| Error::MissingTimestamps { group })?
            .as_i64()
            .ok_or(Error::Corrupt("timestamp dataset is not 1-D integer"))?;
        let i0 = timestamps.partition_point(|t| *t < t0);
        let i1 = timestamps.partition_point(|t| *t < t1);
        Ok(i0..i1.max(i0))
    }
}

fn check_range(start: OffsetDateTime, end: OffsetDateTime) -> Result<()> {
    if end < start {
        return Err(Error::InvalidRange(format!("end {end} precedes start {start}")));
    }
    Ok(())
}

fn utc_date(instant: OffsetDateTime) -> Date {
    instant.to_offset(UtcOffset::UTC).date()
}
