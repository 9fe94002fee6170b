//! Moving a [`TimeSeries`] in and out of a [`Container`].
//!
//! A container group holds one timestamp dataset shared by every data dataset
//! in the group. Committing a matrix whose time axis differs from the group's
//! is refused: the engine never merges divergent time grids.

use log::{debug, info, warn};
use time::OffsetDateTime;

use crate::columns::ColumnIndex;
use crate::container::{
    join_name, normalize_name, parent_group, AttrValue, Attrs, Container, DType, Values,
    COLUMNS_ATTR, VERSION_ATTR,
};
use crate::grid::Grid;
use crate::natural::NameOrder;
use crate::query::orientation::{time_len, time_major_slice, Orientation};
use crate::timeseries::{TimeSeries, MISSING, TIMESTAMP_KEY};
use crate::{Error, Result};

/// Schema version written by this engine (time on axis 0).
pub const SCHEMA_VERSION: i64 = 2;

/// Dataset attribute recording the last commit, in epoch seconds.
pub const UPDATED_ATTR: &str = "updated";

impl TimeSeries {
    /// Attach to `dataset_name` in `container`: its group's timestamps and
    /// metadata, then the dataset itself.
    pub fn attach(container: &Container, dataset_name: &str) -> Result<Self> {
        Self::attach_with_key(container, dataset_name, TIMESTAMP_KEY)
    }

    pub fn attach_with_key(
        container: &Container,
        dataset_name: &str,
        timestamp_key: &str,
    ) -> Result<Self> {
        let mut series = Self::attach_group(container, &parent_group(dataset_name), timestamp_key)?;
        series.attach_dataset(container, dataset_name)?;
        Ok(series)
    }

    /// Attach to a group's time axis and metadata only. The returned series
    /// has no columns and is named after the group until a dataset is attached.
    ///
    /// # Errors
    ///
    /// - `Error::MissingTimestamps`: the group has no timestamp dataset
    /// - `Error::Corrupt`: the timestamps are not 1-D integers, have fewer
    ///   than two samples, or do not increase
    pub fn attach_group(container: &Container, group: &str, timestamp_key: &str) -> Result<Self> {
        let group = normalize_name(group);
        let ts_name = join_name(&group, timestamp_key);
        let Some(dataset) = container.dataset(&ts_name) else {
            return Err(Error::MissingTimestamps { group });
        };
        let timestamps = match (dataset.ndim(), dataset.as_i64()) {
            (1, Some(values)) => values.to_vec(),
            _ => return Err(Error::Corrupt("timestamp dataset is not 1-D integer")),
        };
        if timestamps.len() < 2 {
            return Err(Error::Corrupt("time axis needs at least two samples"));
        }
        debug!(
            "attached to {} with {} timestamps",
            group,
            timestamps.len()
        );

        let time0 = timestamps[0];
        let timestep = timestamps[1] - timestamps[0];
        if timestep <= 0 {
            return Err(Error::Corrupt("timestamps are not strictly increasing"));
        }
        let rows = timestamps.len();
        Ok(Self {
            dataset_name: group.clone(),
            timestamp_key: timestamp_key.to_string(),
            name_order: NameOrder::default(),
            timestamps,
            time0,
            timestep,
            columns: ColumnIndex::new(),
            dataset: Grid::filled(rows, 0, MISSING),
            group_metadata: container.group_attrs(&group).cloned().unwrap_or_default(),
            dataset_metadata: Attrs::new(),
        })
    }

    /// Load a 2-D float dataset into this series, with its column names and
    /// attributes. Legacy (time on axis 1) datasets are transposed.
    ///
    /// Extra column names beyond the data width are dropped with a warning;
    /// a dataset without column names only warns.
    pub fn attach_dataset(&mut self, container: &Container, dataset_name: &str) -> Result<()> {
        let name = normalize_name(dataset_name);
        let dataset = container.require(&name)?;
        if dataset.as_f64().is_none() {
            return Err(Error::Corrupt("data dataset is not 8-byte float"));
        }
        if dataset.ndim() != 2 {
            return Err(Error::InvalidDimensions {
                dataset: name,
                ndim: dataset.ndim(),
            });
        }

        let orientation = Orientation::of(container)?;
        let steps = time_len(dataset, orientation);
        if steps != self.num_rows() {
            return Err(Error::ShapeMismatch {
                dataset: name,
                expected: vec![self.num_rows()],
                found: dataset.shape().to_vec(),
            });
        }
        let slice = time_major_slice(dataset, orientation, 0..steps, &name)?;
        let width = slice.shape()[1];
        self.dataset = Grid::from_row_major(steps, width, slice.data())
            .ok_or(Error::Corrupt("dataset size does not match shape"))?;
        self.columns = ColumnIndex::new();
        self.dataset_name = name;

        match dataset.attrs().get(COLUMNS_ATTR).and_then(AttrValue::as_str_list) {
            Some(mut names) => {
                if names.len() > width {
                    let truncated = names.split_off(width);
                    warn!(
                        "{} has {} column names but {} columns; truncating {}",
                        self.dataset_name,
                        width + truncated.len(),
                        width,
                        truncated.join(", ")
                    );
                }
                for column in names {
                    self.add_column(column);
                }
            }
            None => warn!("attaching to a columnless dataset ({})", self.dataset_name),
        }

        self.dataset_metadata = dataset.attrs().clone();
        Ok(())
    }

    /// Write this series into `container` (in memory; call
    /// [`Container::flush`] to persist).
    ///
    /// Columns are reordered to match a dataset that already exists, or
    /// sorted naturally on first write, so repeated commits keep a stable
    /// column order on disk.
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedVersion`: the container stores time on axis 1
    /// - `Error::TimestampMismatch`: the group's time axis differs
    /// - `Error::ShapeMismatch`: the dataset exists with another shape
    /// - `Error::ColumnOutOfRange`: the on-disk column order cannot be applied
    /// - `Error::Corrupt`: the `version` attribute is not a valid integer
    ///
    /// On error neither the container nor the series is modified.
    pub fn commit(&mut self, container: &mut Container) -> Result<()> {
        // Validate against the container first; nothing is written on error.
        let stamp_version = check_schema(container)?;

        let group = parent_group(&self.dataset_name);
        let ts_name = join_name(&group, &self.timestamp_key);
        let existing_timestamps = container.dataset(&ts_name);
        if let Some(existing) = existing_timestamps {
            if existing.as_i64() != Some(self.timestamps.as_slice()) {
                warn!(
                    "{} has shape {:?} but must fit into {:?}",
                    self.dataset_name,
                    [self.num_rows()],
                    existing.shape()
                );
                return Err(Error::TimestampMismatch {
                    dataset: self.dataset_name.clone(),
                });
            }
        }
        let write_timestamps = existing_timestamps.is_none();

        let shape = self.dataset.shape();
        let dataset_name = self.dataset_name.clone();
        let on_disk = match container.dataset(&dataset_name) {
            Some(existing) if existing.shape() != shape || existing.dtype() != DType::F64 => {
                return Err(Error::ShapeMismatch {
                    dataset: dataset_name,
                    expected: shape.to_vec(),
                    found: existing.shape().to_vec(),
                });
            }
            Some(existing) => existing.attrs().get(COLUMNS_ATTR).and_then(AttrValue::as_str_list),
            None => None,
        };

        let mut staged = self.clone();
        match &on_disk {
            Some(order) => staged.rearrange_columns(order)?,
            None => staged.sort_columns()?,
        }
        *self = staged;

        if stamp_version {
            container
                .group_attrs_mut("/")
                .insert(VERSION_ATTR.to_string(), SCHEMA_VERSION.into());
        }
        if write_timestamps {
            let ds = container.create_dataset(&ts_name, DType::I64, &[self.num_rows()])?;
            ds.write(&ts_name, Values::Int(self.timestamps.clone()))?;
        }
        container
            .group_attrs_mut(&group)
            .extend(self.group_metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        let ds = container.create_dataset(&dataset_name, DType::F64, &shape)?;
        ds.write(&dataset_name, Values::Float(self.dataset.to_row_major()))?;

        let columns: AttrValue = self.columns().into();
        self.dataset_metadata.insert(COLUMNS_ATTR.to_string(), columns);
        self.dataset_metadata.insert(
            UPDATED_ATTR.to_string(),
            OffsetDateTime::now_utc().unix_timestamp().into(),
        );
        ds.attrs_mut()
            .extend(self.dataset_metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        info!(
            "committed {} of shape {:?} to {}",
            dataset_name,
            shape,
            container.path().display()
        );
        Ok(())
    }
}

/// Whether `container` accepts time-major data. Returns true when it is
/// fresh and still needs the current schema version stamped.
fn check_schema(container: &Container) -> Result<bool> {
    if container.root_attrs().contains_key(VERSION_ATTR) {
        let version = container.version()?;
        if i64::from(version) >= SCHEMA_VERSION {
            return Ok(false);
        }
        return Err(Error::UnsupportedVersion(version));
    }
    if container.dataset_names().next().is_some() {
        return Err(Error::UnsupportedVersion(1));
    }
    Ok(true)
}
