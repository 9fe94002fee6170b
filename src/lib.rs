//! Fixed-cadence time series for HPC facility telemetry.
//!
//! Observations are accumulated into a [`TimeSeries`] matrix (time rows by
//! entity columns, `-0.0` marking cells never measured), committed into one
//! [`Container`] file per calendar day, and read back across any number of
//! days with a [`RangeQuery`].

pub mod columns;
pub mod config;
pub mod container;
pub mod deltas;
pub mod error;
pub mod grid;
pub mod layout;
pub mod natural;
pub mod persist;
pub mod query;
pub mod timeseries;

pub use config::ArchiveConfig;
pub use container::{
    AttrValue, Attrs, Container, DType, Dataset, Values, COLUMNS_ATTR, VERSION_ATTR,
};
pub use error::{Error, Result};
pub use grid::Grid;
pub use layout::{DailyLayout, LayoutError};
pub use natural::{natural_cmp, natural_sorted, NameOrder};
pub use persist::SCHEMA_VERSION;
pub use query::{ContainerSlice, NdArray, Orientation, RangeQuery, TimeTable};
pub use timeseries::{is_missing, Observation, TimeSeries, MISSING, TIMESTAMP_KEY};
