use thiserror::Error;

use crate::layout::LayoutError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt container: {0}")]
    Corrupt(&'static str),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("group '{group}' has no timestamp dataset")]
    MissingTimestamps { group: String },
    #[error("timestamps of '{dataset}' do not match the container's time axis")]
    TimestampMismatch { dataset: String },
    #[error("dataset '{dataset}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        dataset: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("column '{column}' cannot move to index {index} of a {width}-column matrix")]
    ColumnOutOfRange {
        column: String,
        index: usize,
        width: usize,
    },
    #[error("attribute '{key}' differs in {path}")]
    InconsistentMetadata { key: String, path: String },
    #[error("dataset '{0}' not found")]
    MissingDataset(String),
    #[error("dataset '{dataset}' has {ndim} dimensions; at most 3 are supported")]
    InvalidDimensions { dataset: String, ndim: usize },
    #[error("invalid time range: {0}")]
    InvalidRange(String),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
