//! Archive configuration.
//!
//! Resolved once by the caller and handed to queries as a [`DailyLayout`];
//! nothing in the engine reads the environment on its own.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::{DailyLayout, DEFAULT_DATE_FORMAT};
use crate::{Error, Result};

/// Environment variable naming the archive base directory.
pub const BASE_DIR_ENV: &str = "HPCTS_BASE_DIR";

/// Environment variable overriding the date directory format.
pub const DATE_FORMAT_ENV: &str = "HPCTS_DATE_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding one subdirectory per day.
    /// Default: current directory
    pub base_dir: PathBuf,

    /// `time` format description of the per-day directory.
    /// Default: `[year]-[month]-[day]`
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            date_format: default_date_format(),
        }
    }
}

impl ArchiveConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `HPCTS_BASE_DIR` and `HPCTS_DATE_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base_dir) = lookup(BASE_DIR_ENV) {
            config.base_dir = PathBuf::from(base_dir);
        }
        if let Some(date_format) = lookup(DATE_FORMAT_ENV) {
            config.date_format = date_format;
        }
        config
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn layout(&self) -> Result<DailyLayout> {
        Ok(DailyLayout::new(&self.base_dir).with_date_format(&self.date_format)?)
    }
}
