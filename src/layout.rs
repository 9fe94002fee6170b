//! Where per-day containers live: `<base_dir>/<formatted date>/<file_name>`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use time::format_description;
use time::Date;

/// Default date directory format (`2017-08-27`).
pub const DEFAULT_DATE_FORMAT: &str = "[year]-[month]-[day]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    EmptyComponent { field: &'static str },
    InvalidComponent { field: &'static str, value: String },
    InvalidDateFormat { value: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyComponent { field } => {
                write!(f, "empty path component: {field}")
            }
            LayoutError::InvalidComponent { field, value } => {
                write!(f, "invalid path component for {field}: {value}")
            }
            LayoutError::InvalidDateFormat { value } => {
                write!(f, "invalid date format description: {value}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLayout {
    base_dir: PathBuf,
    date_format: String,
}

impl DailyLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Use a `time` format description for the date directory. It may contain
    /// `/` to nest directories (`[year]/[month]/[day]`).
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Result<Self> {
        let date_format = date_format.into();
        format_description::parse(&date_format).map_err(|_| LayoutError::InvalidDateFormat {
            value: date_format.clone(),
        })?;
        self.date_format = date_format;
        Ok(self)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn date_dir(&self, date: Date) -> Result<PathBuf> {
        let invalid = || LayoutError::InvalidDateFormat {
            value: self.date_format.clone(),
        };
        let items = format_description::parse(&self.date_format).map_err(|_| invalid())?;
        let formatted = date.format(&items).map_err(|_| invalid())?;
        let relative = Path::new(&formatted);
        if formatted.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(LayoutError::InvalidComponent {
                field: "date",
                value: formatted,
            });
        }
        Ok(self.base_dir.join(relative))
    }

    pub fn container_path(&self, date: Date, file_name: &str) -> Result<PathBuf> {
        validate_component("file_name", file_name)?;
        Ok(self.date_dir(date)?.join(file_name))
    }
}

fn validate_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LayoutError::EmptyComponent { field });
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    if value.contains('\0') {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
