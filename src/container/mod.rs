//! Persisted container: one file holding a tree of groups and n-dimensional
//! datasets, each with attributes.
//!
//! Names are slash-separated paths (`/bytes/readrates`); the root group is
//! `/`. A container is read fully on [`Container::open`] and written whole on
//! [`Container::flush`], so a handle never holds the file open between calls.
//!
//! Concurrent writers to one container are not coordinated; the last flush
//! wins.

mod attr;
pub mod format;
mod mmap;

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub use attr::{AttrValue, Attrs};
use mmap::MappedFile;

use crate::{Error, Result};

/// Root-group attribute selecting the on-disk axis orientation.
pub const VERSION_ATTR: &str = "version";

/// Attribute carrying the entity name of each non-time column.
pub const COLUMNS_ATTR: &str = "columns";

/// Element type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "i8")]
    I64,
    #[serde(rename = "f8")]
    F64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Values {
    fn zeroed(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::I64 => Values::Int(vec![0; len]),
            DType::F64 => Values::Float(vec![0.0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub(crate) shape: Vec<usize>,
    pub(crate) values: Values,
    pub(crate) attrs: Attrs,
}

impl Dataset {
    pub(crate) fn new(shape: Vec<usize>, values: Values) -> Self {
        Self {
            shape,
            values,
            attrs: Attrs::new(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn dtype(&self) -> DType {
        match self.values {
            Values::Int(_) => DType::I64,
            Values::Float(_) => DType::F64,
        }
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            Values::Float(v) => Some(v),
            Values::Int(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.values {
            Values::Int(v) => Some(v),
            Values::Float(_) => None,
        }
    }

    /// Values widened to `f64`, in row-major order.
    pub fn to_f64(&self) -> Vec<f64> {
        match &self.values {
            Values::Float(v) => v.clone(),
            Values::Int(v) => v.iter().map(|x| *x as f64).collect(),
        }
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    /// Overwrite every element; `values` must match the dataset's shape and dtype.
    pub fn write(&mut self, name: &str, values: Values) -> Result<()> {
        if values.len() != self.values.len() || self.dtype() != dtype_of(&values) {
            return Err(Error::ShapeMismatch {
                dataset: name.to_string(),
                expected: self.shape.clone(),
                found: vec![values.len()],
            });
        }
        self.values = values;
        Ok(())
    }
}

fn dtype_of(values: &Values) -> DType {
    match values {
        Values::Int(_) => DType::I64,
        Values::Float(_) => DType::F64,
    }
}

/// Canonical absolute form of a group or dataset name.
pub fn normalize_name(name: &str) -> String {
    let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// Group that holds `name` (`/` for top-level names).
pub fn parent_group(name: &str) -> String {
    let name = normalize_name(name);
    match name.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => name[..idx].to_string(),
    }
}

/// Join a group and a child name.
pub fn join_name(group: &str, child: &str) -> String {
    normalize_name(&format!("{group}/{child}"))
}

#[derive(Debug, Clone)]
pub struct Container {
    path: PathBuf,
    groups: BTreeMap<String, Attrs>,
    datasets: BTreeMap<String, Dataset>,
}

impl Container {
    /// New, empty container bound to `path`. Nothing touches disk until
    /// [`flush`](Self::flush).
    pub fn create(path: impl Into<PathBuf>) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("/".to_string(), Attrs::new());
        Self {
            path: path.into(),
            groups,
            datasets: BTreeMap::new(),
        }
    }

    /// Read an existing container.
    ///
    /// # Errors
    ///
    /// - `Error::Io`: the file cannot be read
    /// - `Error::Corrupt`: bad magic, checksum, manifest, or block
    /// - `Error::UnsupportedVersion`: unknown container format version
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = MappedFile::open(path)?;
        let (mut groups, datasets) = format::decode(file.as_slice())?;
        groups.entry("/".to_string()).or_default();
        debug!(
            "opened {} ({} bytes, {} datasets)",
            path.display(),
            file.len(),
            datasets.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            groups,
            datasets,
        })
    }

    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::create(path))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the container to its path (temp file, sync, rename).
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = format::encode(&self.groups, &self.datasets)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        info!(
            "wrote {} ({} bytes, {} datasets)",
            self.path.display(),
            bytes.len(),
            self.datasets.len()
        );
        Ok(())
    }

    /// Schema version from the root group; absent means 1.
    ///
    /// # Errors
    ///
    /// - `Error::Corrupt`: the attribute is not an integer in `u32` range
    pub fn version(&self) -> Result<u32> {
        match self.root_attrs().get(VERSION_ATTR) {
            None => Ok(1),
            Some(value) => value
                .as_int()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(Error::Corrupt("invalid version attribute")),
        }
    }

    pub fn root_attrs(&self) -> &Attrs {
        &self.groups["/"]
    }

    pub fn group_attrs(&self, group: &str) -> Option<&Attrs> {
        self.groups.get(&normalize_name(group))
    }

    /// Attributes of `group`, creating the group (and its ancestors) if needed.
    pub fn group_attrs_mut(&mut self, group: &str) -> &mut Attrs {
        let group = normalize_name(group);
        self.ensure_groups(&group);
        self.groups.entry(group).or_default()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(&normalize_name(group))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(&normalize_name(name))
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(&normalize_name(name))
    }

    pub fn dataset_mut(&mut self, name: &str) -> Option<&mut Dataset> {
        self.datasets.get_mut(&normalize_name(name))
    }

    /// Dataset `name`, or `Error::MissingDataset`.
    pub fn require(&self, name: &str) -> Result<&Dataset> {
        self.dataset(name)
            .ok_or_else(|| Error::MissingDataset(format!("{}:{}", self.path.display(), name)))
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Create a zero-filled dataset unless one already exists.
    ///
    /// # Errors
    ///
    /// - `Error::ShapeMismatch`: `name` exists with a different shape or dtype
    pub fn create_dataset(
        &mut self,
        name: &str,
        dtype: DType,
        shape: &[usize],
    ) -> Result<&mut Dataset> {
        let name = normalize_name(name);
        if let Some(existing) = self.datasets.get(&name) {
            if existing.shape != shape || existing.dtype() != dtype {
                return Err(Error::ShapeMismatch {
                    dataset: name,
                    expected: shape.to_vec(),
                    found: existing.shape.clone(),
                });
            }
        } else {
            self.ensure_groups(&parent_group(&name));
        }
        let len = shape.iter().product();
        Ok(self
            .datasets
            .entry(name)
            .or_insert_with(|| Dataset::new(shape.to_vec(), Values::zeroed(dtype, len))))
    }

    /// Insert a dataset, replacing any previous one with the same name.
    pub fn insert_dataset(&mut self, name: &str, dataset: Dataset) {
        let name = normalize_name(name);
        self.ensure_groups(&parent_group(&name));
        self.datasets.insert(name, dataset);
    }

    fn ensure_groups(&mut self, group: &str) {
        let mut current = String::new();
        self.groups.entry("/".to_string()).or_default();
        for part in group.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.groups.entry(current.clone()).or_default();
        }
    }
}

/// Copy only `datasets` from `src` into a new container at `dest`.
///
/// Root attributes, the attributes of every ancestor group of a copied
/// dataset, and the dataset attributes travel along. Names missing from `src`
/// are fatal.
pub fn repack(src: impl AsRef<Path>, dest: impl AsRef<Path>, datasets: &[&str]) -> Result<()> {
    let source = Container::open(src)?;
    let mut out = Container::create(dest.as_ref());
    *out.group_attrs_mut("/") = source.root_attrs().clone();

    for name in datasets {
        let dataset = source.require(name)?;
        let mut group = String::new();
        for part in parent_group(name).split('/').filter(|p| !p.is_empty()) {
            group.push('/');
            group.push_str(part);
            if let Some(attrs) = source.group_attrs(&group) {
                *out.group_attrs_mut(&group) = attrs.clone();
            }
        }
        out.insert_dataset(name, dataset.clone());
    }

    out.flush()
}
