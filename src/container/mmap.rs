use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::{Error, Result};

/// Read-only mapping of a whole container file.
pub struct MappedFile {
    map: Mmap,
    len: usize,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Err(Error::Corrupt("empty container file"));
        }
        // The file is replaced by rename on every write, never modified in
        // place, so the mapping stays valid for its lifetime.
        let map = unsafe { MmapOptions::new().len(len).map(&file)? };
        Ok(Self { map, len })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
