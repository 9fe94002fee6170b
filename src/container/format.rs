//! On-disk container encoding.
//!
//! ```text
//! +----------------------+ 0
//! | header (32 bytes)    |  magic, format version, manifest len, manifest crc32
//! +----------------------+ 32
//! | manifest (JSON)      |  groups + attributes, dataset shape/dtype/attrs/block
//! +----------------------+ 32 + manifest_len
//! | dataset blocks       |  one zstd frame of little-endian values per dataset
//! +----------------------+
//! ```
//!
//! Float values are stored by bit pattern, so negative zero is preserved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attr::Attrs;
use super::{DType, Dataset, Values};
use crate::{Error, Result};

/// Container magic number ('HPTS').
pub const CONTAINER_MAGIC: u32 = 0x4850_5453;

/// Container file format version.
pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_SIZE: usize = 32;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub manifest_len: u64,
    pub manifest_crc: u32,
}

impl FileHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.manifest_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.manifest_crc.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Corrupt("truncated header"));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().expect("slice length"));
        let version = u32::from_le_bytes(bytes[4..8].try_into().expect("slice length"));
        let manifest_len = u64::from_le_bytes(bytes[8..16].try_into().expect("slice length"));
        let manifest_crc = u32::from_le_bytes(bytes[16..20].try_into().expect("slice length"));
        if magic != CONTAINER_MAGIC {
            return Err(Error::Corrupt("bad container magic"));
        }
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(Self {
            magic,
            version,
            manifest_len,
            manifest_crc,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    groups: BTreeMap<String, Attrs>,
    datasets: BTreeMap<String, DatasetEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetEntry {
    dtype: DType,
    shape: Vec<usize>,
    #[serde(default)]
    attrs: Attrs,
    offset: u64,
    stored_len: u64,
    crc32: u32,
}

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Serialize groups and datasets into a complete container image.
pub fn encode(
    groups: &BTreeMap<String, Attrs>,
    datasets: &BTreeMap<String, Dataset>,
) -> Result<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut entries = BTreeMap::new();

    for (name, dataset) in datasets {
        let raw = match &dataset.values {
            Values::Int(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<u8>>(),
            Values::Float(v) => v
                .iter()
                .flat_map(|x| x.to_bits().to_le_bytes())
                .collect::<Vec<u8>>(),
        };
        let compressed = zstd::stream::encode_all(&raw[..], ZSTD_LEVEL)?;
        entries.insert(
            name.clone(),
            DatasetEntry {
                dtype: dataset.dtype(),
                shape: dataset.shape.clone(),
                attrs: dataset.attrs.clone(),
                offset: blocks.len() as u64,
                stored_len: compressed.len() as u64,
                crc32: crc32(&compressed),
            },
        );
        blocks.extend_from_slice(&compressed);
    }

    let manifest = Manifest {
        groups: groups.clone(),
        datasets: entries,
    };
    let manifest_bytes = serde_json::to_vec(&manifest)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let header = FileHeader {
        magic: CONTAINER_MAGIC,
        version: FORMAT_VERSION,
        manifest_len: manifest_bytes.len() as u64,
        manifest_crc: crc32(&manifest_bytes),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + manifest_bytes.len() + blocks.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&manifest_bytes);
    out.extend_from_slice(&blocks);
    Ok(out)
}

/// Parse a container image produced by [`encode`].
pub fn decode(
    bytes: &[u8],
) -> Result<(BTreeMap<String, Attrs>, BTreeMap<String, Dataset>)> {
    let header = FileHeader::from_bytes(bytes)?;
    let manifest_end = HEADER_SIZE
        .checked_add(header.manifest_len as usize)
        .ok_or(Error::Corrupt("manifest length overflow"))?;
    let manifest_bytes = bytes
        .get(HEADER_SIZE..manifest_end)
        .ok_or(Error::Corrupt("truncated manifest"))?;
    if crc32(manifest_bytes) != header.manifest_crc {
        return Err(Error::Corrupt("manifest crc mismatch"));
    }
    let manifest: Manifest =
        serde_json::from_slice(manifest_bytes).map_err(|_| Error::Corrupt("invalid manifest JSON"))?;

    let data = &bytes[manifest_end..];
    let mut datasets = BTreeMap::new();
    for (name, entry) in manifest.datasets {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.stored_len as usize)
            .ok_or(Error::Corrupt("block length overflow"))?;
        let block = data
            .get(start..end)
            .ok_or(Error::Corrupt("truncated dataset block"))?;
        if crc32(block) != entry.crc32 {
            return Err(Error::Corrupt("dataset crc mismatch"));
        }
        let expected_len = entry
            .shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
            .and_then(|count| count.checked_mul(8))
            .ok_or(Error::Corrupt("dataset shape overflow"))?;
        let raw = zstd::stream::decode_all(block).map_err(|_| Error::Corrupt("bad dataset block"))?;
        if raw.len() != expected_len {
            return Err(Error::Corrupt("dataset size does not match shape"));
        }
        let words = raw
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().expect("slice length")));
        let values = match entry.dtype {
            DType::I64 => Values::Int(words.map(|w| w as i64).collect()),
            DType::F64 => Values::Float(words.map(f64::from_bits).collect()),
        };

        datasets.insert(
            name,
            Dataset {
                shape: entry.shape,
                values,
                attrs: entry.attrs,
            },
        );
    }

    Ok((manifest.groups, datasets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (BTreeMap<String, Attrs>, BTreeMap<String, Dataset>) {
        let mut groups = BTreeMap::new();
        let mut root = Attrs::new();
        root.insert("version".into(), 2i64.into());
        groups.insert("/".to_string(), root);

        let mut datasets = BTreeMap::new();
        datasets.insert(
            "/g/timestamps".to_string(),
            Dataset::new(vec![2], Values::Int(vec![100, 110])),
        );
        datasets.insert(
            "/g/data".to_string(),
            Dataset::new(vec![2, 1], Values::Float(vec![-0.0, 0.0])),
        );
        (groups, datasets)
    }

    #[test]
    fn header_round_trip() {
        let header = FileHeader {
            magic: CONTAINER_MAGIC,
            version: FORMAT_VERSION,
            manifest_len: 77,
            manifest_crc: 0xdead_beef,
        };
        assert_eq!(FileHeader::from_bytes(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn decode_preserves_sign_of_zero() {
        let (groups, datasets) = sample();
        let bytes = encode(&groups, &datasets).unwrap();
        let (_, back) = decode(&bytes).unwrap();
        let values = back["/g/data"].as_f64().unwrap();
        assert!(values[0].is_sign_negative());
        assert!(values[1].is_sign_positive());
        assert_eq!(back["/g/timestamps"].as_i64().unwrap(), &[100, 110]);
    }

    #[test]
    fn flipped_block_byte_is_detected() {
        let (groups, datasets) = sample();
        let mut bytes = encode(&groups, &datasets).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(decode(&bytes), Err(Error::Corrupt(_))));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let (groups, datasets) = sample();
        let mut bytes = encode(&groups, &datasets).unwrap();
        bytes[0] = 0;
        assert!(matches!(decode(&bytes), Err(Error::Corrupt("bad container magic"))));
    }

    /// Image with one float dataset described by a hand-written manifest.
    fn image_with_shape(shape: &[usize]) -> Vec<u8> {
        let block = zstd::stream::encode_all(&[][..], ZSTD_LEVEL).unwrap();
        let mut datasets = BTreeMap::new();
        datasets.insert(
            "/g/data".to_string(),
            DatasetEntry {
                dtype: DType::F64,
                shape: shape.to_vec(),
                attrs: Attrs::new(),
                offset: 0,
                stored_len: block.len() as u64,
                crc32: crc32(&block),
            },
        );
        let manifest = serde_json::to_vec(&Manifest {
            groups: BTreeMap::new(),
            datasets,
        })
        .unwrap();
        let header = FileHeader {
            magic: CONTAINER_MAGIC,
            version: FORMAT_VERSION,
            manifest_len: manifest.len() as u64,
            manifest_crc: crc32(&manifest),
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&manifest);
        bytes.extend_from_slice(&block);
        bytes
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let bytes = image_with_shape(&[1 << 32, 1 << 32]);
        assert!(matches!(
            decode(&bytes),
            Err(Error::Corrupt("dataset shape overflow"))
        ));
        let bytes = image_with_shape(&[usize::MAX / 4, 2]);
        assert!(matches!(
            decode(&bytes),
            Err(Error::Corrupt("dataset shape overflow"))
        ));
        // a zero-sized shape with an empty block is still valid
        let (_, datasets) = decode(&image_with_shape(&[0, 3])).unwrap();
        assert_eq!(datasets["/g/data"].shape(), &[0, 3]);
    }

    #[test]
    fn truncated_image_is_rejected() {
        let (groups, datasets) = sample();
        let bytes = encode(&groups, &datasets).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
        assert!(decode(&bytes[..10]).is_err());
    }
}
