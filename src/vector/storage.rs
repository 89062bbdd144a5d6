//! On-disk format for embedding matrices.
//!
//! Both the persisted index and the embedding cache use this codec.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `HVEC`, format version, dimension, vector count
//!   (all `u32` little-endian)
//! - Vectors: `count * dimension` little-endian `f32` values, row-major, in
//!   corpus position order
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! into place only after every byte is flushed and synced, so a failed write
//! never leaves a file that loads as valid.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::MmapOptions;
use tempfile::NamedTempFile;

use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Magic bytes to identify matrix files.
const MAGIC_BYTES: &[u8; 4] = b"HVEC";

/// Number of bytes per f32 value.
pub const BYTES_PER_F32: usize = 4;

/// A row-major matrix read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatrix {
    pub dimension: VectorDimension,
    pub count: usize,
    pub data: Vec<f32>,
}

/// Writes `data` (`count` rows of `dimension` floats) to `path`.
///
/// The destination only appears once the full payload has been synced.
pub fn write_matrix(
    path: &Path,
    dimension: VectorDimension,
    data: &[f32],
) -> Result<(), VectorError> {
    if data.len() % dimension.get() != 0 {
        return Err(VectorError::DimensionMismatch {
            expected: dimension.get(),
            actual: data.len() % dimension.get(),
        });
    }
    let count = data.len() / dimension.get();
    let dim_u32 = header_field(dimension.get(), "dimension")?;
    let count_u32 = header_field(count, "vector count")?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(MAGIC_BYTES)?;
        writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
        writer.write_all(&dim_u32.to_le_bytes())?;
        writer.write_all(&count_u32.to_le_bytes())?;
        for value in data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    // Dropping `tmp` on any earlier error removes the partial file.
    tmp.persist(path).map_err(|e| VectorError::Storage(e.error))?;

    tracing::debug!(
        "wrote {count} vectors of dimension {} to {}",
        dimension.get(),
        path.display()
    );
    Ok(())
}

/// Reads a matrix written by [`write_matrix`].
///
/// Any disagreement between the header and the payload length is reported as
/// [`VectorError::CorruptIndex`]. A missing file is a storage error.
pub fn read_matrix(path: &Path) -> Result<StoredMatrix, VectorError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < HEADER_SIZE as u64 {
        return Err(VectorError::corrupt(format!(
            "{} is {len} bytes, too small to contain a header",
            path.display()
        )));
    }

    // SAFETY: the map is read-only and dropped before this function returns;
    // contents are copied into an owned buffer.
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(VectorError::corrupt("invalid magic bytes"));
    }

    let version = read_u32(&mmap, 4);
    if version != STORAGE_VERSION {
        return Err(VectorError::corrupt(format!(
            "unsupported format version {version}, expected {STORAGE_VERSION}"
        )));
    }

    let dim_value = read_u32(&mmap, 8) as usize;
    let count = read_u32(&mmap, 12) as usize;
    if dim_value == 0 || count == 0 {
        return Err(VectorError::corrupt(format!(
            "declared dimension {dim_value} and count {count} must both be positive"
        )));
    }
    let dimension = VectorDimension::new(dim_value)?;

    let payload = &mmap[HEADER_SIZE..];
    let expected = count
        .checked_mul(dim_value)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .ok_or_else(|| VectorError::corrupt("declared shape overflows"))?;
    if payload.len() != expected {
        return Err(VectorError::corrupt(format!(
            "payload is {} bytes, expected {expected} for {count} x {dim_value} floats",
            payload.len()
        )));
    }

    let data = payload
        .chunks_exact(BYTES_PER_F32)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(StoredMatrix {
        dimension,
        count,
        data,
    })
}

fn header_field(value: usize, name: &str) -> Result<u32, VectorError> {
    u32::try_from(value)
        .map_err(|_| VectorError::corrupt(format!("{name} {value} does not fit the header")))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
