//! Versioned, compressed binary container for chunk snapshots.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [4] magic 0x5444594E ("TDYN")
//! [4] uncompressed payload size (i32)
//! [4 + N] length-prefixed zlib block, decompressing to:
//!     [4] format version (i32), currently 1
//!     [8] grid coordinate (i32 x, i32 y)
//!     [4] resolution (i32)
//!     [4] world size (f32)
//!     [4 + H*4] height samples: i32 count + f32 payload
//!     [4 + W*4] weight samples: i32 count + RGBA8 quads
//! ```
//!
//! A magic mismatch means "not our file" and is handled as missing data;
//! decompression failure, truncation and unknown versions are hard parse
//! failures. A failed parse never hands back a partial snapshot.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Result, TerrainError};
use crate::terrain::chunk_manager::ChunkCoord;

pub const CHUNK_MAGIC: i32 = 0x5444594E; // "TDYN"
pub const FORMAT_VERSION: i32 = 1;

// Upper bound on the declared payload size, comfortably above the
// largest real chunk (resolution 4096 with full weight data is ~128 MiB).
// The header is untrusted input; nothing gets allocated past this.
const MAX_UNCOMPRESSED_SIZE: i32 = 1 << 28;

/// A stable deep copy of a chunk's persistent state, captured on the
/// owning thread before being handed to background compression and I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSnapshot {
    pub grid_coordinate: ChunkCoord,
    pub resolution: i32,
    pub world_size: f32,
    pub height_data: Vec<f32>,
    pub weight_data: Vec<[u8; 4]>,
}

impl ChunkSnapshot {
    pub fn is_valid(&self) -> bool {
        !self.height_data.is_empty()
    }
}

// --- little-endian write helpers ---

fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

// --- little-endian cursor ---

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| TerrainError::Corrupt("truncated buffer".into()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(TerrainError::Corrupt(format!("negative array count {count}")));
        }
        Ok(count as usize)
    }
}

fn encode_payload(snapshot: &ChunkSnapshot) -> Vec<u8> {
    let mut payload = Vec::with_capacity(
        28 + snapshot.height_data.len() * 4 + snapshot.weight_data.len() * 4,
    );
    write_i32(&mut payload, FORMAT_VERSION);
    write_i32(&mut payload, snapshot.grid_coordinate.x);
    write_i32(&mut payload, snapshot.grid_coordinate.y);
    write_i32(&mut payload, snapshot.resolution);
    write_f32(&mut payload, snapshot.world_size);

    write_i32(&mut payload, snapshot.height_data.len() as i32);
    for &h in &snapshot.height_data {
        write_f32(&mut payload, h);
    }

    write_i32(&mut payload, snapshot.weight_data.len() as i32);
    for quad in &snapshot.weight_data {
        payload.extend_from_slice(quad);
    }
    payload
}

fn decode_payload(payload: &[u8]) -> Result<ChunkSnapshot> {
    let mut reader = Reader::new(payload);

    let version = reader.read_i32()?;
    if version != FORMAT_VERSION {
        return Err(TerrainError::UnknownVersion(version));
    }

    let x = reader.read_i32()?;
    let y = reader.read_i32()?;
    let resolution = reader.read_i32()?;
    let world_size = reader.read_f32()?;

    let height_count = reader.read_count()?;
    let mut height_data = Vec::with_capacity(height_count);
    for _ in 0..height_count {
        height_data.push(reader.read_f32()?);
    }

    let weight_count = reader.read_count()?;
    let mut weight_data = Vec::with_capacity(weight_count);
    for _ in 0..weight_count {
        let bytes = reader.take(4)?;
        weight_data.push([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }

    Ok(ChunkSnapshot {
        grid_coordinate: ChunkCoord { x, y },
        resolution,
        world_size,
        height_data,
        weight_data,
    })
}

/// Serialize a snapshot to the compressed container format.
pub fn serialize_snapshot(snapshot: &ChunkSnapshot) -> Result<Vec<u8>> {
    let payload = encode_payload(snapshot);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&payload)
        .map_err(|e| TerrainError::Corrupt(format!("compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| TerrainError::Corrupt(format!("compression failed: {e}")))?;

    let mut out = Vec::with_capacity(12 + compressed.len());
    write_i32(&mut out, CHUNK_MAGIC);
    write_i32(&mut out, payload.len() as i32);
    write_i32(&mut out, compressed.len() as i32);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Parse a compressed container back into a snapshot.
pub fn deserialize_snapshot(bytes: &[u8]) -> Result<ChunkSnapshot> {
    if bytes.len() < 8 {
        return Err(TerrainError::NotTerrainFile);
    }

    let mut reader = Reader::new(bytes);
    if reader.read_i32()? != CHUNK_MAGIC {
        return Err(TerrainError::NotTerrainFile);
    }

    let uncompressed_size = reader.read_i32()?;
    let compressed_len = reader.read_count()?;
    if uncompressed_size <= 0 || compressed_len == 0 {
        return Err(TerrainError::Corrupt("empty payload".into()));
    }
    if uncompressed_size > MAX_UNCOMPRESSED_SIZE {
        return Err(TerrainError::Corrupt(format!(
            "declared payload size {uncompressed_size} exceeds limit"
        )));
    }
    let compressed = reader.take(compressed_len)?;

    // Read one byte past the declared size so an oversized stream is
    // caught by the length check below instead of filling memory.
    let mut payload = Vec::with_capacity(uncompressed_size as usize);
    ZlibDecoder::new(compressed)
        .take(uncompressed_size as u64 + 1)
        .read_to_end(&mut payload)
        .map_err(|e| TerrainError::Corrupt(format!("decompression failed: {e}")))?;
    if payload.len() != uncompressed_size as usize {
        return Err(TerrainError::Corrupt(format!(
            "decompressed {} bytes, header declared {}",
            payload.len(),
            uncompressed_size
        )));
    }

    decode_payload(&payload)
}
