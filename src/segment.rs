//! Segment file format for the on-disk tier
//!
//! Each segment file holds one immutable, timestamp-sorted run of points
//! for a single symbol.
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (64 bytes)                       │
//! │   magic: [u8; 4] = "TKSG"               │
//! │   version: u16                          │
//! │   compressed: u8                        │
//! │   start_time: i64                       │
//! │   end_time: i64                         │
//! │   num_points: u64                       │
//! │   checksum: u32                         │
//! ├─────────────────────────────────────────┤
//! │ payload_size: u64                       │
//! ├─────────────────────────────────────────┤
//! │ PAYLOAD (payload_size bytes)            │
//! │   compressed: codec block               │
//! │   raw: num_points × (i64, f64) records  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Files are named `<symbol>_<segment_id>_<start_us>_<end_us>.seg`. The
//! name is parsed right-to-left so symbols may contain underscores, and it
//! is only a hint: the checksummed header is authoritative on recovery.

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::types::{Point, TimeRange};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for segment file identification
const SEGMENT_MAGIC: [u8; 4] = *b"TKSG";

/// Current segment format version
const SEGMENT_VERSION: u16 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 64;

/// Bytes per uncompressed point record (timestamp + value)
const POINT_RECORD_SIZE: usize = 16;

/// File extension for segment files
pub const SEGMENT_EXTENSION: &str = "seg";

/// Metadata for one on-disk segment
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Identifier, unique per symbol
    pub segment_id: u64,
    /// Minimum timestamp of contained points (inclusive)
    pub start_time: i64,
    /// Maximum timestamp of contained points (inclusive)
    pub end_time: i64,
    /// Number of points in the segment (always > 0)
    pub num_points: u64,
    /// Location of the segment file
    pub file_path: PathBuf,
    /// Whether the payload is codec-compressed
    pub compressed: bool,
}

impl SegmentInfo {
    /// Check if this segment's time bounds intersect a query range
    pub fn overlaps(&self, range: &TimeRange) -> bool {
        self.start_time <= range.end && self.end_time >= range.start
    }
}

/// Fixed-size segment file header
#[derive(Debug, Clone)]
pub struct SegmentHeader {
    /// Format version
    pub version: u16,
    /// Whether the payload is codec-compressed
    pub compressed: bool,
    /// Minimum timestamp of contained points
    pub start_time: i64,
    /// Maximum timestamp of contained points
    pub end_time: i64,
    /// Number of points in the payload
    pub num_points: u64,
}

impl SegmentHeader {
    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&SEGMENT_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compressed as u8;
        // byte 7 reserved
        buf[8..16].copy_from_slice(&self.start_time.to_le_bytes());
        buf[16..24].copy_from_slice(&self.end_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.num_points.to_le_bytes());
        // bytes 32-59 reserved

        let checksum = crc32fast::hash(&buf[0..60]);
        buf[60..64].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse header from bytes, verifying checksum, magic, and version
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> StoreResult<Self> {
        let stored = u32::from_le_bytes([buf[60], buf[61], buf[62], buf[63]]);
        let computed = crc32fast::hash(&buf[0..60]);
        if stored != computed {
            return Err(StoreError::HeaderChecksum { stored, computed });
        }

        if buf[0..4] != SEGMENT_MAGIC {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&buf[0..4]);
            return Err(StoreError::BadMagic(magic));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > SEGMENT_VERSION {
            return Err(StoreError::UnsupportedRevision(version));
        }

        let compressed = buf[6] != 0;
        let start_time = i64::from_le_bytes([
            buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
        ]);
        let end_time = i64::from_le_bytes([
            buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
        ]);
        let num_points = u64::from_le_bytes([
            buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
        ]);

        Ok(Self {
            version,
            compressed,
            start_time,
            end_time,
            num_points,
        })
    }
}

/// Build the canonical segment file name
pub fn file_name(symbol: &str, segment_id: u64, start_time: i64, end_time: i64) -> String {
    format!("{symbol}_{segment_id}_{start_time}_{end_time}.{SEGMENT_EXTENSION}")
}

/// Parse `(symbol, segment_id, start_time, end_time)` from a file stem
///
/// Splits from the right so the symbol itself may contain underscores.
pub fn parse_file_name(stem: &str) -> Option<(String, u64, i64, i64)> {
    let mut parts = stem.rsplitn(4, '_');
    let end_time: i64 = parts.next()?.parse().ok()?;
    let start_time: i64 = parts.next()?.parse().ok()?;
    let segment_id: u64 = parts.next()?.parse().ok()?;
    let symbol = parts.next()?;

    if symbol.is_empty() {
        return None;
    }
    Some((symbol.to_string(), segment_id, start_time, end_time))
}

/// Write a segment file for one symbol
///
/// The file is written under a temporary name and renamed into place, so a
/// crash mid-write never leaves a half-written `.seg` file behind. The
/// input is expected sorted by timestamp; bounds are computed from the
/// actual points.
pub fn write_segment(
    dir: &Path,
    symbol: &str,
    segment_id: u64,
    points: &[Point],
    compressed: bool,
) -> StoreResult<SegmentInfo> {
    if points.is_empty() {
        return Err(StoreError::EmptySegment);
    }

    let (start_time, end_time) = points.iter().fold((i64::MAX, i64::MIN), |(min, max), p| {
        (min.min(p.timestamp), max.max(p.timestamp))
    });

    let payload = if compressed {
        codec::compress_points(points)?
    } else {
        let mut raw = Vec::with_capacity(points.len() * POINT_RECORD_SIZE);
        for point in points {
            raw.extend_from_slice(&point.timestamp.to_le_bytes());
            raw.extend_from_slice(&point.value.to_le_bytes());
        }
        raw
    };

    let header = SegmentHeader {
        version: SEGMENT_VERSION,
        compressed,
        start_time,
        end_time,
        num_points: points.len() as u64,
    };

    let final_path = dir.join(file_name(symbol, segment_id, start_time, end_time));
    let tmp_path = dir.join(format!(
        "{}.tmp",
        file_name(symbol, segment_id, start_time, end_time)
    ));

    let mut file = File::create(&tmp_path)?;
    file.write_all(&header.to_bytes())?;
    file.write_all(&(payload.len() as u64).to_le_bytes())?;
    file.write_all(&payload)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, &final_path)?;

    Ok(SegmentInfo {
        segment_id,
        start_time,
        end_time,
        num_points: points.len() as u64,
        file_path: final_path,
        compressed,
    })
}

/// Read the header of a segment file without touching its payload
pub fn read_header(path: &Path) -> StoreResult<SegmentHeader> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf)?;
    SegmentHeader::from_bytes(&buf)
}

/// Read and decode every point in a segment file
pub fn read_segment(info: &SegmentInfo, symbol: &str) -> StoreResult<Vec<Point>> {
    let file = File::open(&info.file_path)?;
    let mut reader = BufReader::new(file);

    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf)?;
    let header = SegmentHeader::from_bytes(&header_buf)?;

    let mut size_buf = [0u8; 8];
    reader.read_exact(&mut size_buf)?;
    let payload_size = u64::from_le_bytes(size_buf) as usize;

    let mut payload = vec![0u8; payload_size];
    reader.read_exact(&mut payload)?;

    let points = if header.compressed {
        codec::decompress_points(&payload)?
    } else {
        // A truncated raw payload decodes short and fails the count check
        let mut points = Vec::with_capacity(header.num_points as usize);
        for record in payload.chunks_exact(POINT_RECORD_SIZE) {
            let timestamp = i64::from_le_bytes([
                record[0], record[1], record[2], record[3], record[4], record[5], record[6],
                record[7],
            ]);
            let value = f64::from_le_bytes([
                record[8], record[9], record[10], record[11], record[12], record[13], record[14],
                record[15],
            ]);
            points.push(Point {
                symbol: symbol.to_string(),
                timestamp,
                value,
            });
        }
        points
    };

    if points.len() as u64 != header.num_points {
        return Err(StoreError::PointCountMismatch {
            path: info.file_path.clone(),
            decoded: points.len() as u64,
            claimed: header.num_points,
        });
    }

    Ok(points)
}
