//! On-disk tier of the storage engine
//!
//! Owns the data directory, one segment file per sorted run, and the
//! in-memory metadata index mapping `symbol -> segment_id -> SegmentInfo`.
//! The index is the sole source of truth for discovering segments; it is
//! rebuilt from the segment headers on startup.

use crate::config::DiskConfig;
use crate::error::StoreResult;
use crate::segment::{self, SegmentInfo, SEGMENT_EXTENSION};
use crate::types::{Point, TimeRange};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Maximum number of points per segment written by compaction
pub const POINTS_PER_COMPACTED_SEGMENT: usize = 10_000;

type SegmentIndex = HashMap<String, BTreeMap<u64, SegmentInfo>>;

/// Segment store: per-symbol sorted runs on disk plus their metadata index
pub struct SegmentStore {
    data_dir: PathBuf,
    config: DiskConfig,
    index: RwLock<SegmentIndex>,
}

impl SegmentStore {
    /// Open a store rooted at `data_dir`, indexing any existing segments
    pub fn new(data_dir: impl Into<PathBuf>, config: DiskConfig) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let index = Self::load_existing_segments(&data_dir)?;
        let segment_count: usize = index.values().map(|m| m.len()).sum();
        tracing::info!(
            "Indexed {} segments across {} symbols in {:?}",
            segment_count,
            index.len(),
            data_dir
        );

        Ok(Self {
            data_dir,
            config,
            index: RwLock::new(index),
        })
    }

    /// Scan the data directory and rebuild the metadata index
    ///
    /// File names carry only a hint of `(symbol, segment_id)`; the
    /// checksummed header is read for authoritative bounds and counts.
    /// Unparseable or unreadable files are skipped. Stale `.tmp` files
    /// from an interrupted write are removed.
    fn load_existing_segments(dir: &Path) -> StoreResult<SegmentIndex> {
        let mut index = SegmentIndex::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if path.extension().map(|e| e == "tmp").unwrap_or(false) {
                tracing::warn!("Removing stale temporary file {:?}", path);
                let _ = std::fs::remove_file(&path);
                continue;
            }
            if !path
                .extension()
                .map(|e| e == SEGMENT_EXTENSION)
                .unwrap_or(false)
            {
                continue;
            }

            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem,
                None => continue,
            };
            let (symbol, segment_id) = match segment::parse_file_name(stem) {
                Some((symbol, segment_id, _, _)) => (symbol, segment_id),
                None => {
                    tracing::warn!("Skipping unrecognized file {:?}", path);
                    continue;
                }
            };

            let header = match segment::read_header(&path) {
                Ok(header) => header,
                Err(e) => {
                    tracing::warn!("Skipping unreadable segment {:?}: {}", path, e);
                    continue;
                }
            };

            let segments = index.entry(symbol).or_default();
            let segment_id = if segments.contains_key(&segment_id) {
                let fallback = segments.keys().next_back().map(|id| id + 1).unwrap_or(0);
                tracing::warn!(
                    "Duplicate segment id {} for {:?}, reassigning to {}",
                    segment_id,
                    path,
                    fallback
                );
                fallback
            } else {
                segment_id
            };

            segments.insert(
                segment_id,
                SegmentInfo {
                    segment_id,
                    start_time: header.start_time,
                    end_time: header.end_time,
                    num_points: header.num_points,
                    file_path: path,
                    compressed: header.compressed,
                },
            );
        }

        Ok(index)
    }

    /// Persist a batch of points, one new segment per symbol
    ///
    /// Points are grouped by symbol and sorted by timestamp; each group is
    /// written under the next free segment id for its symbol. The index is
    /// updated only after the file is durably on disk.
    pub fn write_batch(&self, points: &[Point]) -> StoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut grouped: HashMap<&str, Vec<Point>> = HashMap::new();
        for point in points {
            grouped
                .entry(point.symbol.as_str())
                .or_default()
                .push(point.clone());
        }

        let mut index = self.index.write();
        for (symbol, mut group) in grouped {
            group.sort_by_key(|p| p.timestamp);

            let segments = index.entry(symbol.to_string()).or_default();
            let segment_id = segments.keys().next_back().map(|id| id + 1).unwrap_or(0);

            let info = segment::write_segment(
                &self.data_dir,
                symbol,
                segment_id,
                &group,
                self.config.enable_compression,
            )?;
            segments.insert(segment_id, info);
        }

        Ok(())
    }

    /// Read all points with `start <= timestamp <= end` for a symbol
    pub fn read_range(&self, symbol: &str, start: i64, end: i64) -> StoreResult<Vec<Point>> {
        let range = match TimeRange::try_new(start, end) {
            Some(range) => range,
            None => return Ok(Vec::new()),
        };

        let relevant: Vec<SegmentInfo> = {
            let index = self.index.read();
            match index.get(symbol) {
                Some(segments) => segments
                    .values()
                    .filter(|info| info.overlaps(&range))
                    .cloned()
                    .collect(),
                None => return Ok(Vec::new()),
            }
        };

        let mut results = Vec::new();
        for info in &relevant {
            let points = segment::read_segment(info, symbol)?;
            results.extend(points.into_iter().filter(|p| range.contains(p.timestamp)));
        }

        results.sort_by_key(|p| p.timestamp);
        Ok(results)
    }

    /// The maximum-timestamp point for a symbol on disk, if any
    ///
    /// Only the segment with the greatest `end_time` is read; the point
    /// with the global maximum timestamp necessarily lives there.
    pub fn read_latest(&self, symbol: &str) -> StoreResult<Option<Point>> {
        let info = {
            let index = self.index.read();
            match index
                .get(symbol)
                .and_then(|segments| segments.values().max_by_key(|info| info.end_time))
            {
                Some(info) => info.clone(),
                None => return Ok(None),
            }
        };

        let points = segment::read_segment(&info, symbol)?;
        Ok(points.into_iter().last())
    }

    /// Rewrite all segments of a symbol as sorted, duplicate-free runs
    ///
    /// New segments are capped at [`POINTS_PER_COMPACTED_SEGMENT`] points
    /// and numbered from 0. Replacement files are written and renamed into
    /// place before any old file is unlinked, so an interruption leaves a
    /// readable superset on disk rather than a hole.
    pub fn compact(&self, symbol: &str) -> StoreResult<()> {
        let mut index = self.index.write();

        let old: Vec<SegmentInfo> = match index.get(symbol) {
            Some(segments) if !segments.is_empty() => segments.values().cloned().collect(),
            _ => return Ok(()),
        };

        let mut all_points = Vec::new();
        for info in &old {
            all_points.extend(segment::read_segment(info, symbol)?);
        }

        all_points.sort_by_key(|p| p.timestamp);
        all_points.dedup_by(|current, previous| current.timestamp == previous.timestamp);

        let mut replacements = BTreeMap::new();
        for (i, chunk) in all_points.chunks(POINTS_PER_COMPACTED_SEGMENT).enumerate() {
            let segment_id = i as u64;
            let info = segment::write_segment(
                &self.data_dir,
                symbol,
                segment_id,
                chunk,
                self.config.enable_compression,
            )?;
            replacements.insert(segment_id, info);
        }

        // A replacement may reuse an old file's name when id and bounds
        // coincide; those files were already overwritten by the rename.
        let replacement_paths: HashSet<&PathBuf> =
            replacements.values().map(|info| &info.file_path).collect();
        for info in &old {
            if replacement_paths.contains(&info.file_path) {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&info.file_path) {
                tracing::warn!("Failed to unlink old segment {:?}: {}", info.file_path, e);
            }
        }

        index.insert(symbol.to_string(), replacements);
        Ok(())
    }

    /// Compact every symbol in the index, isolating per-symbol failures
    pub fn optimize_index(&self) {
        let symbols: Vec<String> = {
            let index = self.index.read();
            index.keys().cloned().collect()
        };

        for symbol in symbols {
            if let Err(e) = self.compact(&symbol) {
                tracing::error!("Error compacting symbol {}: {}", symbol, e);
            }
        }
    }

    /// Sum of file sizes of all indexed segments, in bytes
    pub fn storage_size(&self) -> u64 {
        let index = self.index.read();
        index
            .values()
            .flat_map(|segments| segments.values())
            .filter_map(|info| std::fs::metadata(&info.file_path).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Symbols with at least one segment on disk
    pub fn symbols(&self) -> HashSet<String> {
        let index = self.index.read();
        index.keys().cloned().collect()
    }

    /// Total number of indexed segments
    pub fn segment_count(&self) -> usize {
        let index = self.index.read();
        index.values().map(|segments| segments.len()).sum()
    }
}
