//! Storage engine façade
//!
//! Composes the memory tier and the disk tier into one logical store:
//! - Write path: point → memory buffer; a full buffer drains to segments
//! - Read path: memory snapshot + segment scan, merged in timestamp order
//! - Maintenance: `optimize` = flush + compact every symbol
//!
//! One reader/writer lock coordinates the tiers. Writers (insert, the
//! flush commit) hold it exclusively; readers hold it shared. It is never
//! held across segment store I/O, so range reads do not block writers for
//! longer than the memory snapshot takes.

use crate::buffer::MemoryBuffer;
use crate::config::{DiskConfig, EngineConfig};
use crate::error::StoreResult;
use crate::store::SegmentStore;
use crate::types::Point;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// The tickstore storage engine
pub struct StorageEngine {
    config: EngineConfig,
    buffer: MemoryBuffer,
    store: SegmentStore,
    lock: RwLock<()>,
    total_points: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl StorageEngine {
    /// Open an engine rooted at the configured data directory
    ///
    /// Existing segments in the directory are indexed and immediately
    /// queryable. The directory must not be shared with another engine
    /// instance.
    pub fn new(config: EngineConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_directory)?;

        // The engine-level compression flag selects the payload format
        let disk_config = DiskConfig {
            enable_compression: config.enable_compression,
            ..config.disk.clone()
        };
        let store = SegmentStore::new(&config.data_directory, disk_config)?;

        Ok(Self {
            config,
            buffer: MemoryBuffer::new(),
            store,
            lock: RwLock::new(()),
            total_points: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        })
    }

    /// Write a single point
    ///
    /// Returns `false` if a point with the same timestamp already exists
    /// for the symbol in memory. Triggers a flush on the caller thread
    /// once the buffer reaches `max_memory_points`.
    pub fn write_point(&self, point: Point) -> bool {
        let needs_flush = {
            let _guard = self.lock.write();
            if !self.buffer.insert(point) {
                return false;
            }
            self.total_points.fetch_add(1, Ordering::Relaxed);
            self.buffer.size() >= self.config.max_memory_points
        };

        if needs_flush {
            return self.flush();
        }
        true
    }

    /// Write a batch of points
    ///
    /// Duplicate timestamps within the batch or against the buffer are
    /// silently dropped (earliest arrival wins). Triggers a flush once the
    /// buffer reaches `max_memory_points`.
    pub fn write_batch(&self, points: Vec<Point>) -> bool {
        if points.is_empty() {
            return true;
        }
        let submitted = points.len() as u64;

        let needs_flush = {
            let _guard = self.lock.write();
            self.buffer.insert_batch(points);
            self.total_points.fetch_add(submitted, Ordering::Relaxed);
            self.buffer.size() >= self.config.max_memory_points
        };

        if needs_flush {
            return self.flush();
        }
        true
    }

    /// Drain the memory buffer into new on-disk segments
    ///
    /// Returns `true` once the buffer is empty on disk. On a disk failure
    /// the buffer is left intact for retry and `false` is returned.
    pub fn flush(&self) -> bool {
        let points = {
            let _guard = self.lock.write();
            let mut all = Vec::with_capacity(self.buffer.size());
            for symbol in self.buffer.symbols() {
                all.extend(self.buffer.get_range(&symbol, i64::MIN, i64::MAX));
            }
            all
        };

        if points.is_empty() {
            return true;
        }
        tracing::debug!("Flushing {} points to segments", points.len());

        // Disk write happens without the engine lock held
        match self.store.write_batch(&points) {
            Ok(()) => {
                let _guard = self.lock.write();
                self.buffer.clear();
                true
            }
            Err(e) => {
                tracing::error!("Flush failed, buffer retained: {}", e);
                false
            }
        }
    }

    /// All points with `start <= timestamp <= end` for a symbol, merged
    /// across both tiers in timestamp order
    ///
    /// Duplicates that exist on disk across non-compacted segments are
    /// returned as-is; `optimize` eliminates them.
    pub fn read_range(&self, symbol: &str, start: i64, end: i64) -> StoreResult<Vec<Point>> {
        let mut results = {
            let _guard = self.lock.read();
            self.buffer.get_range(symbol, start, end)
        };

        if results.is_empty() {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }

        results.extend(self.store.read_range(symbol, start, end)?);
        results.sort_by_key(|p| p.timestamp);
        Ok(results)
    }

    /// The maximum-timestamp point for a symbol
    ///
    /// Memory is consulted first; a flushed symbol falls back to the
    /// newest on-disk segment.
    pub fn get_latest(&self, symbol: &str) -> StoreResult<Option<Point>> {
        {
            let _guard = self.lock.read();
            if let Some(point) = self.buffer.get_latest(symbol) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(point));
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.store.read_latest(symbol)
    }

    /// All symbols known to either tier
    pub fn symbols(&self) -> HashSet<String> {
        let mut symbols = {
            let _guard = self.lock.read();
            self.buffer.symbols()
        };
        symbols.extend(self.store.symbols());
        symbols
    }

    /// Flush, then rewrite every symbol's segments as sorted,
    /// duplicate-free runs
    pub fn optimize(&self) {
        if !self.flush() {
            tracing::warn!("Flush failed before compaction; compacting disk tier only");
        }
        self.store.optimize_index();
    }

    /// Snapshot of engine counters and storage footprint
    pub fn stats(&self) -> EngineStats {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let cache_hit_ratio = if lookups > 0 {
            cache_hits as f64 / lookups as f64
        } else {
            0.0
        };

        EngineStats {
            total_points: self.total_points.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_ratio,
            storage_size_bytes: self.store.storage_size(),
        }
    }

    /// The engine's data directory
    pub fn data_dir(&self) -> &Path {
        &self.config.data_directory
    }
}

/// Engine statistics
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Points accepted by the write path since startup
    pub total_points: u64,
    /// Lookups answered from the memory tier
    pub cache_hits: u64,
    /// Lookups that had to consult the disk tier
    pub cache_misses: u64,
    /// Hits over total lookups, 0.0 before any lookup
    pub cache_hit_ratio: f64,
    /// Sum of indexed segment file sizes
    pub storage_size_bytes: u64,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Points: {}, Hits: {}, Misses: {}, Hit ratio: {:.2}, Size: {:.2} MB",
            self.total_points,
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_ratio,
            self.storage_size_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn create_test_engine() -> (StorageEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path());
        let engine = StorageEngine::new(config).unwrap();
        (engine, dir)
    }

    const T0: i64 = 1_700_000_000_000_000;

    fn spaced_points(symbol: &str, count: i64, base: i64, interval_us: i64) -> Vec<Point> {
        (0..count)
            .map(|i| Point::with_timestamp(symbol, 100.0 + i as f64, base + i * interval_us))
            .collect()
    }

    #[test]
    fn test_single_point_latest() {
        let (engine, _dir) = create_test_engine();

        let point = Point::with_timestamp("AAPL", 100.5, T0);
        assert!(engine.write_point(point.clone()));

        let latest = engine.get_latest("AAPL").unwrap().unwrap();
        assert_eq!(latest, point);
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let (engine, _dir) = create_test_engine();

        assert!(engine.write_point(Point::with_timestamp("AAPL", 100.5, T0)));
        assert!(!engine.write_point(Point::with_timestamp("AAPL", 200.0, T0)));

        let stats = engine.stats();
        assert_eq!(stats.total_points, 1);
    }

    #[test]
    fn test_range_query_inclusive_bounds() {
        let (engine, _dir) = create_test_engine();

        for point in spaced_points("AAPL", 100, T0, 1000) {
            assert!(engine.write_point(point));
        }

        // i = 0..=50 land inside [T0, T0 + 50_000]
        let points = engine.read_range("AAPL", T0, T0 + 50_000).unwrap();
        assert_eq!(points.len(), 51);
        assert_eq!(points.first().unwrap().timestamp, T0);
        assert_eq!(points.last().unwrap().timestamp, T0 + 50_000);
    }

    #[test]
    fn test_batches_flush_and_range() {
        let (engine, _dir) = create_test_engine();

        // Three batches of 100 points each, 60s apart
        for batch in 0..3 {
            let base = T0 + batch * 60 * 1_000_000;
            assert!(engine.write_batch(spaced_points("GOOG", 100, base, 1000)));
        }
        assert!(engine.flush());

        let points = engine
            .read_range("GOOG", T0, T0 + 180 * 1_000_000)
            .unwrap();
        assert_eq!(points.len(), 300);
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_duplicate_flushes_then_optimize() {
        let (engine, _dir) = create_test_engine();

        // Two batches over the same timestamps with different values; each
        // flush writes its own segment, so disk carries duplicates
        let first: Vec<Point> = (0..10)
            .map(|i| Point::with_timestamp("FB", 1.0 + i as f64, T0 + i * 1000))
            .collect();
        let second: Vec<Point> = (0..10)
            .map(|i| Point::with_timestamp("FB", 100.0 + i as f64, T0 + i * 1000))
            .collect();

        assert!(engine.write_batch(first.clone()));
        assert!(engine.flush());
        assert!(engine.write_batch(second));
        assert!(engine.flush());

        let duplicated = engine.read_range("FB", i64::MIN, i64::MAX).unwrap();
        assert_eq!(duplicated.len(), 20);

        engine.optimize();

        let collapsed = engine.read_range("FB", i64::MIN, i64::MAX).unwrap();
        assert_eq!(collapsed.len(), 10);
        assert!(collapsed
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        // The earlier segment's points survive compaction
        assert_eq!(collapsed, first);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let (engine, _dir) = create_test_engine();

        engine.write_batch(spaced_points("FB", 100, T0, 1000));
        engine.flush();
        engine.write_batch(spaced_points("FB", 100, T0, 1000));
        engine.flush();

        engine.optimize();
        let first = engine.read_range("FB", i64::MIN, i64::MAX).unwrap();

        engine.optimize();
        let second = engine.read_range("FB", i64::MIN, i64::MAX).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 100);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(StorageEngine::new(EngineConfig::new(dir.path())).unwrap());
        let mut handles = Vec::new();

        for writer in 0..2 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let symbol = format!("SYM{writer}");
                for i in 0..100 {
                    assert!(engine.write_point(Point::with_timestamp(
                        symbol.clone(),
                        i as f64,
                        T0 + i * 1000
                    )));
                }
            }));
        }

        for reader in 0..2 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let symbol = format!("SYM{reader}");
                for _ in 0..50 {
                    let points = engine.read_range(&symbol, i64::MIN, i64::MAX).unwrap();
                    assert!(points.len() <= 100);
                    assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for symbol in ["SYM0", "SYM1"] {
            let points = engine.read_range(symbol, i64::MIN, i64::MAX).unwrap();
            assert_eq!(points.len(), 100);
        }
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let written = spaced_points("FB", 100, T0, 1000);

        {
            let engine = StorageEngine::new(EngineConfig::new(dir.path())).unwrap();
            assert!(engine.write_batch(written.clone()));
            assert!(engine.flush());
        }

        let engine = StorageEngine::new(EngineConfig::new(dir.path())).unwrap();
        let restored = engine.read_range("FB", i64::MIN, i64::MAX).unwrap();
        assert_eq!(restored, written);
        assert!(engine.symbols().contains("FB"));
    }

    #[test]
    fn test_get_latest_falls_back_to_disk() {
        let (engine, _dir) = create_test_engine();

        engine.write_batch(spaced_points("AAPL", 50, T0, 1000));
        assert!(engine.flush());

        // Memory is empty now; the answer must come from segments
        let latest = engine.get_latest("AAPL").unwrap().unwrap();
        assert_eq!(latest.timestamp, T0 + 49 * 1000);

        let stats = engine.stats();
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_get_latest_unknown_symbol() {
        let (engine, _dir) = create_test_engine();
        assert!(engine.get_latest("NOPE").unwrap().is_none());
    }

    #[test]
    fn test_auto_flush_at_threshold() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::new(dir.path());
        config.max_memory_points = 100;
        let engine = StorageEngine::new(config).unwrap();

        engine.write_batch(spaced_points("AAPL", 100, T0, 1000));

        // Threshold reached: the batch is on disk, memory is empty
        let stats = engine.stats();
        assert!(stats.storage_size_bytes > 0);
        let points = engine.read_range("AAPL", i64::MIN, i64::MAX).unwrap();
        assert_eq!(points.len(), 100);
    }

    #[test]
    fn test_symbols_union_of_tiers() {
        let (engine, _dir) = create_test_engine();

        engine.write_batch(spaced_points("DISK", 10, T0, 1000));
        assert!(engine.flush());
        engine.write_point(Point::with_timestamp("MEM", 1.0, T0));

        let symbols = engine.symbols();
        assert!(symbols.contains("DISK"));
        assert!(symbols.contains("MEM"));
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn test_cross_tier_merge_is_sorted() {
        let (engine, _dir) = create_test_engine();

        engine.write_batch(spaced_points("AAPL", 10, T0, 2000));
        assert!(engine.flush());
        // Interleaved timestamps stay in memory
        engine.write_batch(spaced_points("AAPL", 10, T0 + 1000, 2000));

        let points = engine.read_range("AAPL", i64::MIN, i64::MAX).unwrap();
        assert_eq!(points.len(), 20);
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_stats() {
        let (engine, _dir) = create_test_engine();

        engine.write_batch(spaced_points("AAPL", 100, T0, 1000));
        assert!(engine.flush());

        let stats = engine.stats();
        assert_eq!(stats.total_points, 100);
        assert!(stats.storage_size_bytes > 0);
        assert_eq!(stats.cache_hit_ratio, 0.0);

        // A memory-answered lookup moves the ratio
        engine.write_point(Point::with_timestamp("AAPL", 1.0, T0 + 200_000));
        engine.get_latest("AAPL").unwrap();
        let stats = engine.stats();
        assert_eq!(stats.cache_hits, 1);
        assert!(stats.cache_hit_ratio > 0.0);
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let (engine, _dir) = create_test_engine();
        assert!(engine.flush());
        assert_eq!(engine.stats().storage_size_bytes, 0);
    }
}
