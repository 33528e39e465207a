//! In-memory tier of the storage engine
//!
//! Keeps one timestamp-sorted sequence of points per symbol. Sequences are
//! strictly increasing in timestamp: an insert whose timestamp already
//! exists for the symbol is rejected, and batch merges keep the
//! earliest-arriving point for each distinct timestamp.
//!
//! Synchronization is two-level: a global reader/writer lock guards the
//! symbol map, and each symbol's sequence carries its own reader/writer
//! lock. Lock order is always global first, then per-symbol.

use crate::types::Point;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type SymbolSequence = Arc<RwLock<Vec<Point>>>;

/// Per-symbol sorted in-memory buffer
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    symbols: RwLock<HashMap<String, SymbolSequence>>,
    total_points: AtomicUsize,
}

impl MemoryBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the sequence for a symbol, creating it if absent
    fn entry(&self, symbol: &str) -> SymbolSequence {
        {
            let map = self.symbols.read();
            if let Some(sequence) = map.get(symbol) {
                return Arc::clone(sequence);
            }
        }

        // Another thread may have created the entry between the read and
        // write acquisitions; the entry API re-checks under the write lock.
        let mut map = self.symbols.write();
        Arc::clone(map.entry(symbol.to_string()).or_default())
    }

    /// Insert a single point in sorted position
    ///
    /// Returns `false` if a point with the same timestamp already exists
    /// for the symbol (the buffer is left unchanged).
    pub fn insert(&self, point: Point) -> bool {
        let sequence = self.entry(&point.symbol);
        let mut points = sequence.write();

        match points.binary_search_by_key(&point.timestamp, |p| p.timestamp) {
            Ok(_) => false,
            Err(idx) => {
                points.insert(idx, point);
                self.total_points.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    /// Insert a batch of points, merging per symbol
    ///
    /// Each symbol group is sorted and merged with the existing sequence;
    /// for every distinct timestamp the earliest-arriving point wins and
    /// later duplicates are dropped.
    pub fn insert_batch(&self, points: Vec<Point>) -> bool {
        if points.is_empty() {
            return true;
        }

        let mut grouped: HashMap<String, Vec<Point>> = HashMap::new();
        for point in points {
            grouped.entry(point.symbol.clone()).or_default().push(point);
        }

        for (symbol, mut group) in grouped {
            // Stable sort keeps arrival order among equal timestamps
            group.sort_by_key(|p| p.timestamp);

            let sequence = self.entry(&symbol);
            let mut points = sequence.write();
            let previous_len = points.len();

            let existing = std::mem::take(&mut *points);
            let merged = merge_keep_first(existing, group);
            let admitted = merged.len() - previous_len;

            *points = merged;
            self.total_points.fetch_add(admitted, Ordering::Relaxed);
        }

        true
    }

    /// The maximum-timestamp point for a symbol, if any
    pub fn get_latest(&self, symbol: &str) -> Option<Point> {
        let sequence = {
            let map = self.symbols.read();
            Arc::clone(map.get(symbol)?)
        };

        let points = sequence.read();
        points.last().cloned()
    }

    /// All points with `start <= timestamp <= end`, in timestamp order
    pub fn get_range(&self, symbol: &str, start: i64, end: i64) -> Vec<Point> {
        if start > end {
            return Vec::new();
        }

        let sequence = {
            let map = self.symbols.read();
            match map.get(symbol) {
                Some(sequence) => Arc::clone(sequence),
                None => return Vec::new(),
            }
        };

        let points = sequence.read();
        let lo = points.partition_point(|p| p.timestamp < start);
        let hi = points.partition_point(|p| p.timestamp <= end);
        points[lo..hi].to_vec()
    }

    /// Empty every sequence, retaining symbol keys
    pub fn clear(&self) {
        let map = self.symbols.write();
        for sequence in map.values() {
            sequence.write().clear();
        }
        self.total_points.store(0, Ordering::Relaxed);
    }

    /// Snapshot of current symbol names
    pub fn symbols(&self) -> HashSet<String> {
        let map = self.symbols.read();
        map.keys().cloned().collect()
    }

    /// Total live point count across all symbols
    pub fn size(&self) -> usize {
        self.total_points.load(Ordering::Relaxed)
    }

    /// True if no symbol holds any point
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Merge two timestamp-sorted runs, keeping the first-seen point per
/// distinct timestamp (ties favor `existing`)
fn merge_keep_first(existing: Vec<Point>, incoming: Vec<Point>) -> Vec<Point> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut a = existing.into_iter().peekable();
    let mut b = incoming.into_iter().peekable();

    loop {
        let take_existing = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => x.timestamp <= y.timestamp,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        if take_existing {
            if let Some(point) = a.next() {
                merged.push(point);
            }
        } else if let Some(point) = b.next() {
            merged.push(point);
        }
    }

    merged.dedup_by(|current, previous| current.timestamp == previous.timestamp);
    merged
}
