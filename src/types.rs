//! Core data types for the tickstore storage engine
//!
//! This module defines the two types used throughout the storage layer:
//! - `Point`: a single observation of a symbol at a point in time
//! - `TimeRange`: a closed time interval for queries

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single time-series observation
///
/// One measured value for one symbol at one microsecond-precision instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// Symbol this observation belongs to (opaque identifier)
    pub symbol: String,
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
    /// The observed value
    pub value: f64,
}

impl Point {
    /// Create a new point with the current timestamp
    pub fn new(symbol: impl Into<String>, value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp: Utc::now().timestamp_micros(),
            value,
        }
    }

    /// Create a point with a specific timestamp
    pub fn with_timestamp(symbol: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            value,
        }
    }
}

/// Time range for queries (closed interval: [start, end])
///
/// Both bounds are inclusive. A query ending exactly on a sample's
/// timestamp returns that sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in microseconds
    pub start: i64,
    /// End timestamp (inclusive), in microseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range
    ///
    /// # Panics
    /// Panics if start > end
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start <= end, "TimeRange: start must not exceed end");
        Self { start, end }
    }

    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// The range covering every representable timestamp
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Get the duration in microseconds
    pub fn duration_micros(&self) -> i64 {
        self.end - self.start
    }

    /// Get intersection with another range, if any
    pub fn intersection(&self, other: &TimeRange) -> Option<Self> {
        Self::try_new(self.start.max(other.start), self.end.min(other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_creation() {
        let point = Point::with_timestamp("AAPL", 100.5, 1_700_000_000_000_000);

        assert_eq!(point.symbol, "AAPL");
        assert_eq!(point.value, 100.5);
        assert_eq!(point.timestamp, 1_700_000_000_000_000);
    }

    #[test]
    fn test_point_now_is_recent() {
        let before = Utc::now().timestamp_micros();
        let point = Point::new("AAPL", 1.0);
        let after = Utc::now().timestamp_micros();

        assert!(point.timestamp >= before);
        assert!(point.timestamp <= after);
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(1000, 2000);

        assert!(!range.contains(999));
        assert!(range.contains(1000));
        assert!(range.contains(1500));
        assert!(range.contains(2000));
        assert!(!range.contains(2001));
    }

    #[test]
    fn test_time_range_overlaps() {
        let range1 = TimeRange::new(1000, 2000);
        let range2 = TimeRange::new(1500, 2500);
        let range3 = TimeRange::new(2000, 3000); // Touching at the bound
        let range4 = TimeRange::new(2001, 3000);

        assert!(range1.overlaps(&range2));
        assert!(range1.overlaps(&range3)); // Closed interval: bound is shared
        assert!(!range1.overlaps(&range4));
    }

    #[test]
    fn test_time_range_intersection() {
        let range1 = TimeRange::new(1000, 2000);
        let range2 = TimeRange::new(1500, 2500);

        let intersection = range1.intersection(&range2).unwrap();
        assert_eq!(intersection, TimeRange::new(1500, 2000));

        let disjoint = TimeRange::new(3000, 4000);
        assert!(range1.intersection(&disjoint).is_none());
    }

    #[test]
    fn test_time_range_all() {
        let range = TimeRange::all();
        assert!(range.contains(i64::MIN));
        assert!(range.contains(0));
        assert!(range.contains(i64::MAX));
    }
}
