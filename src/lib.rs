//! # tickstore
//!
//! An embedded two-tier time-series storage engine for symbol-tagged
//! scalar observations.
//!
//! ## Features
//!
//! - **High-throughput ingest**: lock-striped in-memory buffer with
//!   per-symbol sorted sequences
//! - **Durable segments**: checksummed binary segment files with optional
//!   delta + LZ4 compressed payloads
//! - **Merged queries**: memory and disk tiers composed into one
//!   time-ordered answer
//! - **Compaction**: deduplicates and re-segments a symbol's history into
//!   evenly-sized sorted runs
//!
//! ## Modules
//!
//! - [`engine`]: the public storage engine façade
//! - [`buffer`]: the in-memory tier
//! - [`store`] / [`segment`]: the on-disk tier and its file format
//! - [`codec`]: delta + LZ4 payload codecs
//! - [`analytics`]: rolling statistics over query results
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickstore::{EngineConfig, Point, StorageEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::new(EngineConfig::new("tickstore_data"))?;
//!
//!     engine.write_point(Point::new("AAPL", 187.32));
//!     engine.flush();
//!
//!     let points = engine.read_range("AAPL", 0, i64::MAX)?;
//!     println!("Found {} points", points.len());
//!
//!     let latest = engine.get_latest("AAPL")?;
//!     println!("Latest: {latest:?}");
//!
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod segment;
pub mod store;
pub mod types;

// Re-export top-level types for convenience
pub use buffer::MemoryBuffer;
pub use codec::{compress_doubles, compress_points, decompress_doubles, decompress_points};
pub use config::{ConfigError, DiskConfig, EngineConfig};
pub use engine::{EngineStats, StorageEngine};
pub use error::{StoreError, StoreResult};
pub use segment::SegmentInfo;
pub use store::{SegmentStore, POINTS_PER_COMPACTED_SEGMENT};
pub use types::{Point, TimeRange};
