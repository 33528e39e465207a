//! Failure types for tickstore operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O error on the data directory or a segment file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A segment file opens with the wrong magic bytes.
    #[error("Not a tickstore segment: magic {0:?}")]
    BadMagic([u8; 4]),

    /// A segment file was written by a newer format revision.
    #[error("Segment format revision {0} is newer than this build understands")]
    UnsupportedRevision(u16),

    /// Stored and recomputed header checksums disagree.
    #[error("Segment header checksum mismatch: stored {stored}, computed {computed}")]
    HeaderChecksum {
        /// CRC32 recorded in the header.
        stored: u32,
        /// CRC32 recomputed over the header bytes.
        computed: u32,
    },

    /// A segment's payload disagrees with the point count its header claims.
    #[error("Segment {path:?} decoded {decoded} points, header claims {claimed}")]
    PointCountMismatch {
        /// Segment file in question.
        path: PathBuf,
        /// Point count recovered from the payload.
        decoded: u64,
        /// Point count recorded in the header.
        claimed: u64,
    },

    /// A point run with no points cannot become a segment.
    #[error("Refusing to write an empty segment")]
    EmptySegment,

    /// A point batch could not be encoded into a payload.
    #[error("Payload encoding failed: {0}")]
    Encode(String),

    /// A stored payload could not be decoded back into points.
    #[error("Payload decoding failed: {0}")]
    Decode(String),
}
