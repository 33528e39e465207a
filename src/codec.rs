//! Payload codecs for segment files
//!
//! `compress_points` / `decompress_points` carry a whole point batch. The
//! batch is laid out column-wise: timestamp gaps against the previous
//! point, values verbatim, and symbols as references into a small intern
//! table. The columns are serialized with `bincode` and squeezed through
//! LZ4; gaps in a dense batch form runs of near-identical integers, which
//! LZ4 compresses well. Round-trips are lossless on
//! `(symbol, timestamp, value)`.
//!
//! `compress_doubles` / `decompress_doubles` carry bare `f64` sequences as
//! a `u64` count followed by arithmetic deltas in little-endian bytes.

use crate::error::{StoreError, StoreResult};
use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Columnar form of a point batch, ready for serialization
#[derive(Debug, Serialize, Deserialize)]
struct PayloadBlock {
    /// Timestamp of the earliest point
    first_timestamp: i64,
    /// Gap between each point and its predecessor (first entry is zero)
    timestamp_gaps: Vec<i64>,
    /// Values, one per point, stored verbatim
    values: Vec<f64>,
    /// Distinct symbols in first-seen order
    symbol_table: Vec<String>,
    /// Per-point offset into `symbol_table`
    symbol_refs: Vec<u16>,
}

/// Compress a batch of points into a columnar delta + LZ4 payload
///
/// The input does not need to be sorted; output order is by timestamp.
pub fn compress_points(points: &[Point]) -> StoreResult<Vec<u8>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| points[i].timestamp);

    let first_timestamp = points[order[0]].timestamp;
    let mut block = PayloadBlock {
        first_timestamp,
        timestamp_gaps: Vec::with_capacity(points.len()),
        values: Vec::with_capacity(points.len()),
        symbol_table: Vec::new(),
        symbol_refs: Vec::with_capacity(points.len()),
    };

    let mut interned: HashMap<&str, u16> = HashMap::new();
    let mut prev_timestamp = first_timestamp;

    for &i in &order {
        let point = &points[i];

        block
            .timestamp_gaps
            .push(point.timestamp.wrapping_sub(prev_timestamp));
        prev_timestamp = point.timestamp;
        block.values.push(point.value);

        let slot = match interned.get(point.symbol.as_str()) {
            Some(&slot) => slot,
            None => {
                let slot = block.symbol_table.len() as u16;
                block.symbol_table.push(point.symbol.clone());
                interned.insert(point.symbol.as_str(), slot);
                slot
            }
        };
        block.symbol_refs.push(slot);
    }

    let encoded = bincode::serialize(&block).map_err(|e| StoreError::Encode(e.to_string()))?;
    Ok(lz4_flex::compress_prepend_size(&encoded))
}

/// Decompress a payload back to points, sorted by timestamp
pub fn decompress_points(data: &[u8]) -> StoreResult<Vec<Point>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let raw = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| StoreError::Decode(format!("lz4: {e}")))?;
    let block: PayloadBlock =
        bincode::deserialize(&raw).map_err(|e| StoreError::Decode(e.to_string()))?;

    if block.values.len() != block.timestamp_gaps.len()
        || block.symbol_refs.len() != block.timestamp_gaps.len()
    {
        return Err(StoreError::Decode(
            "value and symbol columns disagree with the timestamp column".to_string(),
        ));
    }

    let mut timestamp = block.first_timestamp;
    let points = block
        .timestamp_gaps
        .iter()
        .zip(&block.values)
        .zip(&block.symbol_refs)
        .map(|((&gap, &value), &slot)| {
            timestamp = timestamp.wrapping_add(gap);
            let symbol = block
                .symbol_table
                .get(slot as usize)
                .cloned()
                .unwrap_or_default();
            Point {
                symbol,
                timestamp,
                value,
            }
        })
        .collect();

    Ok(points)
}

/// Compress a sequence of doubles with arithmetic delta encoding
///
/// Layout: `u64` element count, then one little-endian `f64` delta per
/// element (the first delta is against zero).
pub fn compress_doubles(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + values.len() * 8);
    out.extend_from_slice(&(values.len() as u64).to_le_bytes());

    let mut prev = 0.0;
    for &value in values {
        let delta = value - prev;
        out.extend_from_slice(&delta.to_le_bytes());
        prev = value;
    }

    out
}

/// Decompress a delta-encoded sequence of doubles
pub fn decompress_doubles(data: &[u8]) -> StoreResult<Vec<f64>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 8 {
        return Err(StoreError::Decode(
            "double block shorter than its count prefix".to_string(),
        ));
    }

    let count = u64::from_le_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ]) as usize;

    let body = &data[8..];
    if body.len() != count * 8 {
        return Err(StoreError::Decode(format!(
            "double block claims {} elements but carries {} bytes",
            count,
            body.len()
        )));
    }

    let mut values = Vec::with_capacity(count);
    let mut prev = 0.0;
    for chunk in body.chunks_exact(8) {
        let delta = f64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        let value = prev + delta;
        values.push(value);
        prev = value;
    }

    Ok(values)
}
