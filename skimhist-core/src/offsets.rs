//! Per-fill time offsets (fast-rotation / vertical-waist jitter).
//!
//! How the jitter values are generated is up to the caller; the aggregator
//! only needs a deterministic offset per composite fill identifier.

use std::collections::HashMap;

use crate::event::FillId;

/// Supplies the time offset, in µs, added to every cluster of a fill.
pub trait FillOffsets {
    /// Offset for `fill`. Must be identical for every call with the same id.
    fn offset(&self, fill: FillId) -> f64;
}

/// No jitter: every fill gets offset zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroOffsets;

impl FillOffsets for ZeroOffsets {
    #[inline]
    fn offset(&self, _fill: FillId) -> f64 {
        0.0
    }
}

/// Precomputed offsets keyed by fill. Fills not in the table get zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetTable {
    offsets: HashMap<FillId, f64>,
}

impl OffsetTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the offset for one fill, returning the previous value.
    pub fn insert(&mut self, fill: FillId, offset: f64) -> Option<f64> {
        self.offsets.insert(fill, offset)
    }

    /// Number of fills with an explicit offset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if no offsets are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Largest absolute offset, or zero for an empty table.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.offsets.values().fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }
}

impl FromIterator<(FillId, f64)> for OffsetTable {
    fn from_iter<I: IntoIterator<Item = (FillId, f64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

impl FillOffsets for OffsetTable {
    #[inline]
    fn offset(&self, fill: FillId) -> f64 {
        self.offsets.get(&fill).copied().unwrap_or(0.0)
    }
}
