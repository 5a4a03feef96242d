//! Per-sub-run histogram series and sub-run metadata records.

use std::fmt;

use crate::event::SubrunKey;
use crate::histogram::Histogram2D;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Names one of the histogram series an aggregator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SeriesId {
    /// Unweighted single-cluster spectrum.
    Raw,
    /// Double-pileup correction.
    Double,
    /// Triple and higher pileup correction.
    Higher,
    /// Total pileup correction (double + higher).
    Pileup,
}

impl SeriesId {
    /// Persisted series name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "EvsT",
            Self::Double => "EvsT_D",
            Self::Higher => "EvsT_H",
            Self::Pileup => "EvsT_PU",
        }
    }

    /// Human-readable label for one sub-run snapshot.
    #[must_use]
    pub fn label(self, subrun: i32) -> String {
        format!("{}_subrun{subrun}", self.name())
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One completed sub-run snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesEntry {
    pub key: SubrunKey,
    pub label: String,
    pub histogram: Histogram2D,
}

/// Append-only sequence of sub-run snapshots in discovery order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramSeries {
    id: SeriesId,
    entries: Vec<SeriesEntry>,
}

impl HistogramSeries {
    /// Creates an empty series.
    #[must_use]
    pub fn new(id: SeriesId) -> Self {
        Self {
            id,
            entries: Vec::new(),
        }
    }

    /// Appends a snapshot for `key`, labelled after this series.
    pub fn push(&mut self, key: SubrunKey, histogram: Histogram2D) {
        self.entries.push(SeriesEntry {
            key,
            label: self.id.label(key.subrun),
            histogram,
        });
    }

    /// Which series this is.
    #[must_use]
    pub fn id(&self) -> SeriesId {
        self.id
    }

    /// Number of snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no sub-run has been completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshots in discovery order.
    #[must_use]
    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    /// Iterates over snapshots in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &SeriesEntry> {
        self.entries.iter()
    }

    /// Looks up the snapshot of one sub-run.
    #[must_use]
    pub fn get(&self, key: SubrunKey) -> Option<&SeriesEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Consumes the series, yielding its snapshots.
    #[must_use]
    pub fn into_entries(self) -> Vec<SeriesEntry> {
        self.entries
    }
}

/// Mean event timestamp of one sub-run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubrunTime {
    pub key: SubrunKey,
    /// Arithmetic mean of the single-cluster GPS timestamps.
    pub mean_timestamp: f64,
    /// Number of clusters averaged.
    pub n_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BinAxis, Geometry};

    #[test]
    fn test_labels() {
        assert_eq!(SeriesId::Raw.label(12), "EvsT_subrun12");
        assert_eq!(SeriesId::Pileup.label(3), "EvsT_PU_subrun3");
        assert_eq!(SeriesId::Double.to_string(), "EvsT_D");
    }

    #[test]
    fn test_push_and_get() {
        let geometry = Geometry::new(
            BinAxis::snapped("time", 0.0, 2.0, 1.0).unwrap(),
            BinAxis::snapped("energy", 0.0, 2.0, 1.0).unwrap(),
        );
        let mut series = HistogramSeries::new(SeriesId::Higher);
        series.push(SubrunKey::new(1, 2), Histogram2D::new(geometry));
        series.push(SubrunKey::new(1, 5), Histogram2D::new(geometry));

        assert_eq!(series.len(), 2);
        assert_eq!(series.entries()[1].label, "EvsT_H_subrun5");
        assert!(series.get(SubrunKey::new(1, 5)).is_some());
        assert!(series.get(SubrunKey::new(2, 5)).is_none());
    }
}
