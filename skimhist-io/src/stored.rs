//! Series read back from a persisted file.

use skimhist_core::{Geometry, SeriesEntry, SeriesId, SubrunKey, SubrunTime};

/// Everything a series file holds, in write order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    pub geometry: Geometry,
    pub histograms: Vec<(SeriesId, SeriesEntry)>,
    pub subrun_times: Vec<SubrunTime>,
}

impl StoredSeries {
    /// Snapshots of one series, in write order.
    pub fn series(&self, id: SeriesId) -> impl Iterator<Item = &SeriesEntry> {
        self.histograms
            .iter()
            .filter(move |(series, _)| *series == id)
            .map(|(_, entry)| entry)
    }

    /// Snapshot of one series for one sub-run.
    #[must_use]
    pub fn get(&self, id: SeriesId, key: SubrunKey) -> Option<&SeriesEntry> {
        self.series(id).find(|entry| entry.key == key)
    }
}
