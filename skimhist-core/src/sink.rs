//! Output side of the aggregator.
//!
//! Completed series are handed to a [`SeriesSink`] one record at a time;
//! ownership of each snapshot moves into the sink.

use std::convert::Infallible;

use crate::geometry::Geometry;
use crate::series::{SeriesEntry, SeriesId, SubrunTime};

/// Receives completed histogram series and sub-run metadata.
///
/// Calls arrive as `begin`, then every histogram of a series in discovery
/// order (series by series), then the sub-run time records, then `finish`.
pub trait SeriesSink {
    /// Error reported by the persistence backend.
    type Error;

    /// Called once with the geometry shared by every histogram.
    ///
    /// # Errors
    /// Backend specific.
    fn begin(&mut self, geometry: &Geometry) -> Result<(), Self::Error> {
        let _ = geometry;
        Ok(())
    }

    /// Stores one sub-run snapshot of `series`.
    ///
    /// # Errors
    /// Backend specific.
    fn emit_histogram(&mut self, series: SeriesId, entry: SeriesEntry) -> Result<(), Self::Error>;

    /// Stores one sub-run mean-time record.
    ///
    /// # Errors
    /// Backend specific.
    fn emit_subrun_time(&mut self, record: SubrunTime) -> Result<(), Self::Error>;

    /// Called after the last record.
    ///
    /// # Errors
    /// Backend specific.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Keeps everything it is given in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub geometry: Option<Geometry>,
    pub histograms: Vec<(SeriesId, SeriesEntry)>,
    pub subrun_times: Vec<SubrunTime>,
    pub finished: bool,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots written for one series, in write order.
    pub fn series(&self, id: SeriesId) -> impl Iterator<Item = &SeriesEntry> {
        self.histograms
            .iter()
            .filter(move |(series, _)| *series == id)
            .map(|(_, entry)| entry)
    }
}

impl SeriesSink for MemorySink {
    type Error = Infallible;

    fn begin(&mut self, geometry: &Geometry) -> Result<(), Self::Error> {
        self.geometry = Some(*geometry);
        Ok(())
    }

    fn emit_histogram(&mut self, series: SeriesId, entry: SeriesEntry) -> Result<(), Self::Error> {
        self.histograms.push((series, entry));
        Ok(())
    }

    fn emit_subrun_time(&mut self, record: SubrunTime) -> Result<(), Self::Error> {
        self.subrun_times.push(record);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.finished = true;
        Ok(())
    }
}
