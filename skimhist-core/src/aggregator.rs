//! Streaming sub-run histogram aggregation.
//!
//! Each event kind is fed as its own ordered pass. Every series remembers the
//! sub-run it is currently filling; when an event from a different sub-run
//! arrives, the in-progress histogram is snapshotted into the series under
//! the *previous* key, cleared, and filling continues. [`finalize`] flushes
//! whatever is still in progress and derives the total-pileup series.
//!
//! [`finalize`]: SubrunHistogramAggregator::finalize

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::event::{PileupBundle, SingleEvent, SubrunKey, Tagged};
use crate::geometry::Geometry;
use crate::histogram::Histogram2D;
use crate::pileup::PileupOrder;
use crate::series::{HistogramSeries, SeriesId, SubrunTime};
use crate::sink::SeriesSink;
use crate::{Error, Result};

/// Predicate selecting which calorimeters are filled.
pub type CaloFilter = Box<dyn Fn(u8) -> bool>;

/// Counters collected over one aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregationStats {
    /// Single clusters accepted.
    pub singles: u64,
    /// Pileup bundles accepted (double and higher).
    pub bundles: u64,
    /// Weighted pileup increments applied.
    pub pileup_fills: u64,
    /// Pileup sub-entries skipped for carrying an unweighted role.
    pub skipped_roles: u64,
    /// Clusters and sub-entries dropped by the calorimeter filter.
    pub excluded: u64,
    /// Fills that landed outside the bin geometry.
    pub out_of_range: u64,
}

/// One series under construction.
struct SeriesTracker {
    current: Option<SubrunKey>,
    histogram: Histogram2D,
    completed: HistogramSeries,
}

impl SeriesTracker {
    fn new(id: SeriesId, geometry: Geometry) -> Self {
        Self {
            current: None,
            histogram: Histogram2D::new(geometry),
            completed: HistogramSeries::new(id),
        }
    }

    /// Moves the tracker to `key`, flushing the previous sub-run if `key`
    /// starts a new one. Returns the sub-run that was closed.
    fn advance(&mut self, key: SubrunKey) -> Result<Option<SubrunKey>> {
        match self.current {
            None => {
                self.current = Some(key);
                Ok(None)
            }
            Some(previous) if key == previous => Ok(None),
            Some(previous) if key < previous => Err(Error::SequenceOrder {
                series: self.completed.id(),
                previous,
                current: key,
            }),
            Some(previous) => {
                self.flush();
                self.current = Some(key);
                Ok(Some(previous))
            }
        }
    }

    /// Snapshots the in-progress histogram under the current key.
    fn flush(&mut self) {
        if let Some(key) = self.current.take() {
            let histogram = self.histogram.take();
            debug!(
                "{}: closed {key} (entries {}, integral {})",
                self.completed.id(),
                histogram.entries(),
                histogram.integral()
            );
            self.completed.push(key, histogram);
        }
    }

    fn fill(&mut self, time: f64, energy: f64, weight: f64, stats: &mut AggregationStats) {
        if !self.histogram.fill(time, energy, weight) {
            stats.out_of_range += 1;
        }
    }
}

/// Running mean of single-cluster timestamps for the open sub-run.
#[derive(Debug, Default)]
struct TimestampMean {
    sum: u128,
    count: u64,
}

impl TimestampMean {
    fn push(&mut self, timestamp: u32) {
        self.sum += u128::from(timestamp);
        self.count += 1;
    }

    /// Closes the sub-run, yielding its record if any timestamp was seen.
    #[allow(clippy::cast_precision_loss)]
    fn close(&mut self, key: SubrunKey) -> Option<SubrunTime> {
        let record = (self.count > 0).then(|| SubrunTime {
            key,
            mean_timestamp: self.sum as f64 / self.count as f64,
            n_events: self.count,
        });
        *self = Self::default();
        record
    }
}

/// Builds per-sub-run energy-vs-time histograms from ordered event streams.
pub struct SubrunHistogramAggregator {
    geometry: Geometry,
    time_scale: f64,
    cyclotron_period: f64,
    include_intermediate: bool,
    calo_filter: Option<CaloFilter>,
    raw: SeriesTracker,
    double: SeriesTracker,
    higher: SeriesTracker,
    timestamps: TimestampMean,
    subrun_times: Vec<SubrunTime>,
    stats: AggregationStats,
}

impl SubrunHistogramAggregator {
    /// Creates an aggregator with the geometry and constants of `config`.
    ///
    /// A non-empty `excluded_calos` list installs a calorimeter filter.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: &AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let geometry = config.geometry()?;

        let calo_filter: Option<CaloFilter> = if config.excluded_calos.is_empty() {
            None
        } else {
            let excluded = config.excluded_calos.clone();
            Some(Box::new(move |calo| !excluded.contains(&calo)))
        };

        Ok(Self {
            geometry,
            time_scale: config.time_scale,
            cyclotron_period: config.cyclotron_period,
            include_intermediate: config.include_intermediate,
            calo_filter,
            raw: SeriesTracker::new(SeriesId::Raw, geometry),
            double: SeriesTracker::new(SeriesId::Double, geometry),
            higher: SeriesTracker::new(SeriesId::Higher, geometry),
            timestamps: TimestampMean::default(),
            subrun_times: Vec::new(),
            stats: AggregationStats::default(),
        })
    }

    /// Replaces the calorimeter filter. The predicate returns true for
    /// calorimeters that should be filled.
    #[must_use]
    pub fn with_calo_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(u8) -> bool + 'static,
    {
        self.calo_filter = Some(Box::new(filter));
        self
    }

    /// Shared bin geometry.
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Completed snapshots of one series (the in-progress sub-run excluded).
    ///
    /// The combined series only exists after [`Self::finalize`], so
    /// [`SeriesId::Pileup`] yields `None`.
    #[must_use]
    pub fn completed(&self, id: SeriesId) -> Option<&HistogramSeries> {
        match id {
            SeriesId::Raw => Some(&self.raw.completed),
            SeriesId::Double => Some(&self.double.completed),
            SeriesId::Higher => Some(&self.higher.completed),
            SeriesId::Pileup => None,
        }
    }

    /// Completed sub-run time records.
    #[must_use]
    pub fn subrun_times(&self) -> &[SubrunTime] {
        &self.subrun_times
    }

    /// Adds one single cluster to the raw series.
    ///
    /// `time_offset` (µs) is added after unit conversion, before binning.
    ///
    /// # Errors
    /// Returns [`Error::SequenceOrder`] if the event's sub-run precedes the
    /// one currently open; nothing is recorded in that case.
    pub fn accumulate_single(&mut self, event: &SingleEvent, time_offset: f64) -> Result<()> {
        if let Some(closed) = self.raw.advance(event.subrun_key())? {
            if let Some(record) = self.timestamps.close(closed) {
                self.subrun_times.push(record);
            }
        }

        self.timestamps.push(event.timestamp);
        self.stats.singles += 1;

        if !accepts(self.calo_filter.as_deref(), event.calo_index) {
            self.stats.excluded += 1;
            return Ok(());
        }

        let time = event.time * self.time_scale + time_offset;
        self.raw.fill(time, event.energy, 1.0, &mut self.stats);
        Ok(())
    }

    /// Adds one double-pileup bundle to the double series.
    ///
    /// # Errors
    /// See [`Self::accumulate_bundle`].
    pub fn accumulate_double(&mut self, bundle: &PileupBundle, time_offset: f64) -> Result<()> {
        self.accumulate_bundle(PileupOrder::Double, bundle, time_offset)
    }

    /// Adds one triple-pileup bundle to the higher series.
    ///
    /// # Errors
    /// See [`Self::accumulate_bundle`].
    pub fn accumulate_higher(&mut self, bundle: &PileupBundle, time_offset: f64) -> Result<()> {
        self.accumulate_bundle(PileupOrder::Higher, bundle, time_offset)
    }

    /// Adds every weighted sub-entry of `bundle` to the series of `order`.
    ///
    /// Each sub-entry is binned at `time * time_scale + time_offset + addend`
    /// with the signed weight of its role; roles without a weight are
    /// skipped.
    ///
    /// # Errors
    /// Returns [`Error::SequenceOrder`] if the bundle's sub-run precedes the
    /// one currently open; nothing is recorded in that case.
    pub fn accumulate_bundle(
        &mut self,
        order: PileupOrder,
        bundle: &PileupBundle,
        time_offset: f64,
    ) -> Result<()> {
        let tracker = match order {
            PileupOrder::Double => &mut self.double,
            PileupOrder::Higher => &mut self.higher,
        };
        tracker.advance(bundle.subrun_key())?;
        self.stats.bundles += 1;

        let shift = time_offset + order.time_addend(self.cyclotron_period);
        let filter = self.calo_filter.as_deref();

        for entry in &bundle.entries {
            if !accepts(filter, entry.calo_index) {
                self.stats.excluded += 1;
                continue;
            }
            let Some(weight) = order.weight(entry.role) else {
                self.stats.skipped_roles += 1;
                continue;
            };
            let time = entry.time * self.time_scale + shift;
            tracker.fill(time, entry.energy, weight, &mut self.stats);
            self.stats.pileup_fills += 1;
        }
        Ok(())
    }

    /// Flushes every in-progress sub-run and builds the total-pileup series.
    ///
    /// # Errors
    /// Returns [`Error::GeometryMismatch`] if the double and higher
    /// histograms cannot be added, which only happens on internal misuse.
    pub fn finalize(mut self) -> Result<AggregatedSeries> {
        if let Some(key) = self.raw.current {
            if let Some(record) = self.timestamps.close(key) {
                self.subrun_times.push(record);
            }
        }
        self.raw.flush();
        self.double.flush();
        self.higher.flush();

        let pileup = combine_pileup(&self.double.completed, &self.higher.completed)?;

        info!(
            "aggregated {} singles and {} pileup bundles into {} raw / {} pileup sub-runs",
            self.stats.singles,
            self.stats.bundles,
            self.raw.completed.len(),
            pileup.len()
        );
        if self.stats.out_of_range > 0 {
            debug!("{} fills fell outside the bin geometry", self.stats.out_of_range);
        }

        Ok(AggregatedSeries {
            geometry: self.geometry,
            raw: self.raw.completed,
            double: self.double.completed,
            higher: self.higher.completed,
            pileup,
            subrun_times: self.subrun_times,
            stats: self.stats,
            include_intermediate: self.include_intermediate,
        })
    }
}

#[inline]
fn accepts(filter: Option<&dyn Fn(u8) -> bool>, calo_index: u8) -> bool {
    filter.is_none_or(|f| f(calo_index))
}

/// Sums the double and higher series sub-run by sub-run.
///
/// Sub-runs are paired by key. A sub-run present on only one side is combined
/// with an all-zero histogram. Output follows the double series' order, then
/// sub-runs found only in the higher series in their own order.
///
/// # Errors
/// Returns [`Error::GeometryMismatch`] if paired histograms differ in geometry.
pub fn combine_pileup(
    double: &HistogramSeries,
    higher: &HistogramSeries,
) -> Result<HistogramSeries> {
    let higher_by_key: HashMap<SubrunKey, &Histogram2D> = higher
        .iter()
        .map(|entry| (entry.key, &entry.histogram))
        .collect();
    let double_keys: HashSet<SubrunKey> = double.iter().map(|entry| entry.key).collect();

    let mut combined = HistogramSeries::new(SeriesId::Pileup);

    for entry in double.iter() {
        let mut sum = entry.histogram.clone();
        match higher_by_key.get(&entry.key) {
            Some(other) => sum.add(other)?,
            None => warn!("{}: {} has no higher-pileup counterpart", SeriesId::Pileup, entry.key),
        }
        combined.push(entry.key, sum);
    }

    for entry in higher.iter().filter(|entry| !double_keys.contains(&entry.key)) {
        warn!("{}: {} has no double-pileup counterpart", SeriesId::Pileup, entry.key);
        combined.push(entry.key, entry.histogram.clone());
    }

    Ok(combined)
}

/// Everything an aggregation produced.
#[derive(Debug, Clone)]
pub struct AggregatedSeries {
    pub geometry: Geometry,
    pub raw: HistogramSeries,
    pub double: HistogramSeries,
    pub higher: HistogramSeries,
    pub pileup: HistogramSeries,
    pub subrun_times: Vec<SubrunTime>,
    pub stats: AggregationStats,
    /// Whether [`Self::write_to`] also emits the double and higher series.
    pub include_intermediate: bool,
}

impl AggregatedSeries {
    /// Hands every persisted series to `sink`.
    ///
    /// Order: raw, combined pileup, (double, higher when intermediate
    /// series are included), then sub-run time records.
    ///
    /// # Errors
    /// Propagates the first sink error.
    pub fn write_to<S: SeriesSink + ?Sized>(self, sink: &mut S) -> std::result::Result<(), S::Error> {
        sink.begin(&self.geometry)?;

        let mut series = vec![self.raw, self.pileup];
        if self.include_intermediate {
            series.push(self.double);
            series.push(self.higher);
        }

        for s in series {
            let id = s.id();
            for entry in s.into_entries() {
                sink.emit_histogram(id, entry)?;
            }
        }

        for record in self.subrun_times {
            sink.emit_subrun_time(record)?;
        }

        sink.finish()
    }
}
