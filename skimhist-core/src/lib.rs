//! skimhist-core: Sub-run histogram aggregation for calorimeter skim data.
//!
//! This crate turns ordered streams of single clusters and pileup bundles
//! into per-sub-run energy-vs-time histograms, plus a combined pileup
//! correction series and per-sub-run mean timestamps.
//!

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod histogram;
pub mod offsets;
pub mod pileup;
pub mod processing;
pub mod series;
pub mod sink;
pub mod store;

pub use aggregator::{
    combine_pileup, AggregatedSeries, AggregationStats, CaloFilter, SubrunHistogramAggregator,
};
pub use config::{AggregatorConfig, CLOCK_TICK_US, CYCLOTRON_PERIOD_US};
pub use error::{Error, Result};
pub use event::{FillId, PileupBundle, PileupEntry, SingleEvent, SubrunKey, Tagged};
pub use geometry::{snap_range, BinAxis, Geometry};
pub use histogram::Histogram2D;
pub use offsets::{FillOffsets, OffsetTable, ZeroOffsets};
pub use pileup::PileupOrder;
pub use processing::{aggregate_store, aggregate_store_with};
pub use series::{HistogramSeries, SeriesEntry, SeriesId, SubrunTime};
pub use sink::{MemorySink, SeriesSink};
pub use store::EventStore;
