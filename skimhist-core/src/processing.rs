//! One-shot aggregation of a pre-loaded [`EventStore`].

use log::debug;

use crate::aggregator::{AggregatedSeries, SubrunHistogramAggregator};
use crate::config::AggregatorConfig;
use crate::event::Tagged;
use crate::offsets::FillOffsets;
use crate::store::EventStore;
use crate::Result;

/// Feeds the three streams of `store` through a fresh aggregator.
///
/// Streams are consumed as separate passes (singles, doubles, then triples);
/// within each pass records keep their stored order. `offsets` supplies the
/// per-fill time offset.
///
/// # Errors
/// Returns a configuration error for an invalid `config`, or
/// [`crate::Error::SequenceOrder`] if a stream is not grouped by sub-run.
pub fn aggregate_store<O: FillOffsets + ?Sized>(
    store: &EventStore,
    config: &AggregatorConfig,
    offsets: &O,
) -> Result<AggregatedSeries> {
    let aggregator = SubrunHistogramAggregator::new(config)?;
    aggregate_store_with(aggregator, store, offsets)
}

/// As [`aggregate_store`], using an already configured aggregator.
///
/// # Errors
/// Returns [`crate::Error::SequenceOrder`] if a stream is not grouped by
/// sub-run.
pub fn aggregate_store_with<O: FillOffsets + ?Sized>(
    mut aggregator: SubrunHistogramAggregator,
    store: &EventStore,
    offsets: &O,
) -> Result<AggregatedSeries> {
    debug!(
        "aggregating {} singles, {} doubles, {} triples",
        store.singles.len(),
        store.doubles.len(),
        store.triples.len()
    );

    for event in &store.singles {
        aggregator.accumulate_single(event, offsets.offset(event.fill_id()))?;
    }
    for bundle in &store.doubles {
        aggregator.accumulate_double(bundle, offsets.offset(bundle.fill_id()))?;
    }
    for bundle in &store.triples {
        aggregator.accumulate_higher(bundle, offsets.offset(bundle.fill_id()))?;
    }

    aggregator.finalize()
}
