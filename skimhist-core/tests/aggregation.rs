use approx::assert_abs_diff_eq;
use skimhist_core::{
    aggregate_store, AggregatorConfig, EventStore, Error, FillId, MemorySink, OffsetTable,
    PileupBundle, PileupEntry, SeriesId, SingleEvent, SubrunHistogramAggregator, SubrunKey,
    ZeroOffsets,
};

fn config() -> AggregatorConfig {
    AggregatorConfig::new()
        .with_time_axis(0.0, 700.0, 0.1492)
        .with_energy_axis(1050.0, 3060.0, 67.0)
}

fn single(run: i32, subrun: i32, time_ticks: f64, energy: f64, timestamp: u32) -> SingleEvent {
    SingleEvent::new(SubrunKey::new(run, subrun), 1, time_ticks, energy, timestamp)
}

#[test]
fn test_three_singles_two_subruns() {
    let mut agg = SubrunHistogramAggregator::new(&config()).unwrap();
    // 40000 ticks * 1.25e-3 = 50 µs
    agg.accumulate_single(&single(1, 1, 40_000.0, 2000.0, 100), 0.0)
        .unwrap();
    agg.accumulate_single(&single(1, 1, 40_000.0, 2000.0, 200), 0.0)
        .unwrap();
    agg.accumulate_single(&single(1, 2, 40_000.0, 2000.0, 300), 0.0)
        .unwrap();

    let out = agg.finalize().unwrap();
    assert_eq!(out.raw.len(), 2);

    let first = &out.raw.entries()[0];
    assert_eq!(first.key, SubrunKey::new(1, 1));
    assert_eq!(first.label, "EvsT_subrun1");
    assert_abs_diff_eq!(first.histogram.content_at(50.0, 2000.0).unwrap(), 2.0);

    let second = &out.raw.entries()[1];
    assert_eq!(second.label, "EvsT_subrun2");
    assert_abs_diff_eq!(second.histogram.content_at(50.0, 2000.0).unwrap(), 1.0);

    let means: Vec<f64> = out.subrun_times.iter().map(|t| t.mean_timestamp).collect();
    assert_eq!(means, vec![150.0, 300.0]);
    assert_eq!(out.subrun_times[0].n_events, 2);
}

#[test]
fn test_geometry_is_snapped() {
    let agg = SubrunHistogramAggregator::new(&config()).unwrap();
    let geometry = agg.geometry();
    assert_eq!(geometry.time.n_bins(), 4691);
    assert_abs_diff_eq!(geometry.time.max(), 699.8972, epsilon = 1e-9);
    assert_eq!(geometry.energy.n_bins(), 30);
    assert_abs_diff_eq!(geometry.energy.max(), 3060.0);
}

#[test]
fn test_upper_edge_is_excluded() {
    let config = AggregatorConfig::new()
        .with_time_axis(0.0, 10.0, 1.0)
        .with_energy_axis(0.0, 10.0, 1.0)
        .with_time_scale(1.0);
    let mut agg = SubrunHistogramAggregator::new(&config).unwrap();
    let at_max = SingleEvent::new(SubrunKey::new(1, 1), 0, 10.0, 5.0, 0);
    let below_min = SingleEvent::new(SubrunKey::new(1, 1), 0, -0.1, 5.0, 0);
    agg.accumulate_single(&at_max, 0.0).unwrap();
    agg.accumulate_single(&below_min, 0.0).unwrap();

    let out = agg.finalize().unwrap();
    let h = &out.raw.entries()[0].histogram;
    assert_abs_diff_eq!(h.integral(), 0.0);
    assert_abs_diff_eq!(h.out_of_range(), 2.0);
    assert_eq!(out.stats.out_of_range, 2);
}

#[test]
fn test_double_bundle_nets_minus_half() {
    let mut agg = SubrunHistogramAggregator::new(&config()).unwrap();
    let bundle = PileupBundle::new(
        SubrunKey::new(1, 1),
        3,
        vec![
            PileupEntry::new(0, 40_000.0, 1500.0, 5),
            PileupEntry::new(1, 40_100.0, 1200.0, 5),
            PileupEntry::new(2, 40_000.0, 2700.0, 5),
        ],
    );
    agg.accumulate_double(&bundle, 0.0).unwrap();
    let out = agg.finalize().unwrap();

    assert_eq!(out.double.len(), 1);
    assert_abs_diff_eq!(out.double.entries()[0].histogram.integral(), -0.5);
    // Combined series equals the double series when no triples exist.
    assert_eq!(out.pileup.len(), 1);
    assert_eq!(
        out.pileup.entries()[0].histogram.contents(),
        out.double.entries()[0].histogram.contents()
    );
}

#[test]
fn test_pileup_combination_adds_binwise() {
    let mut store = EventStore::new();
    let key = SubrunKey::new(7, 3);
    store.doubles.push(PileupBundle::new(
        key,
        1,
        vec![PileupEntry::new(2, 40_000.0, 2000.0, 1)],
    ));
    store.triples.push(PileupBundle::new(
        key,
        1,
        vec![
            PileupEntry::new(12, 40_000.0, 2000.0, 1),
            PileupEntry::new(3, 30_000.0, 1100.0, 1),
        ],
    ));

    let out = aggregate_store(&store, &config(), &ZeroOffsets).unwrap();
    assert_eq!(out.pileup.len(), 1);
    let d = &out.double.entries()[0].histogram;
    let h = &out.higher.entries()[0].histogram;
    let pu = &out.pileup.entries()[0].histogram;
    for (i, value) in pu.contents().iter().enumerate() {
        assert_abs_diff_eq!(*value, d.contents()[i] + h.contents()[i]);
    }
    assert_abs_diff_eq!(pu.integral(), 0.5);
    assert_eq!(out.pileup.entries()[0].label, "EvsT_PU_subrun3");
}

#[test]
fn test_offsets_shift_time() {
    let mut store = EventStore::new();
    let event = SingleEvent::new(SubrunKey::new(1, 2), 3, 8000.0, 2000.0, 0);
    let fill = FillId::from_indices(1, 2, 3);
    assert_eq!(fill.as_i64(), 1_002_003);
    store.singles.push(event);

    let offsets: OffsetTable = [(fill, 5.0)].into_iter().collect();
    let out = aggregate_store(&store, &config(), &offsets).unwrap();
    // 8000 ticks = 10 µs, plus 5 µs offset.
    let h = &out.raw.entries()[0].histogram;
    assert_abs_diff_eq!(h.content_at(15.0, 2000.0).unwrap(), 1.0);
    assert_abs_diff_eq!(h.content_at(10.0, 2000.0).unwrap(), 0.0);
}

#[test]
fn test_sequence_order_error() {
    let mut agg = SubrunHistogramAggregator::new(&config()).unwrap();
    agg.accumulate_single(&single(2, 1, 0.0, 2000.0, 0), 0.0)
        .unwrap();
    let err = agg
        .accumulate_single(&single(1, 9, 0.0, 2000.0, 0), 0.0)
        .unwrap_err();
    match err {
        Error::SequenceOrder {
            previous, current, ..
        } => {
            assert_eq!(previous, SubrunKey::new(2, 1));
            assert_eq!(current, SubrunKey::new(1, 9));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_store_produces_nothing() {
    let out = aggregate_store(&EventStore::new(), &config(), &ZeroOffsets).unwrap();
    let mut sink = MemorySink::new();
    out.write_to(&mut sink).unwrap();
    assert!(sink.histograms.is_empty());
    assert!(sink.subrun_times.is_empty());
    assert!(sink.finished);
    assert!(sink.geometry.is_some());
}

#[test]
fn test_intermediate_series_written_on_request() {
    let mut store = EventStore::new();
    store.doubles.push(PileupBundle::new(
        SubrunKey::new(1, 1),
        0,
        vec![PileupEntry::new(2, 40_000.0, 2000.0, 1)],
    ));
    let config = config().with_intermediate(true);
    let out = aggregate_store(&store, &config, &ZeroOffsets).unwrap();

    let mut sink = MemorySink::new();
    out.write_to(&mut sink).unwrap();
    let order: Vec<SeriesId> = sink.histograms.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![SeriesId::Pileup, SeriesId::Double]);
}

#[test]
fn test_excluded_calo_still_closes_subruns() {
    let config = config().with_excluded_calo(18);
    let mut agg = SubrunHistogramAggregator::new(&config).unwrap();
    agg.accumulate_single(&single(1, 1, 40_000.0, 2000.0, 10).with_calo(2), 0.0)
        .unwrap();
    agg.accumulate_single(&single(1, 2, 40_000.0, 2000.0, 20).with_calo(18), 0.0)
        .unwrap();

    let out = agg.finalize().unwrap();
    assert_eq!(out.raw.len(), 2);
    assert_abs_diff_eq!(out.raw.entries()[1].histogram.integral(), 0.0);
    assert_eq!(out.subrun_times.len(), 2);
}
