use approx::assert_abs_diff_eq;
use skimhist_core::{aggregate_store, SeriesId, SubrunKey, ZeroOffsets};
use skimhist_io::{
    parse_config, read_fill_offsets, read_series_json, read_skim_file, JsonSeriesSink,
};
use std::io::Write;
use tempfile::NamedTempFile;

const SKIM: &str = r#"{
    "singles": [
        {"time": 40000.0, "energy": 2000.0, "calo_index": 1, "run_index": 15921,
         "subrun_index": 1, "fill_index": 1, "timestamp": 100},
        {"time": 40000.0, "energy": 2000.0, "calo_index": 2, "run_index": 15921,
         "subrun_index": 1, "fill_index": 2, "timestamp": 200},
        {"time": 40000.0, "energy": 2000.0, "calo_index": 3, "run_index": 15921,
         "subrun_index": 2, "fill_index": 1, "timestamp": 300}
    ],
    "doubles": [
        {"run_index": 15921, "subrun_index": 1, "fill_index": 1, "entries": [
            {"role": 0, "time": 40000.0, "energy": 1200.0, "calo_index": 1},
            {"role": 1, "time": 40001.0, "energy": 1100.0, "calo_index": 1},
            {"role": 2, "time": 40000.0, "energy": 2300.0, "calo_index": 1}
        ]}
    ],
    "triples": [
        {"run_index": 15921, "subrun_index": 2, "fill_index": 1, "entries": [
            {"role": 12, "time": 40000.0, "energy": 2900.0, "calo_index": 4}
        ]}
    ]
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_skim_to_json_series() {
    let skim = write_temp(SKIM);
    let store = read_skim_file(skim.path()).unwrap();
    let config = parse_config(r#"{"include_intermediate": true}"#).unwrap();

    let out = aggregate_store(&store, &config, &ZeroOffsets).unwrap();
    assert_eq!(out.raw.len(), 2);
    assert_eq!(out.pileup.len(), 2);

    let target = NamedTempFile::new().unwrap();
    let mut sink = JsonSeriesSink::create(target.path()).unwrap();
    out.write_to(&mut sink).unwrap();
    drop(sink);

    let stored = read_series_json(target.path()).unwrap();
    let order: Vec<SeriesId> = stored.histograms.iter().map(|(id, _)| *id).collect();
    assert_eq!(
        order,
        vec![
            SeriesId::Raw,
            SeriesId::Raw,
            SeriesId::Pileup,
            SeriesId::Pileup,
            SeriesId::Double,
            SeriesId::Higher,
        ]
    );

    let raw = stored
        .get(SeriesId::Raw, SubrunKey::new(15921, 1))
        .unwrap();
    assert_abs_diff_eq!(raw.histogram.integral(), 2.0);

    let pileup_1 = stored
        .get(SeriesId::Pileup, SubrunKey::new(15921, 1))
        .unwrap();
    assert_abs_diff_eq!(pileup_1.histogram.integral(), -0.5);
    let pileup_2 = stored
        .get(SeriesId::Pileup, SubrunKey::new(15921, 2))
        .unwrap();
    assert_abs_diff_eq!(pileup_2.histogram.integral(), 0.5);

    let means: Vec<f64> = stored
        .subrun_times
        .iter()
        .map(|t| t.mean_timestamp)
        .collect();
    assert_eq!(means, vec![150.0, 300.0]);
}

#[test]
fn test_offsets_file_moves_fill() {
    let skim = write_temp(SKIM);
    let offsets = write_temp(r#"{"15921001002": 100.0}"#);

    let store = read_skim_file(skim.path()).unwrap();
    let offsets = read_fill_offsets(offsets.path()).unwrap();
    let config = parse_config("{}").unwrap();
    let out = aggregate_store(&store, &config, &offsets).unwrap();

    let h = &out.raw.entries()[0].histogram;
    assert_abs_diff_eq!(h.content_at(50.0, 2000.0).unwrap(), 1.0);
    assert_abs_diff_eq!(h.content_at(150.0, 2000.0).unwrap(), 1.0);
}

#[test]
fn test_unordered_skim_fails() {
    let skim = write_temp(
        r#"{"singles": [
            {"time": 1.0, "energy": 2000.0, "calo_index": 1, "run_index": 2,
             "subrun_index": 5, "fill_index": 1, "timestamp": 1},
            {"time": 1.0, "energy": 2000.0, "calo_index": 1, "run_index": 2,
             "subrun_index": 4, "fill_index": 1, "timestamp": 1}
        ]}"#,
    );
    let store = read_skim_file(skim.path()).unwrap();
    let config = parse_config("{}").unwrap();
    assert!(aggregate_store(&store, &config, &ZeroOffsets).is_err());
}
