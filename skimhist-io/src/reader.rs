//! JSON readers for skim files, fill offsets and aggregation configuration.
//!

use crate::{Error, Result};
use log::{debug, info};
use skimhist_core::{AggregatorConfig, EventStore, FillId, OffsetTable};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Loads the three event streams of a skim file.
///
/// The document is an object with optional `singles`, `doubles` and
/// `triples` arrays; a missing array is an empty stream.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid skim
/// document.
pub fn read_skim_file<P: AsRef<Path>>(path: P) -> Result<EventStore> {
    let path = path.as_ref();
    let store = read_skim(BufReader::new(File::open(path)?))?;
    info!(
        "loaded {}: {} singles, {} doubles, {} triples",
        path.display(),
        store.singles.len(),
        store.doubles.len(),
        store.triples.len()
    );
    Ok(store)
}

/// Loads a skim document from any reader.
///
/// # Errors
/// Returns an error if the input is not a valid skim document.
pub fn read_skim<R: Read>(reader: R) -> Result<EventStore> {
    Ok(serde_json::from_reader(reader)?)
}

/// Loads per-fill time offsets (µs).
///
/// The document maps composite fill identifiers to offsets, for example
/// `{"1002003": 0.031}`.
///
/// # Errors
/// Returns an error if the file cannot be read, is malformed, or holds a
/// non-finite offset.
pub fn read_fill_offsets<P: AsRef<Path>>(path: P) -> Result<OffsetTable> {
    let path = path.as_ref();
    let table = parse_fill_offsets(BufReader::new(File::open(path)?))?;
    debug!(
        "loaded {} fill offsets from {} (max |offset| {})",
        table.len(),
        path.display(),
        table.max_abs()
    );
    Ok(table)
}

/// Parses a fill offset document from any reader.
///
/// # Errors
/// See [`read_fill_offsets`].
pub fn parse_fill_offsets<R: Read>(reader: R) -> Result<OffsetTable> {
    let raw: BTreeMap<i64, f64> = serde_json::from_reader(reader)?;
    if let Some((fill, offset)) = raw.iter().find(|(_, offset)| !offset.is_finite()) {
        return Err(Error::InvalidFormat(format!(
            "fill {fill} has non-finite offset {offset}"
        )));
    }
    Ok(raw
        .into_iter()
        .map(|(fill, offset)| (FillId(fill), offset))
        .collect())
}

/// Loads and validates an aggregation configuration.
///
/// Every field is optional and falls back to its default.
///
/// # Errors
/// Returns an error if the file cannot be read, is malformed, or describes
/// an invalid configuration.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AggregatorConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates an aggregation configuration from JSON text.
///
/// # Errors
/// See [`read_config`].
pub fn parse_config(json: &str) -> Result<AggregatorConfig> {
    let config: AggregatorConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skimhist_core::{FillOffsets, SubrunKey, Tagged};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SKIM: &str = r#"{
        "singles": [
            {"time": 40000.0, "energy": 2000.0, "calo_index": 3, "run_index": 1,
             "subrun_index": 2, "fill_index": 3, "timestamp": 100}
        ],
        "doubles": [
            {"run_index": 1, "subrun_index": 2, "fill_index": 3,
             "entries": [
                {"role": 0, "time": 40000.0, "energy": 1200.0, "calo_index": 3},
                {"role": 2, "time": 40000.0, "energy": 2400.0, "calo_index": 3}
             ]}
        ]
    }"#;

    #[test]
    fn test_read_skim() {
        let store = read_skim(SKIM.as_bytes()).unwrap();
        assert_eq!(store.singles.len(), 1);
        assert_eq!(store.doubles.len(), 1);
        assert!(store.triples.is_empty());
        assert_eq!(store.singles[0].subrun_key(), SubrunKey::new(1, 2));
        assert_eq!(store.singles[0].fill_id(), FillId(1_002_003));
        assert_eq!(store.doubles[0].entries[1].role, 2);
    }

    #[test]
    fn test_read_skim_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SKIM.as_bytes()).unwrap();
        let store = read_skim_file(file.path()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_read_skim_rejects_garbage() {
        assert!(matches!(read_skim("[1, 2".as_bytes()), Err(Error::Json(_))));
    }

    #[test]
    fn test_fill_offsets() {
        let table = parse_fill_offsets(r#"{"1002003": 0.25, "1002004": -0.5}"#.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert!((table.offset(FillId(1_002_004)) + 0.5).abs() < f64::EPSILON);
        assert!(table.offset(FillId(7)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = parse_config(r#"{"time_max": 300.0, "excluded_calos": [18]}"#).unwrap();
        assert!((config.time_max - 300.0).abs() < f64::EPSILON);
        assert!((config.energy_bin_width - 67.0).abs() < f64::EPSILON);
        assert_eq!(config.excluded_calos, vec![18]);
    }

    #[test]
    fn test_config_validation_error() {
        let err = parse_config(r#"{"energy_bin_width": -1.0}"#).unwrap_err();
        assert!(matches!(err, Error::CoreError(_)));
    }
}
