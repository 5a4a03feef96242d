//! HDF5/NeXus persistence for histogram series (`NXdata` per series).
//!
//! Layout:
//!
//! ```text
//! /entry                      NXentry, geometry attributes
//! /entry/<series name>        NXdata, one row per sub-run
//!     counts, sumw2           (n_subruns, n_time, n_energy) f64
//!     run_index, subrun_index (n_subruns,) i32
//!     label                   (n_subruns,) string
//!     entries, out_of_range   (n_subruns,)
//!     time, energy            bin edges
//! /entry/subrun_time          NXcollection of mean timestamps
//! ```

use crate::stored::StoredSeries;
use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use log::debug;
use ndarray::{s, ArrayView1, ArrayView3};
use skimhist_core::{
    BinAxis, Geometry, Histogram2D, SeriesEntry, SeriesId, SeriesSink, SubrunKey, SubrunTime,
};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

const FORMAT_VERSION: &str = "0.1";
const SERIES_AXES: [&str; 3] = ["subrun", "time", "energy"];
const SUBRUN_TIME_GROUP: &str = "subrun_time";

/// Series groups in the order [`skimhist_core::AggregatedSeries::write_to`]
/// emits them.
const WRITE_ORDER: [SeriesId; 4] = [
    SeriesId::Raw,
    SeriesId::Pileup,
    SeriesId::Double,
    SeriesId::Higher,
];

/// Dataset write configuration.
#[derive(Clone, Debug)]
pub struct SeriesWriteOptions {
    /// Rows per chunk for the 1-D per-sub-run datasets.
    pub chunk_rows: usize,
    pub compression: Option<u8>,
    pub shuffle: bool,
}

impl Default for SeriesWriteOptions {
    fn default() -> Self {
        Self {
            chunk_rows: 64,
            compression: Some(1),
            shuffle: true,
        }
    }
}

/// Streaming writer for histogram series.
///
/// Each snapshot is appended as one row of its series group as soon as it
/// is emitted.
pub struct Hdf5SeriesSink {
    file: File,
    options: SeriesWriteOptions,
    entry: Option<Group>,
    geometry: Option<Geometry>,
    series: HashMap<SeriesId, SeriesWriter>,
    times: Option<TimeWriter>,
}

impl Hdf5SeriesSink {
    /// Create a new series file.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: SeriesWriteOptions) -> Result<Self> {
        let file = File::create(path)?;
        set_attr_str_file(&file, "skimhist_format_version", FORMAT_VERSION)?;
        Ok(Self {
            file,
            options,
            entry: None,
            geometry: None,
            series: HashMap::new(),
            times: None,
        })
    }

    fn entry(&self) -> Result<&Group> {
        self.entry
            .as_ref()
            .ok_or_else(|| Error::InvalidFormat("series sink used before begin".to_string()))
    }
}

impl SeriesSink for Hdf5SeriesSink {
    type Error = Error;

    fn begin(&mut self, geometry: &Geometry) -> Result<()> {
        let entry = self.file.create_group("entry")?;
        set_attr_str_group(&entry, "NX_class", "NXentry")?;
        write_axis_attrs(&entry, "time", &geometry.time)?;
        write_axis_attrs(&entry, "energy", &geometry.energy)?;
        self.entry = Some(entry);
        self.geometry = Some(*geometry);
        Ok(())
    }

    fn emit_histogram(&mut self, series: SeriesId, entry: SeriesEntry) -> Result<()> {
        if !self.series.contains_key(&series) {
            let geometry = self
                .geometry
                .ok_or_else(|| Error::InvalidFormat("series sink used before begin".to_string()))?;
            let writer = SeriesWriter::new(self.entry()?, series, &geometry, &self.options)?;
            self.series.insert(series, writer);
        }
        match self.series.get_mut(&series) {
            Some(writer) => writer.append(&entry),
            None => Ok(()),
        }
    }

    fn emit_subrun_time(&mut self, record: SubrunTime) -> Result<()> {
        if self.times.is_none() {
            self.times = Some(TimeWriter::new(self.entry()?, &self.options)?);
        }
        match self.times.as_mut() {
            Some(writer) => writer.append(&record),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.entry()?;
        for (id, writer) in &self.series {
            debug!("{id}: wrote {} sub-runs", writer.rows);
        }
        self.file.flush()?;
        Ok(())
    }
}

struct SeriesWriter {
    counts: Dataset,
    sumw2: Dataset,
    run_index: Dataset,
    subrun_index: Dataset,
    label: Dataset,
    entries: Dataset,
    out_of_range: Dataset,
    shape: (usize, usize),
    rows: usize,
}

impl SeriesWriter {
    fn new(
        entry: &Group,
        id: SeriesId,
        geometry: &Geometry,
        options: &SeriesWriteOptions,
    ) -> Result<Self> {
        let group = entry.create_group(id.name())?;
        set_attr_str_group(&group, "NX_class", "NXdata")?;
        set_attr_str_group(&group, "signal", "counts")?;
        set_axes_attr(&group, &SERIES_AXES)?;

        let time_ds = create_fixed_dataset::<f64>(&group, "time", geometry.time.n_bins() + 1)?;
        set_dataset_units(&time_ds, "us")?;
        time_ds.write(ArrayView1::from(geometry.time.edges().as_slice()))?;

        let energy_ds =
            create_fixed_dataset::<f64>(&group, "energy", geometry.energy.n_bins() + 1)?;
        set_dataset_units(&energy_ds, "MeV")?;
        energy_ds.write(ArrayView1::from(geometry.energy.edges().as_slice()))?;

        let shape = (geometry.time.n_bins(), geometry.energy.n_bins());
        let counts = create_extendable_grid(&group, "counts", shape, options)?;
        let sumw2 = create_extendable_grid(&group, "sumw2", shape, options)?;

        Ok(Self {
            counts,
            sumw2,
            run_index: create_extendable_dataset::<i32>(&group, "run_index", options)?,
            subrun_index: create_extendable_dataset::<i32>(&group, "subrun_index", options)?,
            label: create_extendable_dataset::<VarLenUnicode>(
                &group,
                "label",
                &SeriesWriteOptions {
                    compression: None,
                    shuffle: false,
                    ..options.clone()
                },
            )?,
            entries: create_extendable_dataset::<u64>(&group, "entries", options)?,
            out_of_range: create_extendable_dataset::<f64>(&group, "out_of_range", options)?,
            shape,
            rows: 0,
        })
    }

    fn append(&mut self, entry: &SeriesEntry) -> Result<()> {
        let histogram = &entry.histogram;
        let geometry = histogram.geometry();
        if (geometry.time.n_bins(), geometry.energy.n_bins()) != self.shape {
            return Err(Error::CoreError(skimhist_core::Error::GeometryMismatch));
        }

        append_grid(&self.counts, self.rows, self.shape, histogram.contents())?;
        append_grid(&self.sumw2, self.rows, self.shape, histogram.sumw2())?;
        append_slice(&self.run_index, self.rows, &[entry.key.run])?;
        append_slice(&self.subrun_index, self.rows, &[entry.key.subrun])?;
        append_slice(&self.label, self.rows, &[to_var_len_unicode(&entry.label)?])?;
        append_slice(&self.entries, self.rows, &[histogram.entries()])?;
        append_slice(&self.out_of_range, self.rows, &[histogram.out_of_range()])?;
        self.rows += 1;
        Ok(())
    }
}

struct TimeWriter {
    run_index: Dataset,
    subrun_index: Dataset,
    mean_timestamp: Dataset,
    n_events: Dataset,
    rows: usize,
}

impl TimeWriter {
    fn new(entry: &Group, options: &SeriesWriteOptions) -> Result<Self> {
        let group = entry.create_group(SUBRUN_TIME_GROUP)?;
        set_attr_str_group(&group, "NX_class", "NXcollection")?;
        let mean_timestamp = create_extendable_dataset::<f64>(&group, "mean_timestamp", options)?;
        set_dataset_units(&mean_timestamp, "s")?;
        Ok(Self {
            run_index: create_extendable_dataset::<i32>(&group, "run_index", options)?,
            subrun_index: create_extendable_dataset::<i32>(&group, "subrun_index", options)?,
            mean_timestamp,
            n_events: create_extendable_dataset::<u64>(&group, "n_events", options)?,
            rows: 0,
        })
    }

    fn append(&mut self, record: &SubrunTime) -> Result<()> {
        append_slice(&self.run_index, self.rows, &[record.key.run])?;
        append_slice(&self.subrun_index, self.rows, &[record.key.subrun])?;
        append_slice(&self.mean_timestamp, self.rows, &[record.mean_timestamp])?;
        append_slice(&self.n_events, self.rows, &[record.n_events])?;
        self.rows += 1;
        Ok(())
    }
}

/// Reads a file written by [`Hdf5SeriesSink`].
///
/// Histograms come back grouped by series, in the order the aggregator
/// writes series.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or required datasets are missing.
pub fn read_series_hdf5<P: AsRef<Path>>(path: P) -> Result<StoredSeries> {
    let file = File::open(path)?;
    let entry = file.group("entry")?;
    let geometry = Geometry::new(
        read_axis_attrs(&entry, "time")?,
        read_axis_attrs(&entry, "energy")?,
    );

    let mut histograms = Vec::new();
    for id in WRITE_ORDER {
        if let Ok(group) = entry.group(id.name()) {
            read_series_group(&group, id, geometry, &mut histograms)?;
        }
    }

    let subrun_times = match entry.group(SUBRUN_TIME_GROUP) {
        Ok(group) => read_subrun_times(&group)?,
        Err(_) => Vec::new(),
    };

    Ok(StoredSeries {
        geometry,
        histograms,
        subrun_times,
    })
}

fn read_series_group(
    group: &Group,
    id: SeriesId,
    geometry: Geometry,
    out: &mut Vec<(SeriesId, SeriesEntry)>,
) -> Result<()> {
    let run_index = read_dataset_vec::<i32>(group, "run_index")?;
    let subrun_index = read_dataset_vec::<i32>(group, "subrun_index")?;
    let labels = read_dataset_vec::<VarLenUnicode>(group, "label")?;
    let entries = read_dataset_vec::<u64>(group, "entries")?;
    let out_of_range = read_dataset_vec::<f64>(group, "out_of_range")?;
    let counts = read_dataset_vec::<f64>(group, "counts")?;
    let sumw2 = read_dataset_vec::<f64>(group, "sumw2")?;

    let rows = run_index.len();
    let bins = geometry.len();
    if [subrun_index.len(), labels.len(), entries.len(), out_of_range.len()]
        .iter()
        .any(|&len| len != rows)
        || counts.len() != rows * bins
        || sumw2.len() != rows * bins
    {
        return Err(Error::InvalidFormat(format!(
            "{id}: per-sub-run datasets disagree on length"
        )));
    }

    for row in 0..rows {
        let range = row * bins..(row + 1) * bins;
        let histogram = Histogram2D::from_parts(
            geometry,
            counts[range.clone()].to_vec(),
            sumw2[range].to_vec(),
            entries[row],
            out_of_range[row],
        )?;
        out.push((
            id,
            SeriesEntry {
                key: SubrunKey::new(run_index[row], subrun_index[row]),
                label: labels[row].to_string(),
                histogram,
            },
        ));
    }
    Ok(())
}

fn read_subrun_times(group: &Group) -> Result<Vec<SubrunTime>> {
    let run_index = read_dataset_vec::<i32>(group, "run_index")?;
    let subrun_index = read_dataset_vec::<i32>(group, "subrun_index")?;
    let mean_timestamp = read_dataset_vec::<f64>(group, "mean_timestamp")?;
    let n_events = read_dataset_vec::<u64>(group, "n_events")?;
    let rows = run_index.len();
    if subrun_index.len() != rows || mean_timestamp.len() != rows || n_events.len() != rows {
        return Err(Error::InvalidFormat(
            "subrun_time datasets disagree on length".to_string(),
        ));
    }
    Ok((0..rows)
        .map(|row| SubrunTime {
            key: SubrunKey::new(run_index[row], subrun_index[row]),
            mean_timestamp: mean_timestamp[row],
            n_events: n_events[row],
        })
        .collect())
}

fn write_axis_attrs(group: &Group, name: &str, axis: &BinAxis) -> Result<()> {
    group
        .new_attr::<f64>()
        .create(format!("{name}_min").as_str())?
        .write_scalar(&axis.min())?;
    group
        .new_attr::<f64>()
        .create(format!("{name}_bin_width").as_str())?
        .write_scalar(&axis.width())?;
    group
        .new_attr::<u64>()
        .create(format!("{name}_n_bins").as_str())?
        .write_scalar(&(axis.n_bins() as u64))?;
    Ok(())
}

fn read_axis_attrs(group: &Group, name: &'static str) -> Result<BinAxis> {
    let min: f64 = group.attr(&format!("{name}_min"))?.read_scalar()?;
    let width: f64 = group.attr(&format!("{name}_bin_width"))?.read_scalar()?;
    let n_bins: u64 = group.attr(&format!("{name}_n_bins"))?.read_scalar()?;
    let n_bins = usize::try_from(n_bins)
        .map_err(|_| Error::InvalidFormat(format!("{name} axis bin count overflows")))?;
    Ok(BinAxis::with_bins(name, min, width, n_bins)?)
}

fn create_fixed_dataset<T: H5Type>(group: &Group, name: &str, len: usize) -> Result<Dataset> {
    Ok(group.new_dataset::<T>().shape((len,)).create(name)?)
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    options: &SeriesWriteOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((options.chunk_rows.max(1),));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn create_extendable_grid(
    group: &Group,
    name: &str,
    (n_time, n_energy): (usize, usize),
    options: &SeriesWriteOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<f64>()
        .shape((0.., n_time, n_energy))
        .chunk((1, n_time, n_energy));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn append_grid(
    dataset: &Dataset,
    row: usize,
    (n_time, n_energy): (usize, usize),
    data: &[f64],
) -> Result<()> {
    let view = ArrayView3::from_shape((1, n_time, n_energy), data)
        .map_err(|e| Error::InvalidFormat(format!("histogram shape mismatch: {e}")))?;
    dataset.resize((row + 1, n_time, n_energy))?;
    dataset.write_slice(view, s![row..=row, .., ..])?;
    Ok(())
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_axes_attr(group: &Group, axes: &[&str]) -> Result<()> {
    let values: Vec<VarLenUnicode> = axes
        .iter()
        .map(|axis| to_var_len_unicode(axis))
        .collect::<Result<Vec<_>>>()?;
    let attr = group
        .new_attr::<VarLenUnicode>()
        .shape((values.len(),))
        .create("axes")?;
    attr.write(ArrayView1::from(values.as_slice()))?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skimhist_core::AggregatorConfig;
    use tempfile::NamedTempFile;

    fn geometry() -> Geometry {
        AggregatorConfig::new()
            .with_time_axis(0.0, 3.0, 0.5)
            .with_energy_axis(1000.0, 1300.0, 100.0)
            .geometry()
            .unwrap()
    }

    fn entry(geometry: Geometry, id: SeriesId, subrun: i32, weight: f64) -> SeriesEntry {
        let mut histogram = Histogram2D::new(geometry);
        histogram.fill(1.2, 1150.0, weight);
        histogram.fill(5.0, 1150.0, 1.0);
        SeriesEntry {
            key: SubrunKey::new(9, subrun),
            label: id.label(subrun),
            histogram,
        }
    }

    fn options() -> SeriesWriteOptions {
        SeriesWriteOptions {
            chunk_rows: 2,
            compression: None,
            shuffle: false,
        }
    }

    #[test]
    fn test_hdf5_series_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let geometry = geometry();

        let mut sink = Hdf5SeriesSink::create(file.path(), options()).unwrap();
        sink.begin(&geometry).unwrap();
        sink.emit_histogram(SeriesId::Raw, entry(geometry, SeriesId::Raw, 1, 1.0))
            .unwrap();
        sink.emit_histogram(SeriesId::Raw, entry(geometry, SeriesId::Raw, 2, 2.0))
            .unwrap();
        sink.emit_histogram(SeriesId::Pileup, entry(geometry, SeriesId::Pileup, 1, -0.5))
            .unwrap();
        sink.emit_subrun_time(SubrunTime {
            key: SubrunKey::new(9, 1),
            mean_timestamp: 1_530_000_000.5,
            n_events: 2,
        })
        .unwrap();
        sink.finish().unwrap();
        drop(sink);

        let stored = read_series_hdf5(file.path()).unwrap();
        assert_eq!(stored.geometry, geometry);
        assert_eq!(stored.series(SeriesId::Raw).count(), 2);
        assert_eq!(stored.series(SeriesId::Double).count(), 0);

        let raw = stored.get(SeriesId::Raw, SubrunKey::new(9, 2)).unwrap();
        assert_eq!(raw.label, "EvsT_subrun2");
        assert_eq!(raw.histogram.get(2, 1), Some(2.0));
        assert_eq!(raw.histogram.entries(), 2);
        assert!((raw.histogram.out_of_range() - 1.0).abs() < f64::EPSILON);

        let pileup = stored.get(SeriesId::Pileup, SubrunKey::new(9, 1)).unwrap();
        assert_eq!(pileup.histogram.get(2, 1), Some(-0.5));
        assert_eq!(pileup.histogram.sumw2()[geometry.index(2, 1)], 0.25);

        assert_eq!(stored.subrun_times.len(), 1);
        assert_eq!(stored.subrun_times[0].n_events, 2);
    }

    #[test]
    fn test_emit_before_begin_fails() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = Hdf5SeriesSink::create(file.path(), options()).unwrap();
        let err = sink
            .emit_histogram(SeriesId::Raw, entry(geometry(), SeriesId::Raw, 1, 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = Hdf5SeriesSink::create(file.path(), options()).unwrap();
        sink.begin(&geometry()).unwrap();
        let other = AggregatorConfig::new()
            .with_time_axis(0.0, 2.0, 0.5)
            .with_energy_axis(1000.0, 1300.0, 100.0)
            .geometry()
            .unwrap();
        let err = sink
            .emit_histogram(SeriesId::Raw, entry(other, SeriesId::Raw, 1, 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::CoreError(_)));
    }
}
