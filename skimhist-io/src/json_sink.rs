//! JSON persistence for histogram series.

use crate::stored::StoredSeries;
use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use skimhist_core::{
    BinAxis, Geometry, Histogram2D, SeriesEntry, SeriesId, SeriesSink, SubrunKey, SubrunTime,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// On-disk form of one sub-run snapshot. Bins are time-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistogramRecord {
    series: SeriesId,
    run_index: i32,
    subrun_index: i32,
    label: String,
    entries: u64,
    out_of_range: f64,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
}

/// On-disk form of one axis; the upper edge is derived, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AxisRecord {
    min: f64,
    bin_width: f64,
    n_bins: usize,
}

impl AxisRecord {
    fn from_axis(axis: &BinAxis) -> Self {
        Self {
            min: axis.min(),
            bin_width: axis.width(),
            n_bins: axis.n_bins(),
        }
    }

    fn to_axis(self, name: &'static str) -> Result<BinAxis> {
        Ok(BinAxis::with_bins(name, self.min, self.bin_width, self.n_bins)?)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct GeometryRecord {
    time: AxisRecord,
    energy: AxisRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeriesDocument {
    format_version: String,
    geometry: Option<GeometryRecord>,
    histograms: Vec<HistogramRecord>,
    subrun_times: Vec<SubrunTime>,
}

const FORMAT_VERSION: &str = "0.1";

/// Buffers every record and writes one JSON document on [`SeriesSink::finish`].
pub struct JsonSeriesSink<W: Write> {
    writer: W,
    document: SeriesDocument,
    pretty: bool,
}

impl JsonSeriesSink<BufWriter<File>> {
    /// Creates a sink writing to a new file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonSeriesSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            document: SeriesDocument {
                format_version: FORMAT_VERSION.to_string(),
                ..SeriesDocument::default()
            },
            pretty: false,
        }
    }

    /// Indents the output.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SeriesSink for JsonSeriesSink<W> {
    type Error = Error;

    fn begin(&mut self, geometry: &Geometry) -> Result<()> {
        self.document.geometry = Some(GeometryRecord {
            time: AxisRecord::from_axis(&geometry.time),
            energy: AxisRecord::from_axis(&geometry.energy),
        });
        Ok(())
    }

    fn emit_histogram(&mut self, series: SeriesId, entry: SeriesEntry) -> Result<()> {
        let SeriesEntry {
            key,
            label,
            histogram,
        } = entry;
        self.document.histograms.push(HistogramRecord {
            series,
            run_index: key.run,
            subrun_index: key.subrun,
            label,
            entries: histogram.entries(),
            out_of_range: histogram.out_of_range(),
            contents: histogram.contents().to_vec(),
            sumw2: histogram.sumw2().to_vec(),
        });
        Ok(())
    }

    fn emit_subrun_time(&mut self, record: SubrunTime) -> Result<()> {
        self.document.subrun_times.push(record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.document.geometry.is_none() {
            return Err(Error::InvalidFormat(
                "series sink finished before begin".to_string(),
            ));
        }
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &self.document)?;
        } else {
            serde_json::to_writer(&mut self.writer, &self.document)?;
        }
        self.writer.flush()?;
        debug!(
            "wrote {} histograms and {} sub-run times as JSON",
            self.document.histograms.len(),
            self.document.subrun_times.len()
        );
        Ok(())
    }
}

/// Reads a file written by [`JsonSeriesSink`].
///
/// # Errors
/// Returns an error if the file cannot be read or is malformed, if an axis
/// does not describe at least one bin of positive width, or if a histogram
/// does not match the stored geometry.
pub fn read_series_json<P: AsRef<Path>>(path: P) -> Result<StoredSeries> {
    parse_series_json(BufReader::new(File::open(path)?))
}

/// Reads a series document from any reader.
///
/// # Errors
/// See [`read_series_json`].
pub fn parse_series_json<R: Read>(reader: R) -> Result<StoredSeries> {
    let document: SeriesDocument = serde_json::from_reader(reader)?;
    let record = document
        .geometry
        .ok_or_else(|| Error::InvalidFormat("missing geometry".to_string()))?;
    let geometry = Geometry::new(record.time.to_axis("time")?, record.energy.to_axis("energy")?);

    let histograms = document
        .histograms
        .into_iter()
        .map(|record| -> Result<(SeriesId, SeriesEntry)> {
            let histogram = Histogram2D::from_parts(
                geometry,
                record.contents,
                record.sumw2,
                record.entries,
                record.out_of_range,
            )?;
            let entry = SeriesEntry {
                key: SubrunKey::new(record.run_index, record.subrun_index),
                label: record.label,
                histogram,
            };
            Ok((record.series, entry))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StoredSeries {
        geometry,
        histograms,
        subrun_times: document.subrun_times,
    })
}
