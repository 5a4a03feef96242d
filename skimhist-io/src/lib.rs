//! skimhist-io: Skim file loading and series persistence for skimhist.
//!
//! This crate reads skim event streams, fill offsets and aggregation
//! configuration from JSON, and provides [`skimhist_core::SeriesSink`]
//! implementations writing JSON and (with the `hdf5` feature) HDF5/NeXus.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod json_sink;
mod reader;
mod stored;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use crate::hdf5::{read_series_hdf5, Hdf5SeriesSink, SeriesWriteOptions};
pub use json_sink::{parse_series_json, read_series_json, JsonSeriesSink};
pub use reader::{
    parse_config, parse_fill_offsets, read_config, read_fill_offsets, read_skim, read_skim_file,
};
pub use stored::StoredSeries;
