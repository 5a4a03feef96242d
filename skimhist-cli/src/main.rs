//! skimhist CLI.
//!
//! Builds per-sub-run energy-vs-time histograms from calorimeter skim files.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};

use log::{info, warn};
use skimhist_core::{
    aggregate_store_with, AggregatorConfig, FillOffsets, SeriesId, SubrunHistogramAggregator,
    ZeroOffsets,
};
use skimhist_io::{read_config, read_fill_offsets, read_skim_file, JsonSeriesSink};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SkimhistIo(#[from] skimhist_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] skimhist_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Single JSON document
    Json,
    /// HDF5/NeXus (requires the `hdf5` feature)
    Hdf5,
}

impl Format {
    fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("h5" | "hdf5" | "nxs") => Self::Hdf5,
            _ => Self::Json,
        }
    }
}

/// Sub-run energy-vs-time histogramming for calorimeter skim data.
#[derive(Parser)]
#[command(name = "skimhist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a skim file into per-sub-run histogram series
    Aggregate {
        /// Input skim file (JSON)
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (default: from the output extension)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Aggregation configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-fill time offsets file (JSON)
        #[arg(long)]
        offsets: Option<PathBuf>,

        /// Exclude a calorimeter from filling (repeatable)
        #[arg(long = "exclude-calo")]
        exclude_calo: Vec<u8>,

        /// Also write the double and higher pileup series
        #[arg(long)]
        intermediate: bool,

        /// Indent JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Show information about a skim file
    Info {
        /// Input skim file (JSON)
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Aggregate {
            input,
            output,
            format,
            config,
            offsets,
            exclude_calo,
            intermediate,
            pretty,
        } => {
            let start = Instant::now();

            let mut aggregator_config = match &config {
                Some(path) => read_config(path)?,
                None => AggregatorConfig::default(),
            };
            for calo in exclude_calo {
                aggregator_config = aggregator_config.with_excluded_calo(calo);
            }
            if intermediate {
                aggregator_config = aggregator_config.with_intermediate(true);
            }

            let offsets: Box<dyn FillOffsets> = match &offsets {
                Some(path) => Box::new(read_fill_offsets(path)?),
                None => Box::new(ZeroOffsets),
            };

            let store = read_skim_file(&input)?;
            let aggregator = SubrunHistogramAggregator::new(&aggregator_config)?;
            let geometry = *aggregator.geometry();
            info!(
                "geometry: {} time bins [{}, {}) us, {} energy bins [{}, {}) MeV",
                geometry.time.n_bins(),
                geometry.time.min(),
                geometry.time.max(),
                geometry.energy.n_bins(),
                geometry.energy.min(),
                geometry.energy.max()
            );

            let series = aggregate_store_with(aggregator, &store, offsets.as_ref())?;
            let stats = series.stats;
            let n_raw = series.raw.len();
            let n_pileup = series.pileup.len();

            let format = format.unwrap_or_else(|| Format::from_extension(&output));
            write_series(series, &output, format, pretty)?;

            if stats.out_of_range > 0 {
                warn!("{} fills fell outside the histogram range", stats.out_of_range);
            }

            println!(
                "Aggregated {} in {:.2}s",
                input.display(),
                start.elapsed().as_secs_f64()
            );
            println!("Singles: {}", stats.singles);
            println!("Pileup bundles: {}", stats.bundles);
            println!("{} sub-runs: {}", SeriesId::Raw, n_raw);
            println!("{} sub-runs: {}", SeriesId::Pileup, n_pileup);
            println!("Output: {}", output.display());
        }

        Commands::Info { input, json } => {
            let store = read_skim_file(&input)?;

            if json {
                let summary = serde_json::json!({
                    "file": input.display().to_string(),
                    "singles": { "events": store.singles.len(), "subruns": store.singles_subruns() },
                    "doubles": { "events": store.doubles.len(), "subruns": store.doubles_subruns() },
                    "triples": { "events": store.triples.len(), "subruns": store.triples_subruns() },
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("File: {}", input.display());
                println!(
                    "Singles: {} ({} sub-runs)",
                    store.singles.len(),
                    store.singles_subruns()
                );
                println!(
                    "Doubles: {} ({} sub-runs)",
                    store.doubles.len(),
                    store.doubles_subruns()
                );
                println!(
                    "Triples: {} ({} sub-runs)",
                    store.triples.len(),
                    store.triples_subruns()
                );

                let timestamps = store.singles.iter().map(|event| event.timestamp);
                if let (Some(first), Some(last)) = (timestamps.clone().min(), timestamps.max()) {
                    println!("Timestamp range: {} - {}", first, last);
                }
            }
        }
    }

    Ok(())
}

fn write_series(
    series: skimhist_core::AggregatedSeries,
    output: &Path,
    format: Format,
    pretty: bool,
) -> Result<()> {
    match format {
        Format::Json => {
            let mut sink = JsonSeriesSink::create(output)?.pretty(pretty);
            series.write_to(&mut sink)?;
        }
        #[cfg(feature = "hdf5")]
        Format::Hdf5 => {
            let mut sink =
                skimhist_io::Hdf5SeriesSink::create(output, skimhist_io::SeriesWriteOptions::default())?;
            series.write_to(&mut sink)?;
        }
        #[cfg(not(feature = "hdf5"))]
        Format::Hdf5 => {
            return Err(CliError::Usage(
                "HDF5 output requires building with the `hdf5` feature".to_string(),
            ));
        }
    }
    Ok(())
}
