//! Error types for skimhist-core.

use crate::event::SubrunKey;
use crate::series::SeriesId;
use thiserror::Error;

/// Result type alias for skimhist operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for skimhist operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid bin geometry (non-positive width, empty or inverted range).
    #[error("invalid {axis} axis: {reason}")]
    InvalidGeometry { axis: &'static str, reason: String },

    /// An event stream went backwards in (run, sub-run) order.
    #[error("{series} stream out of order: ({current}) follows ({previous})")]
    SequenceOrder {
        series: SeriesId,
        previous: SubrunKey,
        current: SubrunKey,
    },

    /// Bin-wise arithmetic between histograms of different geometry.
    #[error("histogram geometry mismatch")]
    GeometryMismatch,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
