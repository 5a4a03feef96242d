//! Fixed-width bin axes and the shared energy-vs-time geometry.
//!
//! Every histogram produced by one aggregator shares a single [`Geometry`],
//! which is what makes bin-for-bin addition of two series well-defined.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Computes the bin count and snapped upper edge for a fixed-width axis.
///
/// Returns `(n_bins, hi_actual)` with `n_bins = floor((hi - lo) / width)` and
/// `hi_actual = lo + n_bins * width`, so the axis never ends in a partial bin.
/// Degenerate input (empty range, non-positive width, NaN) yields zero bins.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn snap_range(lo: f64, hi: f64, width: f64) -> (usize, f64) {
    let ratio = ((hi - lo) / width).floor();
    let n_bins = if ratio.is_finite() && ratio > 0.0 {
        ratio as usize
    } else {
        0
    };
    #[allow(clippy::cast_precision_loss)]
    let hi_actual = lo + n_bins as f64 * width;
    (n_bins, hi_actual)
}

/// A one-dimensional axis of equal-width bins covering `[min, max)`.
///
/// Deserialization goes through [`BinAxis::with_bins`], so a stored axis is
/// held to the same invariants as a constructed one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "AxisParts", into = "AxisParts"))]
pub struct BinAxis {
    min: f64,
    max: f64,
    width: f64,
    n_bins: usize,
}

impl BinAxis {
    /// Builds an axis from a requested range, snapping the upper edge down to
    /// a whole number of bins.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] if any bound is non-finite, the width
    /// is not positive, or the range holds less than one bin.
    pub fn snapped(name: &'static str, min: f64, requested_max: f64, width: f64) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidGeometry { axis: name, reason };

        if !min.is_finite() || !requested_max.is_finite() || !width.is_finite() {
            return Err(invalid(format!(
                "non-finite bounds ({min}, {requested_max}, width {width})"
            )));
        }
        if width <= 0.0 {
            return Err(invalid(format!("bin width must be positive, got {width}")));
        }
        if requested_max <= min {
            return Err(invalid(format!(
                "upper edge {requested_max} must exceed lower edge {min}"
            )));
        }

        let (n_bins, max) = snap_range(min, requested_max, width);
        if n_bins == 0 {
            return Err(invalid(format!(
                "range [{min}, {requested_max}) is narrower than one bin of width {width}"
            )));
        }

        Ok(Self {
            min,
            max,
            width,
            n_bins,
        })
    }

    /// Builds an axis from an exact bin count, as stored by a writer.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] if `min` or `width` is non-finite,
    /// the width is not positive, or `n_bins` is zero.
    pub fn with_bins(name: &'static str, min: f64, width: f64, n_bins: usize) -> Result<Self> {
        if !min.is_finite() || !width.is_finite() || width <= 0.0 || n_bins == 0 {
            return Err(Error::InvalidGeometry {
                axis: name,
                reason: format!("cannot build {n_bins} bins of width {width} from {min}"),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let max = min + n_bins as f64 * width;
        Ok(Self {
            min,
            max,
            width,
            n_bins,
        })
    }

    /// Lower edge of the first bin.
    #[must_use]
    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the last bin (after snapping).
    #[must_use]
    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Bin width.
    #[must_use]
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Number of bins.
    #[must_use]
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Locates the bin holding `x`.
    ///
    /// Values below `min`, at or above `max`, or non-finite return `None`
    /// (underflow/overflow).
    #[must_use]
    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !x.is_finite() || x < self.min || x >= self.max {
            return None;
        }
        let bin = (self.n_bins as f64 * (x - self.min) / (self.max - self.min)) as usize;
        // Rounding right below `max` can land on n_bins.
        Some(bin.min(self.n_bins - 1))
    }

    /// Bin edges, `n_bins + 1` values from `min` to `max`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn edges(&self) -> Vec<f64> {
        (0..=self.n_bins)
            .map(|i| self.min + i as f64 * self.width)
            .collect()
    }
}

/// Serialized form of a [`BinAxis`]; the upper edge is derived.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct AxisParts {
    min: f64,
    bin_width: f64,
    n_bins: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<AxisParts> for BinAxis {
    type Error = Error;

    fn try_from(parts: AxisParts) -> Result<Self> {
        BinAxis::with_bins("axis", parts.min, parts.bin_width, parts.n_bins)
    }
}

#[cfg(feature = "serde")]
impl From<BinAxis> for AxisParts {
    fn from(axis: BinAxis) -> Self {
        Self {
            min: axis.min,
            bin_width: axis.width,
            n_bins: axis.n_bins,
        }
    }
}

/// Energy-vs-time binning shared by every series of an aggregator.
///
/// Storage is row-major over `[time][energy]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// Time axis (microseconds).
    pub time: BinAxis,
    /// Energy axis (MeV).
    pub energy: BinAxis,
}

impl Geometry {
    /// Creates a geometry from two axes.
    #[must_use]
    pub fn new(time: BinAxis, energy: BinAxis) -> Self {
        Self { time, energy }
    }

    /// Total number of in-range bins.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.time.n_bins() * self.energy.n_bins()
    }

    /// Returns true if the geometry holds no bins.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat storage index for a `(time_bin, energy_bin)` pair.
    #[must_use]
    #[inline]
    pub fn index(&self, time_bin: usize, energy_bin: usize) -> usize {
        time_bin * self.energy.n_bins() + energy_bin
    }

    /// Flat storage index for a `(time, energy)` coordinate, if in range.
    #[must_use]
    #[inline]
    pub fn locate(&self, time: f64, energy: f64) -> Option<usize> {
        let t = self.time.find_bin(time)?;
        let e = self.energy.find_bin(energy)?;
        Some(self.index(t, e))
    }
}
