//! Weighted energy-vs-time histogram.
//!
//! Contents are stored flat in row-major `[time][energy]` order, the same
//! layout the series writers use for their `counts` arrays.

use crate::geometry::Geometry;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 2-D histogram of summed weights over a fixed [`Geometry`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram2D {
    geometry: Geometry,
    /// Sum of weights per bin.
    contents: Vec<f64>,
    /// Sum of squared weights per bin.
    sumw2: Vec<f64>,
    /// Number of fill calls, in range or not.
    entries: u64,
    /// Summed weight of fills that landed outside the axes.
    out_of_range: f64,
}

impl Histogram2D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            contents: vec![0.0; geometry.len()],
            sumw2: vec![0.0; geometry.len()],
            entries: 0,
            out_of_range: 0.0,
        }
    }

    /// Adds `weight` at `(time, energy)`.
    ///
    /// Returns false when the coordinate falls outside the axes; the weight
    /// is then only tallied in [`Self::out_of_range`].
    #[inline]
    pub fn fill(&mut self, time: f64, energy: f64, weight: f64) -> bool {
        self.entries += 1;
        match self.geometry.locate(time, energy) {
            Some(idx) => {
                self.contents[idx] += weight;
                self.sumw2[idx] += weight * weight;
                true
            }
            None => {
                self.out_of_range += weight;
                false
            }
        }
    }

    /// Content of a bin, or `None` if the indices are out of range.
    #[must_use]
    #[inline]
    pub fn get(&self, time_bin: usize, energy_bin: usize) -> Option<f64> {
        if time_bin < self.geometry.time.n_bins() && energy_bin < self.geometry.energy.n_bins() {
            Some(self.contents[self.geometry.index(time_bin, energy_bin)])
        } else {
            None
        }
    }

    /// Content of the bin holding `(time, energy)`.
    #[must_use]
    pub fn content_at(&self, time: f64, energy: f64) -> Option<f64> {
        self.geometry.locate(time, energy).map(|idx| self.contents[idx])
    }

    /// Adds `other` bin-for-bin.
    ///
    /// # Errors
    /// Returns [`Error::GeometryMismatch`] if the geometries differ.
    pub fn add(&mut self, other: &Histogram2D) -> Result<()> {
        if self.geometry != other.geometry {
            return Err(Error::GeometryMismatch);
        }
        for (a, b) in self.contents.iter_mut().zip(&other.contents) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.entries += other.entries;
        self.out_of_range += other.out_of_range;
        Ok(())
    }

    /// Clears every bin and counter, keeping the allocation.
    pub fn reset(&mut self) {
        self.contents.fill(0.0);
        self.sumw2.fill(0.0);
        self.entries = 0;
        self.out_of_range = 0.0;
    }

    /// Copies the current contents out and resets this histogram in place.
    #[must_use]
    pub fn take(&mut self) -> Histogram2D {
        let snapshot = self.clone();
        self.reset();
        snapshot
    }

    /// Sum of all in-range bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Shared binning.
    #[must_use]
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Flat bin contents, row-major `[time][energy]`.
    #[must_use]
    #[inline]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Flat sum of squared weights, same layout as [`Self::contents`].
    #[must_use]
    #[inline]
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    /// Number of fill calls.
    #[must_use]
    #[inline]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Summed weight that fell outside the axes.
    #[must_use]
    #[inline]
    pub fn out_of_range(&self) -> f64 {
        self.out_of_range
    }

    /// Rebuilds a histogram from stored arrays.
    ///
    /// # Errors
    /// Returns [`Error::GeometryMismatch`] if either array does not match the
    /// geometry's bin count.
    pub fn from_parts(
        geometry: Geometry,
        contents: Vec<f64>,
        sumw2: Vec<f64>,
        entries: u64,
        out_of_range: f64,
    ) -> Result<Self> {
        if contents.len() != geometry.len() || sumw2.len() != geometry.len() {
            return Err(Error::GeometryMismatch);
        }
        Ok(Self {
            geometry,
            contents,
            sumw2,
            entries,
            out_of_range,
        })
    }
}
