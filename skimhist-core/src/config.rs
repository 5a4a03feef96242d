//! Aggregation configuration.

use crate::geometry::{BinAxis, Geometry};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clock tick to microsecond conversion.
pub const CLOCK_TICK_US: f64 = 1.25 / 1000.0;

/// Fast-rotation (cyclotron) period in microseconds.
pub const CYCLOTRON_PERIOD_US: f64 = 0.1492;

/// Configuration for sub-run histogram aggregation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AggregatorConfig {
    /// Lower edge of the time axis (µs).
    pub time_min: f64,
    /// Requested upper edge of the time axis (µs), snapped down to whole bins.
    pub time_max: f64,
    /// Time bin width (µs).
    pub time_bin_width: f64,
    /// Lower edge of the energy axis (MeV).
    pub energy_min: f64,
    /// Requested upper edge of the energy axis (MeV), snapped down to whole bins.
    pub energy_max: f64,
    /// Energy bin width (MeV).
    pub energy_bin_width: f64,
    /// Multiplier taking raw cluster times to µs.
    pub time_scale: f64,
    /// Cyclotron period (µs) used for the pileup time shifts.
    pub cyclotron_period: f64,
    /// Calorimeters whose clusters are not filled.
    pub excluded_calos: Vec<u8>,
    /// Also persist the double and higher pileup series.
    pub include_intermediate: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            time_min: 0.0,
            time_max: 700.0,
            time_bin_width: CYCLOTRON_PERIOD_US,
            energy_min: 1050.0,
            energy_max: 3060.0,
            energy_bin_width: 67.0,
            time_scale: CLOCK_TICK_US,
            cyclotron_period: CYCLOTRON_PERIOD_US,
            excluded_calos: Vec::new(),
            include_intermediate: false,
        }
    }
}

impl AggregatorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested time axis.
    #[must_use]
    pub fn with_time_axis(mut self, min: f64, max: f64, bin_width: f64) -> Self {
        self.time_min = min;
        self.time_max = max;
        self.time_bin_width = bin_width;
        self
    }

    /// Sets the requested energy axis.
    #[must_use]
    pub fn with_energy_axis(mut self, min: f64, max: f64, bin_width: f64) -> Self {
        self.energy_min = min;
        self.energy_max = max;
        self.energy_bin_width = bin_width;
        self
    }

    /// Sets the raw-time unit conversion.
    #[must_use]
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }

    /// Sets the cyclotron period.
    #[must_use]
    pub fn with_cyclotron_period(mut self, period: f64) -> Self {
        self.cyclotron_period = period;
        self
    }

    /// Excludes a calorimeter from filling.
    #[must_use]
    pub fn with_excluded_calo(mut self, calo_index: u8) -> Self {
        if !self.excluded_calos.contains(&calo_index) {
            self.excluded_calos.push(calo_index);
        }
        self
    }

    /// Persists the double and higher series alongside the combined one.
    #[must_use]
    pub fn with_intermediate(mut self, include: bool) -> Self {
        self.include_intermediate = include;
        self
    }

    /// Builds the snapped bin geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] for unusable axis parameters.
    pub fn geometry(&self) -> Result<Geometry> {
        let time = BinAxis::snapped("time", self.time_min, self.time_max, self.time_bin_width)?;
        let energy = BinAxis::snapped(
            "energy",
            self.energy_min,
            self.energy_max,
            self.energy_bin_width,
        )?;
        Ok(Geometry::new(time, energy))
    }

    /// Checks every parameter, including the bin geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] or [`Error::ConfigError`].
    pub fn validate(&self) -> Result<()> {
        self.geometry()?;
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(Error::ConfigError(format!(
                "time_scale must be positive and finite, got {}",
                self.time_scale
            )));
        }
        if !self.cyclotron_period.is_finite() || self.cyclotron_period < 0.0 {
            return Err(Error::ConfigError(format!(
                "cyclotron_period must be non-negative and finite, got {}",
                self.cyclotron_period
            )));
        }
        Ok(())
    }
}
