//! Skim event records: single positron clusters and pileup bundles.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one sub-run of data taking.
///
/// Ordering is lexicographic on `(run, subrun)`, which is the order every
/// event stream must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubrunKey {
    /// Run index.
    pub run: i32,
    /// Sub-run index within the run.
    pub subrun: i32,
}

impl SubrunKey {
    /// Creates a new sub-run key.
    #[inline]
    #[must_use]
    pub fn new(run: i32, subrun: i32) -> Self {
        Self { run, subrun }
    }
}

impl fmt::Display for SubrunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {}, sub-run {}", self.run, self.subrun)
    }
}

/// Composite fill identifier, `run * 10^6 + subrun * 10^3 + fill`.
///
/// Used only to look up the per-fill time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FillId(pub i64);

impl FillId {
    /// Builds the composite identifier from its three indices.
    #[inline]
    #[must_use]
    pub fn from_indices(run: i32, subrun: i32, fill: i32) -> Self {
        Self(i64::from(run) * 1_000_000 + i64::from(subrun) * 1_000 + i64::from(fill))
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A single reconstructed positron cluster.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SingleEvent {
    /// Cluster time in clock ticks.
    pub time: f64,
    /// Cluster energy in MeV.
    pub energy: f64,
    /// Calorimeter index (1-24).
    pub calo_index: u8,
    /// Run index.
    pub run_index: i32,
    /// Sub-run index.
    pub subrun_index: i32,
    /// Fill index within the sub-run.
    pub fill_index: i32,
    /// Absolute GPS timestamp (seconds).
    pub timestamp: u32,
    /// Cluster centroid x (crystal units).
    #[cfg_attr(feature = "serde", serde(default))]
    pub x: f64,
    /// Cluster centroid y (crystal units).
    #[cfg_attr(feature = "serde", serde(default))]
    pub y: f64,
    /// Bunch number within the fill cycle.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bunch_number: i32,
}

/// One role-tagged sub-entry of a pileup bundle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PileupEntry {
    /// Pileup role index (constituent vs. combined pseudo-cluster).
    pub role: i32,
    /// Time in clock ticks.
    pub time: f64,
    /// Energy in MeV.
    pub energy: f64,
    /// Calorimeter index (1-24).
    pub calo_index: u8,
    /// Whether the reconstruction flagged this sub-entry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub flagged: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub x: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub y: f64,
}

/// A group of near-simultaneous clusters reconstructed together.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PileupBundle {
    /// Run index.
    pub run_index: i32,
    /// Sub-run index.
    pub subrun_index: i32,
    /// Fill index within the sub-run.
    pub fill_index: i32,
    /// Bunch number within the fill cycle.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bunch_number: i32,
    /// Sub-entries in reconstruction order.
    pub entries: Vec<PileupEntry>,
}

/// Common accessors for events tagged with run, sub-run and fill indices.
pub trait Tagged {
    /// Run index.
    fn run_index(&self) -> i32;

    /// Sub-run index.
    fn subrun_index(&self) -> i32;

    /// Fill index.
    fn fill_index(&self) -> i32;

    /// The sub-run this event belongs to.
    #[inline]
    fn subrun_key(&self) -> SubrunKey {
        SubrunKey::new(self.run_index(), self.subrun_index())
    }

    /// Composite fill identifier.
    #[inline]
    fn fill_id(&self) -> FillId {
        FillId::from_indices(self.run_index(), self.subrun_index(), self.fill_index())
    }
}

impl Tagged for SingleEvent {
    #[inline]
    fn run_index(&self) -> i32 {
        self.run_index
    }

    #[inline]
    fn subrun_index(&self) -> i32 {
        self.subrun_index
    }

    #[inline]
    fn fill_index(&self) -> i32 {
        self.fill_index
    }
}

impl Tagged for PileupBundle {
    #[inline]
    fn run_index(&self) -> i32 {
        self.run_index
    }

    #[inline]
    fn subrun_index(&self) -> i32 {
        self.subrun_index
    }

    #[inline]
    fn fill_index(&self) -> i32 {
        self.fill_index
    }
}

impl SingleEvent {
    /// Creates a cluster with the binning-relevant fields set and the
    /// auxiliary columns zeroed.
    #[must_use]
    pub fn new(key: SubrunKey, fill_index: i32, time: f64, energy: f64, timestamp: u32) -> Self {
        Self {
            time,
            energy,
            calo_index: 1,
            run_index: key.run,
            subrun_index: key.subrun,
            fill_index,
            timestamp,
            x: 0.0,
            y: 0.0,
            bunch_number: 0,
        }
    }

    /// Sets the calorimeter index.
    #[must_use]
    pub fn with_calo(mut self, calo_index: u8) -> Self {
        self.calo_index = calo_index;
        self
    }
}

impl PileupEntry {
    /// Creates a sub-entry with the auxiliary columns zeroed.
    #[must_use]
    pub fn new(role: i32, time: f64, energy: f64, calo_index: u8) -> Self {
        Self {
            role,
            time,
            energy,
            calo_index,
            flagged: false,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl PileupBundle {
    /// Creates a bundle from its sub-entries.
    #[must_use]
    pub fn new(key: SubrunKey, fill_index: i32, entries: Vec<PileupEntry>) -> Self {
        Self {
            run_index: key.run,
            subrun_index: key.subrun,
            fill_index,
            bunch_number: 0,
            entries,
        }
    }
}
