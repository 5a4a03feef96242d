//! Pre-loaded event streams of one skim file.

use std::collections::HashSet;

use crate::event::{PileupBundle, SingleEvent, SubrunKey, Tagged};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The three event streams of a skim file, each in ingestion order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventStore {
    /// Single positron clusters.
    pub singles: Vec<SingleEvent>,
    /// Double-pileup bundles.
    pub doubles: Vec<PileupBundle>,
    /// Triple (and higher) pileup bundles.
    pub triples: Vec<PileupBundle>,
}

impl EventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records over all three streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.singles.len() + self.doubles.len() + self.triples.len()
    }

    /// Returns true if every stream is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct sub-runs seen in the singles stream.
    #[must_use]
    pub fn singles_subruns(&self) -> usize {
        distinct_subruns(&self.singles)
    }

    /// Number of distinct sub-runs seen in the doubles stream.
    #[must_use]
    pub fn doubles_subruns(&self) -> usize {
        distinct_subruns(&self.doubles)
    }

    /// Number of distinct sub-runs seen in the triples stream.
    #[must_use]
    pub fn triples_subruns(&self) -> usize {
        distinct_subruns(&self.triples)
    }
}

fn distinct_subruns<T: Tagged>(events: &[T]) -> usize {
    events
        .iter()
        .map(Tagged::subrun_key)
        .collect::<HashSet<SubrunKey>>()
        .len()
}
