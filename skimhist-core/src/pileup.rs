//! Signed pileup weights.
//!
//! Combined pseudo-clusters are added at `+0.5` and their constituents
//! subtracted at `-0.5`, so that summing the double and higher series
//! cancels the double counting in the raw spectrum.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Weight applied to combined pseudo-clusters.
pub const COMBINED_WEIGHT: f64 = 0.5;

/// Weight applied to constituent clusters.
pub const CONSTITUENT_WEIGHT: f64 = -0.5;

/// Role index of the combined cluster in a double-pileup bundle.
pub const DOUBLE_COMBINED_ROLE: i32 = 2;

/// Triple-pileup roles that play the part of doubles.
pub const HIGHER_COMBINED_ROLES: [i32; 6] = [0, 1, 2, 6, 9, 12];

/// Triple-pileup roles that play the part of singles.
pub const HIGHER_CONSTITUENT_ROLES: [i32; 7] = [3, 4, 5, 7, 8, 10, 11];

/// Pileup multiplicity, selecting the role table and time addend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PileupOrder {
    /// Two-cluster pileup.
    Double,
    /// Three-or-more-cluster pileup.
    Higher,
}

impl PileupOrder {
    /// Signed weight for a sub-entry role, or `None` when the role carries no
    /// contribution and the sub-entry is skipped.
    #[must_use]
    pub fn weight(self, role: i32) -> Option<f64> {
        match self {
            Self::Double => Some(if role == DOUBLE_COMBINED_ROLE {
                COMBINED_WEIGHT
            } else {
                CONSTITUENT_WEIGHT
            }),
            Self::Higher => {
                if HIGHER_COMBINED_ROLES.contains(&role) {
                    Some(COMBINED_WEIGHT)
                } else if HIGHER_CONSTITUENT_ROLES.contains(&role) {
                    Some(CONSTITUENT_WEIGHT)
                } else {
                    None
                }
            }
        }
    }

    /// Time shift added before binning, in units of `cyclotron_period`.
    #[must_use]
    pub fn time_addend(self, cyclotron_period: f64) -> f64 {
        match self {
            Self::Double => 0.5 * cyclotron_period,
            Self::Higher => cyclotron_period,
        }
    }
}
