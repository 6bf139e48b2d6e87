// Copyright 2025 Veil (https://github.com/veil-privacy/veil)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Privacy criterion definitions
//!
//! A run evaluates a conjunction of criteria against every equivalence
//! class. Monotonicity is the property the traversal exploits: if a
//! criterion is monotonic, generalizing further can never break it, so
//! whole sub-lattices can be tagged without individual checks.
//!
//! Monotonicity is criterion- and mode-dependent: k-anonymity stays
//! monotonic under record suppression, the sensitive-attribute criteria
//! do not, and d-presence is not monotonic at all (merging a class that
//! holds research-subset rows with one that holds none can push the
//! presence ratio below the lower bound).

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};

/// Variant of the l-diversity criterion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LDiversityVariant {
    /// At least `l` distinct sensitive values per class
    Distinct,
    /// Shannon entropy of the class distribution at least `ln(l)`
    Entropy,
    /// Recursive (c,l)-diversity: the most frequent value is dominated
    /// by `c` times the tail starting at the l-th most frequent value
    Recursive { c: f64 },
}

/// Ground-distance variant of the t-closeness criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TClosenessVariant {
    /// Earth-mover's distance with equal ground distance between values
    EqualDistance,
    /// Earth-mover's distance over the sensitive attribute's hierarchy
    HierarchicalDistance,
}

/// A single privacy criterion with its thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PrivacyCriterion {
    KAnonymity { k: u32 },
    LDiversity { l: f64, variant: LDiversityVariant },
    TCloseness { t: f64, variant: TClosenessVariant },
    DPresence { d_min: f64, d_max: f64 },
}

impl PrivacyCriterion {
    /// Short criterion name for error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::KAnonymity { .. } => "k-anonymity",
            Self::LDiversity { .. } => "l-diversity",
            Self::TCloseness { .. } => "t-closeness",
            Self::DPresence { .. } => "d-presence",
        }
    }

    /// Whether generalizing further can never break this criterion.
    ///
    /// With a non-zero suppression budget only k-anonymity keeps the
    /// property: suppressing an outlier class never changes the
    /// remaining classes' sizes, but it does change their sensitive
    /// value distributions relative to the whole dataset.
    pub fn is_monotonic(&self, with_suppression: bool) -> bool {
        match self {
            Self::KAnonymity { .. } => true,
            Self::LDiversity { .. } | Self::TCloseness { .. } => !with_suppression,
            Self::DPresence { .. } => false,
        }
    }

    /// Whether class evaluation needs per-class sensitive distributions.
    pub fn needs_distributions(&self) -> bool {
        matches!(self, Self::LDiversity { .. } | Self::TCloseness { .. })
    }

    /// Whether class evaluation needs the research-subset counts.
    pub fn needs_subset(&self) -> bool {
        matches!(self, Self::DPresence { .. })
    }

    /// Validates thresholds; fatal before the search starts.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(VeilError::InvalidConfiguration(msg));
        match *self {
            Self::KAnonymity { k } => {
                if k == 0 {
                    return invalid("k must be at least 1".into());
                }
            }
            Self::LDiversity { l, variant } => {
                if l < 1.0 {
                    return invalid(format!("l must be at least 1, got {}", l));
                }
                if let LDiversityVariant::Recursive { c } = variant {
                    if c <= 0.0 {
                        return invalid(format!("c must be positive, got {}", c));
                    }
                }
            }
            Self::TCloseness { t, .. } => {
                if !(0.0..=1.0).contains(&t) {
                    return invalid(format!("t must be in [0, 1], got {}", t));
                }
            }
            Self::DPresence { d_min, d_max } => {
                if !(0.0..=1.0).contains(&d_min)
                    || !(0.0..=1.0).contains(&d_max)
                    || d_min > d_max
                {
                    return invalid(format!(
                        "d-presence bounds must satisfy 0 <= d_min <= d_max <= 1, got [{}, {}]",
                        d_min, d_max
                    ));
                }
            }
        }
        Ok(())
    }
}
