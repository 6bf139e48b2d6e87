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

//! Information-loss metric selector
//!
//! Evaluation lives in `veil-engine`; this module only carries the
//! selector and the monotonicity flag the traversal needs for phase
//! selection. A metric is monotonic when generalizing further can never
//! lower the loss.

use serde::{Deserialize, Serialize};

/// Information-loss metric minimized by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Sum of the per-attribute generalization levels
    Height,
    /// Average per-cell generalization ratio; suppressed cells count as 1
    Precision,
    /// Dataset size divided by the number of equivalence classes
    AverageClassSize,
    /// Sum of squared class sizes, suppressed classes penalized with
    /// `size * dataset_size`
    Discernability,
    /// Monotonic discernability variant: plain sum of squared class sizes
    DiscernabilityStar,
    /// Per-cell entropy loss `sum f(v) * log2(f(g(v)) / f(v))`
    NonUniformEntropy,
    /// Non-uniform entropy scaled into [0, 1] by the loss at full
    /// generalization
    NormalizedNonUniformEntropy,
}

impl Metric {
    /// Whether loss never decreases when generalizing further.
    pub fn is_monotonic(&self) -> bool {
        match self {
            Self::Height
            | Self::Precision
            | Self::DiscernabilityStar
            | Self::NonUniformEntropy
            | Self::NormalizedNonUniformEntropy => true,
            // Suppression can shrink these when a class flips to outlier.
            Self::AverageClassSize | Self::Discernability => false,
        }
    }

    /// Parse a metric from its CLI spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "height" => Some(Self::Height),
            "precision" => Some(Self::Precision),
            "aecs" | "average-class-size" => Some(Self::AverageClassSize),
            "discernability" => Some(Self::Discernability),
            "discernability-star" => Some(Self::DiscernabilityStar),
            "entropy" | "non-uniform-entropy" => Some(Self::NonUniformEntropy),
            "normalized-entropy" => Some(Self::NormalizedNonUniformEntropy),
            _ => None,
        }
    }
}
