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

//! Traversal strategy ordering
//!
//! The FLASH walk prefers successors that generalize as little as
//! possible, so paths stay long and binary search resolves many nodes
//! per check. The sort key is a pure function of the node's
//! transformation and the hierarchies, computed once at lattice build:
//! relative level first, then relative precision (sum of level/max
//! ratios), then distinctness loss.

use std::cmp::Ordering;

use veil_core::Hierarchy;

/// Precomputed sort key of one lattice node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyKey {
    /// Absolute lattice level (sum of components).
    pub level: u32,
    /// Sum of `level_i / max_level_i` over the attributes.
    pub precision: f64,
    /// Sum of `1 - distinct(level_i) / distinct(0)` over the attributes.
    pub distinctness: f64,
}

impl StrategyKey {
    pub fn compute(transformation: &[u32], hierarchies: &[&Hierarchy]) -> Self {
        let level = transformation.iter().sum();
        let mut precision = 0.0;
        let mut distinctness = 0.0;
        for (&l, h) in transformation.iter().zip(hierarchies.iter()) {
            if h.max_level() > 0 {
                precision += l as f64 / h.max_level() as f64;
            }
            let d0 = h.distinct_values(0) as f64;
            if d0 > 0.0 {
                distinctness += 1.0 - h.distinct_values(l as usize) as f64 / d0;
            }
        }
        Self {
            level,
            precision,
            distinctness,
        }
    }
}

impl Eq for StrategyKey {}

impl Ord for StrategyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .cmp(&other.level)
            .then_with(|| self.precision.total_cmp(&other.precision))
            .then_with(|| self.distinctness.total_cmp(&other.distinctness))
    }
}

impl PartialOrd for StrategyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
