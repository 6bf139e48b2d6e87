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

//! Information-loss bound propagation
//!
//! For a monotonic metric, a node's loss is at least the loss of every
//! predecessor and at most the loss of every successor. Checked nodes
//! seed exact bounds; two sweeps (bottom-up for lower bounds, top-down
//! for upper bounds) tighten every other node without checking it.
//!
//! A non-finite bound aborts that node's update instead of poisoning
//! the lattice; the sweep continues elsewhere.

use tracing::warn;

use crate::lattice::Lattice;

/// Propagates loss bounds through the lattice. Only valid when the
/// metric is monotonic. Returns the number of nodes whose bounds were
/// tightened.
pub fn propagate_bounds(lattice: &mut Lattice) -> usize {
    let mut tightened = 0;

    // Bottom-up: the best known lower bound flows from predecessors.
    for level in 0..lattice.num_levels() {
        for id in lattice.level_nodes(level).to_vec() {
            if lattice.node(id).is_checked() {
                continue;
            }
            let inherited = lattice
                .node(id)
                .predecessors()
                .iter()
                .filter_map(|&p| lattice.node(p).lower_bound())
                .fold(None::<f64>, |acc, b| {
                    Some(acc.map_or(b, |a| a.max(b)))
                });
            if let Some(bound) = inherited {
                if !bound.is_finite() {
                    warn!(node = id, bound, "skipping non-finite lower bound");
                    continue;
                }
                let current = lattice.node(id).lower_bound();
                if current.map_or(true, |c| bound > c) {
                    lattice.set_bounds(id, Some(bound), None);
                    tightened += 1;
                }
            }
        }
    }

    // Top-down: the best known upper bound flows from successors.
    for level in (0..lattice.num_levels()).rev() {
        for id in lattice.level_nodes(level).to_vec() {
            if lattice.node(id).is_checked() {
                continue;
            }
            let inherited = lattice
                .node(id)
                .successors()
                .iter()
                .filter_map(|&s| lattice.node(s).upper_bound())
                .fold(None::<f64>, |acc, b| {
                    Some(acc.map_or(b, |a| a.min(b)))
                });
            if let Some(bound) = inherited {
                if !bound.is_finite() {
                    warn!(node = id, bound, "skipping non-finite upper bound");
                    continue;
                }
                let current = lattice.node(id).upper_bound();
                if current.map_or(true, |c| bound < c) {
                    lattice.set_bounds(id, None, Some(bound));
                    tightened += 1;
                }
            }
        }
    }

    tightened
}
