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

//! FLASH lattice traversal
//!
//! Walks the lattice level by level, greedily extending each untagged
//! node into a strategy-ordered path of successors, then resolving the
//! path with as few checks as possible.
//!
//! Two modes:
//!
//! - **Binary** (criteria and metric jointly monotonic, or practical
//!   monotonicity assumed): binary-search each path; every check
//!   resolves half the path, and tag propagation resolves whole
//!   sub-lattices. Successors of non-anonymous midpoints are enqueued
//!   on a strategy-ordered priority queue for further path building.
//! - **Two-phase** (non-monotonic conjunction): phase one runs the
//!   binary walk on the k-anonymity layer alone, which is always
//!   monotonic, tagging nodes found anonymous along the way
//!   optimistically. Phase two untags the optimistic region above each
//!   confirmed-anonymous node and re-verifies every remaining
//!   k-anonymous node individually with a stack-driven exhaustive walk.
//!
//! Cancellation is polled through the listener after every check and
//! aborts between checks, never mid-check.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, info};
use veil_core::{Result, VeilError};
use veil_engine::Checker;

use crate::lattice::{AnonymityState, Lattice, NodeId};
use crate::strategy::StrategyKey;

/// Observer polled after every node check.
pub trait ProgressListener {
    /// Called after each check with the running count and lattice size.
    fn node_checked(&mut self, _checked: u64, _total: u64) {}

    /// Polled between checks; `true` aborts the traversal.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Listener that never cancels.
pub struct NoopListener;

impl ProgressListener for NoopListener {}

/// Outcome of one traversal.
#[derive(Debug, Clone, Copy)]
pub struct FlashOutcome {
    /// Globally optimal anonymous node under the metric, if any exists.
    pub optimum: Option<(NodeId, f64)>,
}

/// One FLASH walk over one lattice.
pub struct FlashAlgorithm<'a, 'b> {
    lattice: &'b mut Lattice,
    checker: &'b mut Checker<'a>,
    /// Binary mode is valid for the full conjunction.
    binary: bool,
    /// A k-anonymity criterion exists, enabling the two-phase layer.
    has_k: bool,
    best: Option<(NodeId, f64)>,
    checked: u64,
}

impl<'a, 'b> FlashAlgorithm<'a, 'b> {
    pub fn new(
        lattice: &'b mut Lattice,
        checker: &'b mut Checker<'a>,
        binary: bool,
        has_k: bool,
    ) -> Self {
        Self {
            lattice,
            checker,
            binary,
            has_k,
            best: None,
            checked: 0,
        }
    }

    /// Runs the walk to completion: every node tagged.
    pub fn run(mut self, listener: &mut dyn ProgressListener) -> Result<FlashOutcome> {
        if self.binary {
            info!("traversal mode: binary (monotonic)");
            self.binary_walk(listener)?;
        } else {
            info!(
                two_phase = self.has_k,
                "traversal mode: exhaustive fallback"
            );
            if self.has_k {
                self.k_phase(listener)?;
            }
            self.linear_walk(listener)?;
        }
        debug_assert!(self.lattice.fully_tagged());
        Ok(FlashOutcome { optimum: self.best })
    }

    // Binary mode: final tags with full propagation.

    fn binary_walk(&mut self, listener: &mut dyn ProgressListener) -> Result<()> {
        let mut queue: BinaryHeap<Reverse<(StrategyKey, NodeId)>> = BinaryHeap::new();
        for level in 0..self.lattice.num_levels() {
            if self.lattice.untagged_at_level(level) == 0 {
                continue;
            }
            for id in self.sorted_level(level) {
                if self.lattice.node(id).is_tagged() {
                    continue;
                }
                let path = self.find_path(id, |l, n| !l.node(n).is_tagged());
                self.check_path_binary(&path, &mut queue, listener)?;
                while let Some(Reverse((_, n))) = queue.pop() {
                    if !self.lattice.node(n).is_tagged() {
                        let path = self.find_path(n, |l, n| !l.node(n).is_tagged());
                        self.check_path_binary(&path, &mut queue, listener)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_path_binary(
        &mut self,
        path: &[NodeId],
        queue: &mut BinaryHeap<Reverse<(StrategyKey, NodeId)>>,
        listener: &mut dyn ProgressListener,
    ) -> Result<()> {
        let mut low = 0isize;
        let mut high = path.len() as isize - 1;
        while low <= high {
            let mid = (low + high) / 2;
            let id = path[mid as usize];
            let anonymous = self.resolve_binary(id, listener)?;
            if anonymous {
                high = mid - 1;
            } else {
                // Untested successors of a non-anonymous midpoint are
                // fresh entry points into the unresolved region.
                for &succ in self.lattice.node(id).successors().to_vec().iter() {
                    if !self.lattice.node(succ).is_tagged() {
                        queue.push(Reverse((self.lattice.node(succ).strategy(), succ)));
                    }
                }
                low = mid + 1;
            }
        }
        Ok(())
    }

    /// Resolves one node in binary mode, checking only when no tag is
    /// present, and propagates the result.
    fn resolve_binary(
        &mut self,
        id: NodeId,
        listener: &mut dyn ProgressListener,
    ) -> Result<bool> {
        if self.lattice.node(id).is_tagged() {
            return Ok(self.lattice.node(id).state() == AnonymityState::Anonymous);
        }
        let check = self.check_node(id, listener)?;
        if check.anonymous {
            self.lattice.tag_anonymous(id);
        } else {
            self.lattice.tag_not_anonymous(id);
        }
        if self.has_k {
            self.lattice.tag_k(id, check.k_anonymous);
        }
        Ok(check.anonymous)
    }

    // Two-phase mode, phase 1: binary walk on the k-anonymity layer.

    fn k_phase(&mut self, listener: &mut dyn ProgressListener) -> Result<()> {
        let mut queue: BinaryHeap<Reverse<(StrategyKey, NodeId)>> = BinaryHeap::new();
        for level in 0..self.lattice.num_levels() {
            for id in self.sorted_level(level) {
                if self.lattice.node(id).is_k_tagged() {
                    continue;
                }
                let path = self.find_path(id, |l, n| !l.node(n).is_k_tagged());
                self.check_path_k(&path, &mut queue, listener)?;
                while let Some(Reverse((_, n))) = queue.pop() {
                    if !self.lattice.node(n).is_k_tagged() {
                        let path = self.find_path(n, |l, n| !l.node(n).is_k_tagged());
                        self.check_path_k(&path, &mut queue, listener)?;
                    }
                }
            }
        }
        // The optimistic region above confirmed-anonymous nodes must be
        // re-verified exhaustively: the full conjunction is not
        // monotonic, so those propagated tags may be wrong.
        let confirmed: Vec<NodeId> = (0..self.lattice.len())
            .filter(|&n| {
                self.lattice.node(n).is_checked()
                    && self.lattice.node(n).state() == AnonymityState::Anonymous
            })
            .collect();
        for id in confirmed {
            self.lattice.untag_upwards(id);
        }
        Ok(())
    }

    fn check_path_k(
        &mut self,
        path: &[NodeId],
        queue: &mut BinaryHeap<Reverse<(StrategyKey, NodeId)>>,
        listener: &mut dyn ProgressListener,
    ) -> Result<()> {
        let mut low = 0isize;
        let mut high = path.len() as isize - 1;
        while low <= high {
            let mid = (low + high) / 2;
            let id = path[mid as usize];
            let k_anonymous = self.resolve_k(id, listener)?;
            if k_anonymous {
                high = mid - 1;
            } else {
                for &succ in self.lattice.node(id).successors().to_vec().iter() {
                    if !self.lattice.node(succ).is_k_tagged() {
                        queue.push(Reverse((self.lattice.node(succ).strategy(), succ)));
                    }
                }
                low = mid + 1;
            }
        }
        Ok(())
    }

    fn resolve_k(&mut self, id: NodeId, listener: &mut dyn ProgressListener) -> Result<bool> {
        if self.lattice.node(id).is_k_tagged() {
            return Ok(self.lattice.node(id).is_k_anonymous());
        }
        let check = self.check_node(id, listener)?;
        self.lattice.tag_k(id, check.k_anonymous);
        if !check.k_anonymous {
            // A failed k-anonymity sub-criterion fails the conjunction
            // for this node and everything below it.
            self.lattice.tag_not_anonymous(id);
        } else if check.anonymous {
            // Optimistic: phase 2 untags and re-verifies above.
            self.lattice.tag_anonymous(id);
        } else {
            self.lattice.tag_single(id, false);
        }
        Ok(check.k_anonymous)
    }

    // Two-phase mode, phase 2: exhaustive walk over the remainder.

    fn linear_walk(&mut self, listener: &mut dyn ProgressListener) -> Result<()> {
        let mut stack: Vec<NodeId> = Vec::new();
        for level in 0..self.lattice.num_levels() {
            if self.lattice.untagged_at_level(level) == 0 {
                continue;
            }
            for id in self.sorted_level(level) {
                if self.lattice.node(id).is_tagged() {
                    continue;
                }
                let path = self.find_path(id, |l, n| !l.node(n).is_tagged());
                self.check_path_linear(&path, &mut stack, listener)?;
                while let Some(n) = stack.pop() {
                    if !self.lattice.node(n).is_tagged() {
                        let path = self.find_path(n, |l, n| !l.node(n).is_tagged());
                        self.check_path_linear(&path, &mut stack, listener)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_path_linear(
        &mut self,
        path: &[NodeId],
        stack: &mut Vec<NodeId>,
        listener: &mut dyn ProgressListener,
    ) -> Result<()> {
        for &id in path {
            if self.lattice.node(id).is_tagged() {
                continue;
            }
            if self.has_k
                && self.lattice.node(id).is_k_tagged()
                && !self.lattice.node(id).is_k_anonymous()
            {
                self.lattice.tag_not_anonymous(id);
                continue;
            }
            let check = self.check_node(id, listener)?;
            // No propagation here: the conjunction is not monotonic, so
            // each node stands alone.
            self.lattice.tag_single(id, check.anonymous);
            for &succ in self.lattice.node(id).successors().to_vec().iter() {
                if !self.lattice.node(succ).is_tagged() {
                    stack.push(succ);
                }
            }
        }
        Ok(())
    }

    // Shared plumbing.

    /// Greedy strategy-ordered path from `head` through nodes accepted
    /// by `untagged`.
    fn find_path(
        &self,
        head: NodeId,
        untagged: impl Fn(&Lattice, NodeId) -> bool,
    ) -> Vec<NodeId> {
        let mut path = vec![head];
        let mut current = head;
        loop {
            let next = self
                .lattice
                .node(current)
                .successors()
                .iter()
                .copied()
                .filter(|&n| untagged(self.lattice, n))
                .min_by_key(|&n| self.lattice.node(n).strategy());
            match next {
                Some(n) => {
                    path.push(n);
                    current = n;
                }
                None => break,
            }
        }
        path
    }

    fn sorted_level(&self, level: usize) -> Vec<NodeId> {
        let mut ids = self.lattice.level_nodes(level).to_vec();
        ids.sort_by_key(|&n| self.lattice.node(n).strategy());
        ids
    }

    /// Checks one node against the data and records the result,
    /// tracking the optimum and polling cancellation.
    fn check_node(
        &mut self,
        id: NodeId,
        listener: &mut dyn ProgressListener,
    ) -> Result<veil_engine::NodeCheck> {
        let transformation = self.lattice.node(id).transformation().to_vec();
        let check = self.checker.check(id, &transformation)?;
        self.checked += 1;
        self.lattice
            .record_check(id, check.information_loss);
        if check.anonymous {
            let better = match self.best {
                Some((_, loss)) => check.information_loss < loss,
                None => true,
            };
            if better {
                debug!(
                    node = id,
                    ?transformation,
                    loss = check.information_loss,
                    "new optimum candidate"
                );
                self.best = Some((id, check.information_loss));
            }
        }
        listener.node_checked(self.checked, self.lattice.len() as u64);
        if listener.is_cancelled() {
            return Err(VeilError::Cancelled {
                checked: self.checked,
            });
        }
        Ok(check)
    }
}
