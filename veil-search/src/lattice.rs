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

//! Generalization lattice
//!
//! All transformations are materialized at construction, identified by
//! a mixed-radix dense id, and grouped by level (sum of components).
//! Node state is mutated only through the lattice's tagging methods, so
//! the upward/downward propagation invariants hold by construction:
//! anonymity propagates to successors, non-anonymity to predecessors,
//! and per-level untagged counts stay consistent.

use smallvec::SmallVec;
use tracing::debug;
use veil_core::{Hierarchy, Result, VeilError};

use crate::strategy::StrategyKey;

pub type NodeId = usize;

/// Anonymity resolution of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymityState {
    Unknown,
    Anonymous,
    NotAnonymous,
}

/// One transformation with its mutable search state.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    transformation: Box<[u32]>,
    level: u32,
    successors: SmallVec<[NodeId; 8]>,
    predecessors: SmallVec<[NodeId; 8]>,
    strategy: StrategyKey,

    state: AnonymityState,
    /// Final resolution present (directly checked or propagated).
    tagged: bool,
    /// Checked directly against the data, not propagated.
    checked: bool,
    /// Two-phase k-anonymity layer.
    k_tagged: bool,
    k_anonymous: bool,
    /// Known information-loss bounds.
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn transformation(&self) -> &[u32] {
        &self.transformation
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    pub fn strategy(&self) -> StrategyKey {
        self.strategy
    }

    pub fn state(&self) -> AnonymityState {
        self.state
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn is_k_tagged(&self) -> bool {
        self.k_tagged
    }

    pub fn is_k_anonymous(&self) -> bool {
        self.k_anonymous
    }

    pub fn lower_bound(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper_bound(&self) -> Option<f64> {
        self.upper
    }
}

/// The full lattice of transformations.
#[derive(Debug)]
pub struct Lattice {
    nodes: Vec<Node>,
    /// Node ids per level, ascending.
    levels: Vec<Vec<NodeId>>,
    untagged_per_level: Vec<usize>,
    bottom: NodeId,
    top: NodeId,
}

impl Lattice {
    /// Materializes all nodes and adjacency for the given hierarchies.
    pub fn build(hierarchies: &[&Hierarchy], max_size: u64) -> Result<Self> {
        let radices: Vec<usize> = hierarchies.iter().map(|h| h.height()).collect();
        let mut size: u128 = 1;
        for &r in &radices {
            size *= r as u128;
        }
        if size > max_size as u128 {
            return Err(VeilError::LatticeTooLarge {
                size,
                max: max_size,
            });
        }
        let size = size as usize;

        // Stride of each attribute in the mixed-radix id.
        let mut strides = vec![1usize; radices.len()];
        for i in (0..radices.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * radices[i + 1];
        }

        let max_level: u32 = radices.iter().map(|&r| (r - 1) as u32).sum();
        let mut nodes = Vec::with_capacity(size);
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); max_level as usize + 1];

        let mut transformation = vec![0u32; radices.len()];
        for id in 0..size {
            // Decode the mixed-radix id.
            let mut rest = id;
            for (i, &stride) in strides.iter().enumerate() {
                transformation[i] = (rest / stride) as u32;
                rest %= stride;
            }

            let mut successors = SmallVec::new();
            let mut predecessors = SmallVec::new();
            for (i, &radix) in radices.iter().enumerate() {
                if (transformation[i] as usize) + 1 < radix {
                    successors.push(id + strides[i]);
                }
                if transformation[i] > 0 {
                    predecessors.push(id - strides[i]);
                }
            }

            let level: u32 = transformation.iter().sum();
            levels[level as usize].push(id);
            nodes.push(Node {
                id,
                transformation: transformation.clone().into_boxed_slice(),
                level,
                successors,
                predecessors,
                strategy: StrategyKey::compute(&transformation, hierarchies),
                state: AnonymityState::Unknown,
                tagged: false,
                checked: false,
                k_tagged: false,
                k_anonymous: false,
                lower: None,
                upper: None,
            });
        }

        if levels[0].len() != 1 {
            return Err(VeilError::InvalidBottomNode(levels[0].len()));
        }
        let untagged_per_level = levels.iter().map(Vec::len).collect();
        debug!(nodes = size, levels = levels.len(), "lattice built");

        Ok(Self {
            bottom: levels[0][0],
            top: size - 1,
            nodes,
            levels,
            untagged_per_level,
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_nodes(&self, level: usize) -> &[NodeId] {
        &self.levels[level]
    }

    pub fn bottom(&self) -> NodeId {
        self.bottom
    }

    pub fn top(&self) -> NodeId {
        self.top
    }

    pub fn untagged_at_level(&self, level: usize) -> usize {
        self.untagged_per_level[level]
    }

    /// True once every node carries a final resolution.
    pub fn fully_tagged(&self) -> bool {
        self.untagged_per_level.iter().all(|&n| n == 0)
    }

    pub fn tagged_count(&self) -> usize {
        self.nodes.len() - self.untagged_per_level.iter().sum::<usize>()
    }

    pub fn checked_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.checked).count()
    }

    /// Records that a node was checked directly, seeding its loss
    /// bounds. Tagging is separate: callers decide whether the
    /// criterion allows propagation.
    pub fn record_check(&mut self, id: NodeId, loss: f64) {
        let node = &mut self.nodes[id];
        node.checked = true;
        node.lower = Some(loss);
        node.upper = Some(loss);
    }

    /// Tags a single node without any propagation; the exhaustive phase
    /// uses this because its criteria are not monotonic.
    pub fn tag_single(&mut self, id: NodeId, anonymous: bool) {
        self.tag(
            id,
            if anonymous {
                AnonymityState::Anonymous
            } else {
                AnonymityState::NotAnonymous
            },
        );
    }

    /// Convenience: record a check result and tag the node itself.
    pub fn mark_checked(&mut self, id: NodeId, anonymous: bool, loss: f64) {
        self.record_check(id, loss);
        self.tag_single(id, anonymous);
    }

    /// Tags `id` anonymous and propagates upward: every transitive
    /// successor is anonymous too under a monotonic criterion.
    pub fn tag_anonymous(&mut self, id: NodeId) {
        self.tag(id, AnonymityState::Anonymous);
        let mut stack: Vec<NodeId> = self.nodes[id].successors.to_vec();
        while let Some(n) = stack.pop() {
            if self.nodes[n].tagged {
                continue;
            }
            self.tag(n, AnonymityState::Anonymous);
            stack.extend_from_slice(&self.nodes[n].successors);
        }
    }

    /// Tags `id` not anonymous and propagates downward: every
    /// transitive predecessor is not anonymous either.
    pub fn tag_not_anonymous(&mut self, id: NodeId) {
        self.tag(id, AnonymityState::NotAnonymous);
        let mut stack: Vec<NodeId> = self.nodes[id].predecessors.to_vec();
        while let Some(n) = stack.pop() {
            if self.nodes[n].tagged {
                continue;
            }
            self.tag(n, AnonymityState::NotAnonymous);
            stack.extend_from_slice(&self.nodes[n].predecessors);
        }
    }

    /// Tags the k-anonymity layer; k-anonymity is always monotonic, so
    /// a positive tag propagates upward and a negative one downward.
    pub fn tag_k(&mut self, id: NodeId, k_anonymous: bool) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = &mut self.nodes[n];
            if node.k_tagged {
                continue;
            }
            node.k_tagged = true;
            node.k_anonymous = k_anonymous;
            if k_anonymous {
                stack.extend_from_slice(&self.nodes[n].successors);
            } else {
                stack.extend_from_slice(&self.nodes[n].predecessors);
            }
        }
    }

    /// Clears propagated final tags strictly above `id`, keeping
    /// directly checked nodes. Used when switching from the optimistic
    /// to the exhaustive phase.
    pub fn untag_upwards(&mut self, id: NodeId) {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self.nodes[id].successors.to_vec();
        while let Some(n) = stack.pop() {
            if visited[n] {
                continue;
            }
            visited[n] = true;
            let node = &mut self.nodes[n];
            if node.tagged && !node.checked {
                node.tagged = false;
                node.state = AnonymityState::Unknown;
                self.untagged_per_level[node.level as usize] += 1;
            }
            stack.extend_from_slice(&self.nodes[n].successors);
        }
    }

    /// Seeds a loss bound from the estimator. Non-finite values are the
    /// caller's responsibility to filter.
    pub(crate) fn set_bounds(&mut self, id: NodeId, lower: Option<f64>, upper: Option<f64>) {
        let node = &mut self.nodes[id];
        if lower.is_some() {
            node.lower = lower;
        }
        if upper.is_some() {
            node.upper = upper;
        }
    }

    fn tag(&mut self, id: NodeId, state: AnonymityState) {
        let node = &mut self.nodes[id];
        debug_assert!(
            !node.tagged || node.state == state,
            "conflicting tag on node {}: {:?} -> {:?}",
            id,
            node.state,
            state
        );
        if !node.tagged {
            node.tagged = true;
            node.state = state;
            self.untagged_per_level[node.level as usize] -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy(height: usize, values: usize) -> Hierarchy {
        // Simple chain hierarchy: every value generalizes to code
        // values+level-1 at each level.
        let rows: Vec<Vec<u32>> = (0..values)
            .map(|v| {
                let mut row = vec![v as u32];
                for level in 1..height {
                    row.push((values + level - 1) as u32);
                }
                row
            })
            .collect();
        Hierarchy::from_rows("test", &rows).unwrap()
    }

    fn lattice_3x2() -> (Hierarchy, Hierarchy) {
        (hierarchy(3, 4), hierarchy(2, 2))
    }

    #[test]
    fn test_build_shape() {
        let (a, b) = lattice_3x2();
        let lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        assert_eq!(lattice.len(), 6);
        assert_eq!(lattice.num_levels(), 4); // levels 0..=3
        assert_eq!(lattice.level_nodes(0).len(), 1);
        assert_eq!(lattice.level_nodes(3).len(), 1);
        assert_eq!(lattice.node(lattice.bottom()).transformation(), &[0, 0]);
        assert_eq!(lattice.node(lattice.top()).transformation(), &[2, 1]);
    }

    #[test]
    fn test_adjacency() {
        let (a, b) = lattice_3x2();
        let lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        let bottom = lattice.node(lattice.bottom());
        assert_eq!(bottom.predecessors().len(), 0);
        assert_eq!(bottom.successors().len(), 2);
        // Each successor differs on exactly one attribute by one level.
        for &succ in bottom.successors() {
            let t = lattice.node(succ).transformation();
            let diff: u32 = t.iter().sum();
            assert_eq!(diff, 1);
        }
        let top = lattice.node(lattice.top());
        assert_eq!(top.successors().len(), 0);
        assert_eq!(top.predecessors().len(), 2);
    }

    #[test]
    fn test_too_large_is_fatal() {
        let (a, b) = lattice_3x2();
        let err = Lattice::build(&[&a, &b], 5).unwrap_err();
        assert!(matches!(err, VeilError::LatticeTooLarge { size: 6, max: 5 }));
    }

    #[test]
    fn test_tag_anonymous_propagates_upward() {
        let (a, b) = lattice_3x2();
        let mut lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        // Node [1, 0] anonymous: everything above must become anonymous.
        let id = lattice
            .level_nodes(1)
            .iter()
            .copied()
            .find(|&n| lattice.node(n).transformation() == [1, 0])
            .unwrap();
        lattice.tag_anonymous(id);
        for n in 0..lattice.len() {
            let node = lattice.node(n);
            let above = node.transformation()[0] >= 1;
            if above {
                assert_eq!(node.state(), AnonymityState::Anonymous, "node {:?}", node.transformation());
            } else {
                assert_eq!(node.state(), AnonymityState::Unknown);
            }
        }
        assert!(!lattice.fully_tagged());
    }

    #[test]
    fn test_tag_not_anonymous_propagates_downward() {
        let (a, b) = lattice_3x2();
        let mut lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        let id = lattice
            .level_nodes(2)
            .iter()
            .copied()
            .find(|&n| lattice.node(n).transformation() == [1, 1])
            .unwrap();
        lattice.tag_not_anonymous(id);
        for n in 0..lattice.len() {
            let node = lattice.node(n);
            let t = node.transformation();
            let below = t[0] <= 1 && t[1] <= 1;
            if below {
                assert_eq!(node.state(), AnonymityState::NotAnonymous);
            } else {
                assert_eq!(node.state(), AnonymityState::Unknown);
            }
        }
    }

    #[test]
    fn test_untag_upwards_keeps_checked_nodes() {
        let (a, b) = lattice_3x2();
        let mut lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        let bottom = lattice.bottom();
        let top = lattice.top();
        lattice.mark_checked(top, true, 3.0);
        lattice.tag_anonymous(bottom); // tags everything
        assert!(lattice.fully_tagged());

        lattice.untag_upwards(bottom);
        // Bottom keeps its tag, the checked top keeps its tag,
        // everything in between is unknown again.
        assert!(lattice.node(bottom).is_tagged());
        assert!(lattice.node(top).is_tagged());
        assert_eq!(
            lattice.tagged_count(),
            2,
            "only bottom and the checked top stay tagged"
        );
    }

    #[test]
    fn test_tag_k_layer_is_independent() {
        let (a, b) = lattice_3x2();
        let mut lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        lattice.tag_k(lattice.bottom(), true);
        assert!(lattice.node(lattice.top()).is_k_anonymous());
        assert!(!lattice.node(lattice.top()).is_tagged());
        assert!(!lattice.fully_tagged());
    }

    #[test]
    fn test_mark_checked_seeds_bounds() {
        let (a, b) = lattice_3x2();
        let mut lattice = Lattice::build(&[&a, &b], 1000).unwrap();
        lattice.mark_checked(0, true, 1.5);
        let node = lattice.node(0);
        assert!(node.is_checked());
        assert_eq!(node.lower_bound(), Some(1.5));
        assert_eq!(node.upper_bound(), Some(1.5));
        assert_eq!(node.state(), AnonymityState::Anonymous);
    }
}
