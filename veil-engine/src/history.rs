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

//! Snapshot history cache
//!
//! Bounded store of compacted snapshots from previously checked
//! transformations. Admission is size-based: a snapshot enters only if
//! its class count stays within a configured fraction of the dataset
//! size, and within a fraction of the ancestor snapshot it was rolled
//! up from. Eviction prefers entries outside the retention policy, then
//! least-recently-used; an admission failure is not an error, the
//! checker just falls back to a full scan.
//!
//! The history owns the two interned-array dictionaries. Storing a
//! snapshot takes references on its packed distributions; evicting
//! releases exactly those references.

use tracing::{debug, trace};
use veil_core::{HistoryConfig, Result};

use crate::groupify::HashGroupify;
use crate::intern::ArrayDictionary;
use crate::snapshot::Snapshot;

/// Which snapshots are worth keeping when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep only snapshots of anonymous transformations.
    Anonymous,
    /// Keep only snapshots of k-anonymous transformations.
    KAnonymous,
    /// Keep any checked transformation's snapshot.
    Checked,
}

/// Anonymity facts about a snapshot's node, captured at check time.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotTags {
    pub anonymous: bool,
    pub k_anonymous: bool,
}

#[derive(Debug)]
struct Stored {
    snapshot: Snapshot,
    tags: SnapshotTags,
    last_used: u64,
}

/// Bounded snapshot cache with policy-driven eviction.
#[derive(Debug)]
pub struct History {
    config: HistoryConfig,
    policy: RetentionPolicy,
    dataset_rows: usize,
    stored: Vec<Stored>,
    dict_values: ArrayDictionary,
    dict_freqs: ArrayDictionary,
    tick: u64,
}

impl History {
    pub fn new(dataset_rows: usize, config: HistoryConfig, policy: RetentionPolicy) -> Self {
        Self {
            config,
            policy,
            dataset_rows,
            stored: Vec::new(),
            dict_values: ArrayDictionary::new(),
            dict_freqs: ArrayDictionary::new(),
            tick: 0,
        }
    }

    /// Finds the best cached ancestor of `transformation`: an
    /// admissible snapshot whose transformation is componentwise less
    /// general, preferring the fewest classes (cheapest roll-up).
    /// Returns an index for use with [`History::snapshot`].
    pub fn find(&mut self, transformation: &[u32]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, stored) in self.stored.iter().enumerate() {
            if !stored.snapshot.generalizes_into(transformation) {
                continue;
            }
            match best {
                Some(b) if self.stored[b].snapshot.num_classes() <= stored.snapshot.num_classes() => {}
                _ => best = Some(i),
            }
        }
        if let Some(i) = best {
            self.tick += 1;
            self.stored[i].last_used = self.tick;
        }
        best
    }

    /// Borrows a stored snapshot by index from [`History::find`].
    pub fn snapshot(&self, index: usize) -> &Snapshot {
        &self.stored[index].snapshot
    }

    /// Resolves interned distribution arrays of a stored snapshot.
    pub fn arrays(
        &self,
        handles: crate::snapshot::DistributionHandles,
    ) -> (&[i32], &[i32]) {
        (
            self.dict_values.get(handles.values),
            self.dict_freqs.get(handles.freqs),
        )
    }

    /// Stores a snapshot of a just-checked transformation, subject to
    /// admission control. `derived_from_classes` is the class count of
    /// the ancestor snapshot the check rolled up from, if any.
    ///
    /// Returns `true` if the snapshot was admitted.
    pub fn put(
        &mut self,
        node_id: usize,
        transformation: &[u32],
        groupify: &HashGroupify,
        tags: SnapshotTags,
        derived_from_classes: Option<usize>,
    ) -> Result<bool> {
        let classes = groupify.num_classes();
        let max_by_dataset =
            (self.config.snapshot_fraction_dataset * self.dataset_rows as f64) as usize;
        if classes > max_by_dataset {
            trace!(node_id, classes, max_by_dataset, "snapshot rejected: dataset budget");
            return Ok(false);
        }
        if let Some(ancestor) = derived_from_classes {
            let max_by_snapshot =
                (self.config.snapshot_fraction_snapshot * ancestor as f64) as usize;
            if classes > max_by_snapshot {
                trace!(node_id, classes, max_by_snapshot, "snapshot rejected: snapshot budget");
                return Ok(false);
            }
        }
        if self.stored.iter().any(|s| s.snapshot.node_id == node_id) {
            return Ok(false);
        }

        while self.stored.len() >= self.config.max_entries {
            self.evict_one()?;
        }

        let snapshot = Snapshot::from_groupify(
            node_id,
            transformation,
            groupify,
            &mut self.dict_values,
            &mut self.dict_freqs,
        );
        self.tick += 1;
        self.stored.push(Stored {
            snapshot,
            tags,
            last_used: self.tick,
        });
        Ok(true)
    }

    /// Number of resident snapshots.
    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Live arrays across both interning dictionaries, for tests and
    /// memory accounting.
    pub fn interned_arrays(&self) -> usize {
        self.dict_values.len() + self.dict_freqs.len()
    }

    fn retained_by_policy(&self, tags: SnapshotTags) -> bool {
        match self.policy {
            RetentionPolicy::Anonymous => tags.anonymous,
            RetentionPolicy::KAnonymous => tags.k_anonymous,
            RetentionPolicy::Checked => true,
        }
    }

    fn evict_one(&mut self) -> Result<()> {
        // Outside-policy entries go first, oldest first; then plain LRU.
        let victim = self
            .stored
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (self.retained_by_policy(s.tags), s.last_used))
            .map(|(i, _)| i)
            .expect("evict_one on empty history");
        let stored = self.stored.swap_remove(victim);
        debug!(
            node_id = stored.snapshot.node_id,
            classes = stored.snapshot.num_classes(),
            "evicting snapshot"
        );
        stored
            .snapshot
            .release(&mut self.dict_values, &mut self.dict_freqs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groupify(keys: &[&[u32]]) -> HashGroupify {
        let mut g = HashGroupify::with_capacity(keys.len(), true);
        for (row, key) in keys.iter().enumerate() {
            g.add_row(key, row as u32, false, Some(1));
        }
        g
    }

    fn config(max_entries: usize) -> HistoryConfig {
        HistoryConfig {
            snapshot_fraction_dataset: 1.0,
            snapshot_fraction_snapshot: 1.0,
            max_entries,
        }
    }

    const TAGS: SnapshotTags = SnapshotTags {
        anonymous: false,
        k_anonymous: true,
    };

    #[test]
    fn test_find_prefers_smallest_ancestor() {
        let mut history = History::new(100, config(10), RetentionPolicy::Checked);
        let big = groupify(&[&[0, 0], &[1, 0], &[2, 0], &[3, 0]]);
        let small = groupify(&[&[4, 0], &[5, 0]]);
        history.put(0, &[0, 0], &big, TAGS, None).unwrap();
        history.put(1, &[1, 0], &small, TAGS, None).unwrap();

        let found = history.find(&[2, 1]).unwrap();
        assert_eq!(history.snapshot(found).node_id, 1);
        // Not an ancestor of an incomparable transformation.
        assert!(history.find(&[0, 1]).is_none());
        // Equal transformation is not its own ancestor.
        assert!(history.find(&[1, 0]).is_none());
    }

    #[test]
    fn test_admission_by_dataset_fraction() {
        let cfg = HistoryConfig {
            snapshot_fraction_dataset: 0.5,
            snapshot_fraction_snapshot: 1.0,
            max_entries: 10,
        };
        let mut history = History::new(4, cfg, RetentionPolicy::Checked);
        let g = groupify(&[&[0], &[1], &[2]]); // 3 classes > 0.5 * 4
        assert!(!history.put(0, &[0], &g, TAGS, None).unwrap());
        let g = groupify(&[&[0], &[1]]); // 2 classes == budget
        assert!(history.put(1, &[0], &g, TAGS, None).unwrap());
    }

    #[test]
    fn test_admission_relative_to_ancestor() {
        let cfg = HistoryConfig {
            snapshot_fraction_dataset: 1.0,
            snapshot_fraction_snapshot: 0.5,
            max_entries: 10,
        };
        let mut history = History::new(100, cfg, RetentionPolicy::Checked);
        let g = groupify(&[&[0], &[1], &[2], &[3]]);
        // Rolled up from a 4-class ancestor: must have at most 2 classes.
        assert!(!history.put(0, &[1], &g, TAGS, Some(4)).unwrap());
        let g = groupify(&[&[0], &[1]]);
        assert!(history.put(1, &[1], &g, TAGS, Some(4)).unwrap());
    }

    #[test]
    fn test_eviction_releases_interned_arrays() {
        let mut history = History::new(100, config(1), RetentionPolicy::Checked);
        let g = groupify(&[&[0], &[1]]);
        history.put(0, &[0], &g, TAGS, None).unwrap();
        let before = history.interned_arrays();
        assert!(before > 0);

        let g2 = groupify(&[&[2], &[3]]);
        history.put(1, &[1], &g2, TAGS, None).unwrap();
        assert_eq!(history.len(), 1);
        // Old snapshot's references were released; identical
        // distributions re-interned by the new one keep the count equal.
        assert_eq!(history.interned_arrays(), before);
    }

    #[test]
    fn test_policy_evicts_outsiders_first() {
        let mut history = History::new(100, config(2), RetentionPolicy::Anonymous);
        let g = groupify(&[&[0]]);
        history
            .put(
                0,
                &[0],
                &g,
                SnapshotTags {
                    anonymous: true,
                    k_anonymous: true,
                },
                None,
            )
            .unwrap();
        let g = groupify(&[&[1]]);
        history
            .put(
                1,
                &[1],
                &g,
                SnapshotTags {
                    anonymous: false,
                    k_anonymous: true,
                },
                None,
            )
            .unwrap();
        // Inserting a third entry must evict node 1 (outside policy),
        // not node 0, even though node 0 is older.
        let g = groupify(&[&[2]]);
        history
            .put(
                2,
                &[2],
                &g,
                SnapshotTags {
                    anonymous: true,
                    k_anonymous: true,
                },
                None,
            )
            .unwrap();
        let ids: Vec<usize> = (0..history.len())
            .map(|i| history.snapshot(i).node_id)
            .collect();
        assert!(ids.contains(&0));
        assert!(ids.contains(&2));
        assert!(!ids.contains(&1));
    }
}
