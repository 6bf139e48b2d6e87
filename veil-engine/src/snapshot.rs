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

//! Compacted per-class snapshot of a checked transformation
//!
//! Holds, per equivalence class, the representative raw row, the row
//! count, the research-subset count and handles into the interned-array
//! dictionaries for the packed sensitive distribution. Payload arrays
//! are shared with every other snapshot holding an identical
//! distribution; the snapshot only owns references.

use crate::groupify::HashGroupify;
use crate::intern::{ArrayDictionary, ArrayHandle};

/// Interned handles of one packed distribution.
#[derive(Debug, Clone, Copy)]
pub struct DistributionHandles {
    pub values: ArrayHandle,
    pub freqs: ArrayHandle,
}

/// One compacted equivalence class.
#[derive(Debug, Clone)]
pub struct SnapshotClass {
    pub representative: u32,
    pub count: u32,
    pub subset_count: u32,
    pub distribution: Option<DistributionHandles>,
}

/// Compacted classes of one previously checked transformation.
#[derive(Debug)]
pub struct Snapshot {
    pub node_id: usize,
    pub transformation: Vec<u32>,
    pub classes: Vec<SnapshotClass>,
}

impl Snapshot {
    /// Compacts a groupify table, interning every class distribution.
    ///
    /// Each interned probe takes one reference; [`Snapshot::release`]
    /// must drop exactly those references when the snapshot is evicted.
    pub fn from_groupify(
        node_id: usize,
        transformation: &[u32],
        groupify: &HashGroupify,
        dict_values: &mut ArrayDictionary,
        dict_freqs: &mut ArrayDictionary,
    ) -> Self {
        let classes = groupify
            .classes()
            .iter()
            .map(|entry| {
                let distribution = entry.distribution.as_ref().map(|dist| {
                    let (values, freqs) = dist.pack();
                    DistributionHandles {
                        values: dict_values.probe(&values),
                        freqs: dict_freqs.probe(&freqs),
                    }
                });
                SnapshotClass {
                    representative: entry.representative,
                    count: entry.count,
                    subset_count: entry.subset_count,
                    distribution,
                }
            })
            .collect();
        Self {
            node_id,
            transformation: transformation.to_vec(),
            classes,
        }
    }

    /// Releases all interned references held by this snapshot.
    pub fn release(
        &self,
        dict_values: &mut ArrayDictionary,
        dict_freqs: &mut ArrayDictionary,
    ) -> veil_core::Result<()> {
        for class in &self.classes {
            if let Some(handles) = class.distribution {
                dict_values.release(handles.values)?;
                dict_freqs.release(handles.freqs)?;
            }
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// True when `other` is at least as general on every attribute and
    /// strictly more general on at least one, i.e. this snapshot can be
    /// rolled up under `other`.
    pub fn generalizes_into(&self, other: &[u32]) -> bool {
        debug_assert_eq!(self.transformation.len(), other.len());
        self.transformation
            .iter()
            .zip(other.iter())
            .all(|(a, b)| a <= b)
            && self.transformation != other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groupify_with_distributions() -> HashGroupify {
        let mut g = HashGroupify::with_capacity(4, true);
        g.add_row(&[1], 0, true, Some(10));
        g.add_row(&[1], 1, false, Some(20));
        g.add_row(&[2], 2, false, Some(10));
        g
    }

    #[test]
    fn test_from_groupify_interns_distributions() {
        let g = groupify_with_distributions();
        let mut dv = ArrayDictionary::new();
        let mut df = ArrayDictionary::new();
        let snapshot = Snapshot::from_groupify(3, &[1, 0], &g, &mut dv, &mut df);

        assert_eq!(snapshot.num_classes(), 2);
        assert_eq!(snapshot.classes[0].count, 2);
        assert_eq!(snapshot.classes[0].subset_count, 1);
        let handles = snapshot.classes[0].distribution.unwrap();
        assert_eq!(dv.get(handles.values), &[10, 20]);
        assert_eq!(df.get(handles.freqs), &[1, 1]);
    }

    #[test]
    fn test_release_returns_all_references() {
        let g = groupify_with_distributions();
        let mut dv = ArrayDictionary::new();
        let mut df = ArrayDictionary::new();
        let snapshot = Snapshot::from_groupify(3, &[1, 0], &g, &mut dv, &mut df);
        assert!(dv.len() > 0);
        snapshot.release(&mut dv, &mut df).unwrap();
        assert_eq!(dv.len(), 0);
        assert_eq!(df.len(), 0);
    }

    #[test]
    fn test_generalizes_into() {
        let g = groupify_with_distributions();
        let mut dv = ArrayDictionary::new();
        let mut df = ArrayDictionary::new();
        let snapshot = Snapshot::from_groupify(0, &[1, 0], &g, &mut dv, &mut df);
        assert!(snapshot.generalizes_into(&[1, 1]));
        assert!(snapshot.generalizes_into(&[2, 0]));
        assert!(!snapshot.generalizes_into(&[1, 0])); // equal, not strict
        assert!(!snapshot.generalizes_into(&[0, 1])); // incomparable
    }
}
