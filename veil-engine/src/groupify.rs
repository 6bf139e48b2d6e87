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

//! Equivalence-class grouping table
//!
//! Open-addressing hash table keyed by the generalized quasi-identifier
//! tuple. Capacity is a power of two, rehash at 0.75 load. Entries keep
//! insertion order in a dense vector, so iteration over classes is
//! deterministic and cache-friendly.
//!
//! Two insertion paths feed the table: `add_row` during a full dataset
//! scan, and `add_class` when rolling an ancestor snapshot up under a
//! coarser transformation (classes whose keys collapse are merged,
//! including their distributions).

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::distribution::Distribution;

const EMPTY_SLOT: u32 = u32::MAX;
const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

/// One equivalence class under the current transformation.
#[derive(Debug)]
pub struct ClassEntry {
    hash: u64,
    /// Generalized quasi-identifier tuple.
    pub key: Box<[u32]>,
    /// Raw row index of the first row seen for this class.
    pub representative: u32,
    /// Total rows in the class.
    pub count: u32,
    /// Rows of the research subset in the class.
    pub subset_count: u32,
    /// Sensitive-value distribution, when a criterion needs one.
    pub distribution: Option<Distribution>,
}

/// Hash table grouping rows into equivalence classes.
#[derive(Debug)]
pub struct HashGroupify {
    slots: Vec<u32>,
    mask: usize,
    threshold: usize,
    entries: Vec<ClassEntry>,
    total_rows: u64,
    track_distributions: bool,
}

impl HashGroupify {
    /// Creates a table sized for roughly `expected` classes.
    pub fn with_capacity(expected: usize, track_distributions: bool) -> Self {
        let capacity = (expected.max(4) * LOAD_DEN / LOAD_NUM).next_power_of_two();
        Self {
            slots: vec![EMPTY_SLOT; capacity],
            mask: capacity - 1,
            threshold: capacity * LOAD_NUM / LOAD_DEN,
            entries: Vec::with_capacity(expected),
            total_rows: 0,
            track_distributions,
        }
    }

    /// Content hash of a generalized tuple.
    pub fn hash_key(key: &[u32]) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for &v in key {
            hasher.write_u32(v);
        }
        hasher.finish()
    }

    /// Adds one raw row to its class.
    pub fn add_row(&mut self, key: &[u32], row: u32, in_subset: bool, sensitive: Option<u32>) {
        let hash = Self::hash_key(key);
        let index = self.find_or_insert(hash, key, row);
        let entry = &mut self.entries[index];
        entry.count += 1;
        entry.subset_count += in_subset as u32;
        self.total_rows += 1;
        if self.track_distributions {
            if let Some(value) = sensitive {
                entry
                    .distribution
                    .get_or_insert_with(Distribution::new)
                    .add(value, 1);
            }
        }
    }

    /// Adds a whole ancestor class (snapshot roll-up path). Classes
    /// whose generalized keys collapse under the coarser transformation
    /// merge here, adding counts and distributions bucket-wise.
    pub fn add_class(
        &mut self,
        key: &[u32],
        representative: u32,
        count: u32,
        subset_count: u32,
        distribution: Option<(&[i32], &[i32])>,
    ) {
        let hash = Self::hash_key(key);
        let index = self.find_or_insert(hash, key, representative);
        let entry = &mut self.entries[index];
        entry.count += count;
        entry.subset_count += subset_count;
        self.total_rows += count as u64;
        if self.track_distributions {
            if let Some((values, counts)) = distribution {
                let dist = entry.distribution.get_or_insert_with(Distribution::new);
                for (&v, &c) in values.iter().zip(counts.iter()) {
                    dist.add(v as u32, c as u32);
                }
            }
        }
    }

    /// Index of the class a generalized tuple belongs to, if present.
    pub fn find(&self, key: &[u32]) -> Option<usize> {
        let hash = Self::hash_key(key);
        let mut slot = hash as usize & self.mask;
        loop {
            match self.slots[slot] {
                EMPTY_SLOT => return None,
                index => {
                    let entry = &self.entries[index as usize];
                    if entry.hash == hash && *entry.key == *key {
                        return Some(index as usize);
                    }
                }
            }
            slot = (slot + 1) & self.mask;
        }
    }

    /// All classes in insertion order.
    pub fn classes(&self) -> &[ClassEntry] {
        &self.entries
    }

    pub fn num_classes(&self) -> usize {
        self.entries.len()
    }

    /// Total rows represented across all classes.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Smallest class size; 0 for an empty table.
    pub fn min_class_size(&self) -> u32 {
        self.entries.iter().map(|e| e.count).min().unwrap_or(0)
    }

    fn find_or_insert(&mut self, hash: u64, key: &[u32], representative: u32) -> usize {
        if self.entries.len() >= self.threshold {
            self.grow();
        }
        let mut slot = hash as usize & self.mask;
        loop {
            match self.slots[slot] {
                EMPTY_SLOT => {
                    let index = self.entries.len();
                    self.entries.push(ClassEntry {
                        hash,
                        key: key.into(),
                        representative,
                        count: 0,
                        subset_count: 0,
                        distribution: None,
                    });
                    self.slots[slot] = index as u32;
                    return index;
                }
                index => {
                    let entry = &self.entries[index as usize];
                    if entry.hash == hash && *entry.key == *key {
                        return index as usize;
                    }
                }
            }
            slot = (slot + 1) & self.mask;
        }
    }

    fn grow(&mut self) {
        let capacity = self.slots.len() * 2;
        self.slots = vec![EMPTY_SLOT; capacity];
        self.mask = capacity - 1;
        self.threshold = capacity * LOAD_NUM / LOAD_DEN;
        for (index, entry) in self.entries.iter().enumerate() {
            let mut slot = entry.hash as usize & self.mask;
            while self.slots[slot] != EMPTY_SLOT {
                slot = (slot + 1) & self.mask;
            }
            self.slots[slot] = index as u32;
        }
    }
}
