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

//! Reference-counted interned-array dictionary
//!
//! Deduplicates identical `i32` arrays (packed class distributions)
//! across snapshots. `probe` returns a handle to an existing entry and
//! bumps its reference count, or interns a fresh copy. `release` frees
//! the backing storage when the count reaches zero; releasing below
//! zero is an invariant violation surfaced as a hard error, never
//! ignored.
//!
//! Content hashing uses xxHash64; a handle is a dense slot index, so
//! resolving is a single vector access.

use std::collections::HashMap;
use std::hash::Hasher;

use smallvec::SmallVec;
use twox_hash::XxHash64;
use veil_core::{Result, VeilError};

/// Opaque handle to an interned array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle(u32);

#[derive(Debug)]
struct Entry {
    data: Vec<i32>,
    hash: u64,
    refs: u32,
}

/// Interning table with reference counting.
#[derive(Debug, Default)]
pub struct ArrayDictionary {
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
    /// Content hash -> slots holding arrays with that hash.
    index: HashMap<u64, SmallVec<[u32; 2]>>,
    live: usize,
}

fn content_hash(data: &[i32]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    for &v in data {
        hasher.write_i32(v);
    }
    hasher.finish()
}

impl ArrayDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `data`, returning its handle with the reference count
    /// incremented. An array equal to an already-interned one shares
    /// that entry's storage.
    pub fn probe(&mut self, data: &[i32]) -> ArrayHandle {
        let hash = content_hash(data);
        if let Some(slots) = self.index.get(&hash) {
            for &slot in slots {
                let entry = self.entries[slot as usize]
                    .as_mut()
                    .expect("indexed slot must be live");
                if entry.data == data {
                    entry.refs += 1;
                    return ArrayHandle(slot);
                }
            }
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.entries.push(None);
                (self.entries.len() - 1) as u32
            }
        };
        self.entries[slot as usize] = Some(Entry {
            data: data.to_vec(),
            hash,
            refs: 1,
        });
        self.index.entry(hash).or_default().push(slot);
        self.live += 1;
        ArrayHandle(slot)
    }

    /// Resolves a handle to its array.
    pub fn get(&self, handle: ArrayHandle) -> &[i32] {
        self.entries[handle.0 as usize]
            .as_ref()
            .expect("dangling array handle")
            .data
            .as_slice()
    }

    /// Increments the reference count of an existing entry.
    pub fn retain(&mut self, handle: ArrayHandle) {
        self.entries[handle.0 as usize]
            .as_mut()
            .expect("dangling array handle")
            .refs += 1;
    }

    /// Decrements the reference count, freeing the entry at zero.
    pub fn release(&mut self, handle: ArrayHandle) -> Result<()> {
        let slot = handle.0 as usize;
        let entry = self.entries[slot]
            .as_mut()
            .ok_or(VeilError::RefCountUnderflow)?;
        debug_assert!(entry.refs > 0, "release on zero refcount");
        if entry.refs == 0 {
            return Err(VeilError::RefCountUnderflow);
        }
        entry.refs -= 1;
        if entry.refs == 0 {
            let hash = entry.hash;
            self.entries[slot] = None;
            self.free.push(handle.0);
            self.live -= 1;
            if let Some(slots) = self.index.get_mut(&hash) {
                slots.retain(|s| *s != handle.0);
                if slots.is_empty() {
                    self.index.remove(&hash);
                }
            }
        }
        Ok(())
    }

    /// Current reference count of a handle, 0 once freed.
    pub fn ref_count(&self, handle: ArrayHandle) -> u32 {
        self.entries[handle.0 as usize]
            .as_ref()
            .map(|e| e.refs)
            .unwrap_or(0)
    }

    /// Number of live interned arrays.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_shares_identical_arrays() {
        let mut dict = ArrayDictionary::new();
        let a = dict.probe(&[1, 2, 3]);
        let b = dict.probe(&[1, 2, 3]);
        assert_eq!(a, b);
        assert_eq!(dict.ref_count(a), 2);
        assert_eq!(dict.len(), 1);

        let c = dict.probe(&[1, 2, 4]);
        assert_ne!(a, c);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_release_frees_at_zero() {
        let mut dict = ArrayDictionary::new();
        let a = dict.probe(&[9, 9]);
        let b = dict.probe(&[9, 9]);
        assert_eq!(a, b);
        dict.release(a).unwrap();
        assert_eq!(dict.ref_count(a), 1);
        dict.release(b).unwrap();
        assert_eq!(dict.ref_count(a), 0);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn test_underflow_is_an_error() {
        let mut dict = ArrayDictionary::new();
        let a = dict.probe(&[1]);
        dict.release(a).unwrap();
        assert!(matches!(
            dict.release(a),
            Err(VeilError::RefCountUnderflow)
        ));
    }

    #[test]
    fn test_slot_reuse_after_free() {
        let mut dict = ArrayDictionary::new();
        let a = dict.probe(&[1, 2]);
        dict.release(a).unwrap();
        // Freed slot is recycled; content decides identity, not slot history.
        let b = dict.probe(&[3, 4]);
        assert_eq!(dict.get(b), &[3, 4]);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_retain_balances_release() {
        let mut dict = ArrayDictionary::new();
        let a = dict.probe(&[5]);
        dict.retain(a);
        dict.release(a).unwrap();
        assert_eq!(dict.ref_count(a), 1);
        assert_eq!(dict.get(a), &[5]);
    }
}
