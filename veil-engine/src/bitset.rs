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

//! Compressed bit set for sparse row masks
//!
//! Storage is split into fixed-size chunks that are allocated on the
//! first `set` within the chunk; `get` on an unallocated chunk answers
//! `false` without allocating. Intended for low-density masks over row
//! indices (research subsets, suppressed-row flags), where a flat
//! one-bit-per-row array would mostly hold zeros.

/// Bits per lazily allocated chunk.
const CHUNK_BITS: usize = 4096;
const CHUNK_WORDS: usize = CHUNK_BITS / 64;

/// Sparse, chunked bit set over a fixed index range `[0, len)`.
#[derive(Debug, Clone)]
pub struct CompressedBitSet {
    len: usize,
    chunks: Vec<Option<Box<[u64; CHUNK_WORDS]>>>,
}

impl CompressedBitSet {
    /// Creates an empty bit set covering `len` indices.
    pub fn new(len: usize) -> Self {
        let num_chunks = len.div_ceil(CHUNK_BITS);
        Self {
            len,
            chunks: vec![None; num_chunks],
        }
    }

    /// Creates a bit set with the given indices set.
    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        let mut set = Self::new(len);
        for &i in indices {
            set.set(i);
        }
        set
    }

    /// Index range covered by this set.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets bit `index`, allocating its chunk if needed.
    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        let chunk = self.chunks[index / CHUNK_BITS]
            .get_or_insert_with(|| Box::new([0u64; CHUNK_WORDS]));
        let bit = index % CHUNK_BITS;
        chunk[bit / 64] |= 1u64 << (bit % 64);
    }

    /// Clears bit `index`; a miss on an unallocated chunk is a no-op.
    pub fn clear(&mut self, index: usize) {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        if let Some(chunk) = &mut self.chunks[index / CHUNK_BITS] {
            let bit = index % CHUNK_BITS;
            chunk[bit / 64] &= !(1u64 << (bit % 64));
        }
    }

    /// Reads bit `index` without allocating.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        match &self.chunks[index / CHUNK_BITS] {
            Some(chunk) => {
                let bit = index % CHUNK_BITS;
                chunk[bit / 64] >> (bit % 64) & 1 == 1
            }
            None => false,
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.chunks
            .iter()
            .flatten()
            .map(|chunk| chunk.iter().map(|w| w.count_ones() as usize).sum::<usize>())
            .sum()
    }

    /// Number of chunks currently backed by storage.
    pub fn allocated_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_then_get() {
        let n = 10_000;
        let mut bits = CompressedBitSet::new(n);
        for i in (0..n).step_by(7) {
            bits.set(i);
        }
        for i in 0..n {
            assert_eq!(bits.get(i), i % 7 == 0, "bit {}", i);
        }
        assert_eq!(bits.count_ones(), n.div_ceil(7));
    }

    #[test]
    fn test_get_does_not_allocate() {
        let bits = CompressedBitSet::new(1_000_000);
        assert!(!bits.get(999_999));
        assert_eq!(bits.allocated_chunks(), 0);
    }

    #[test]
    fn test_sparse_allocation() {
        let mut bits = CompressedBitSet::new(CHUNK_BITS * 100);
        bits.set(0);
        bits.set(CHUNK_BITS * 99);
        assert_eq!(bits.allocated_chunks(), 2);
    }

    #[test]
    fn test_clear() {
        let mut bits = CompressedBitSet::new(100);
        bits.set(42);
        assert!(bits.get(42));
        bits.clear(42);
        assert!(!bits.get(42));
        // Clearing in an unallocated chunk must not allocate.
        let mut bits = CompressedBitSet::new(CHUNK_BITS * 2);
        bits.clear(CHUNK_BITS + 1);
        assert_eq!(bits.allocated_chunks(), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics() {
        let bits = CompressedBitSet::new(10);
        bits.get(10);
    }

    proptest! {
        #[test]
        fn prop_matches_reference_impl(
            indices in prop::collection::vec(0usize..20_000, 0..200)
        ) {
            let mut bits = CompressedBitSet::new(20_000);
            let mut reference = vec![false; 20_000];
            for &i in &indices {
                bits.set(i);
                reference[i] = true;
            }
            prop_assert_eq!(
                bits.count_ones(),
                reference.iter().filter(|&&b| b).count()
            );
            for (i, &expected) in reference.iter().enumerate() {
                prop_assert_eq!(bits.get(i), expected);
            }
        }
    }
}
