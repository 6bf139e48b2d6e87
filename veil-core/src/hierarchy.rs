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

//! Generalization hierarchy for one quasi-identifying attribute
//!
//! A flat `values × height` table mapping an input code to its code at
//! every generalization level. Level 0 is the identity encoding; the
//! last level is typically a single suppressed representation (`*`).
//!
//! The table is stored row-major and indexed directly by input code, so
//! `generalize` is a single bounds-checked array read on the hot path.

use std::collections::HashSet;

use crate::error::{Result, VeilError};

/// Generalization table for one attribute.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    /// Row-major table: `table[code * height + level]`
    table: Vec<u32>,
    /// Number of generalization levels including level 0
    height: usize,
    /// Number of distinct input codes (rows)
    num_values: usize,
    /// Distinct output codes per level, precomputed at build
    distinct: Vec<usize>,
}

impl Hierarchy {
    /// Builds a hierarchy from one row of codes per distinct input value.
    ///
    /// `rows[i][0]` must equal the input code of the row, every row must
    /// have the same length, and the rows together must cover the input
    /// codes `0..rows.len()` exactly once.
    pub fn from_rows(attribute: &str, rows: &[Vec<u32>]) -> Result<Self> {
        let invalid = |reason: String| VeilError::InvalidHierarchy {
            attribute: attribute.to_string(),
            reason,
        };

        if rows.is_empty() {
            return Err(invalid("hierarchy has no rows".into()));
        }
        let height = rows[0].len();
        if height == 0 {
            return Err(invalid("hierarchy rows are empty".into()));
        }

        let num_values = rows.len();
        let mut table = vec![0u32; num_values * height];
        let mut seen = vec![false; num_values];

        for row in rows {
            if row.len() != height {
                return Err(invalid(format!(
                    "row for code {} has {} levels, expected {}",
                    row[0],
                    row.len(),
                    height
                )));
            }
            let code = row[0] as usize;
            if code >= num_values {
                return Err(invalid(format!(
                    "input code {} out of range for {} rows",
                    code, num_values
                )));
            }
            if seen[code] {
                return Err(invalid(format!("duplicate row for input code {}", code)));
            }
            seen[code] = true;
            table[code * height..code * height + height].copy_from_slice(row);
        }

        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(invalid(format!("no row for input code {}", missing)));
        }

        let mut distinct = Vec::with_capacity(height);
        for level in 0..height {
            let mut codes = HashSet::new();
            for value in 0..num_values {
                codes.insert(table[value * height + level]);
            }
            distinct.push(codes.len());
        }

        Ok(Self {
            table,
            height,
            num_values,
            distinct,
        })
    }

    /// Maps an input code to its code at `level`.
    #[inline]
    pub fn generalize(&self, code: u32, level: usize) -> u32 {
        self.table[code as usize * self.height + level]
    }

    /// Number of generalization levels including level 0.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Maximum generalization level (`height - 1`).
    #[inline]
    pub fn max_level(&self) -> u32 {
        (self.height - 1) as u32
    }

    /// Number of distinct input codes covered.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Number of distinct output codes at `level`.
    ///
    /// Strictly non-increasing in `level` for a well-formed hierarchy;
    /// used by the traversal strategy as a distinctness signal.
    pub fn distinct_values(&self, level: usize) -> usize {
        self.distinct[level]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age_rows() -> Vec<Vec<u32>> {
        // 0..4 input codes, generalized to two buckets, then one
        vec![
            vec![0, 4, 6],
            vec![1, 4, 6],
            vec![2, 5, 6],
            vec![3, 5, 6],
        ]
    }

    #[test]
    fn test_generalize_levels() {
        let h = Hierarchy::from_rows("age", &age_rows()).unwrap();
        assert_eq!(h.height(), 3);
        assert_eq!(h.generalize(0, 0), 0);
        assert_eq!(h.generalize(0, 1), 4);
        assert_eq!(h.generalize(3, 1), 5);
        assert_eq!(h.generalize(3, 2), 6);
    }

    #[test]
    fn test_distinct_counts_decrease() {
        let h = Hierarchy::from_rows("age", &age_rows()).unwrap();
        assert_eq!(h.distinct_values(0), 4);
        assert_eq!(h.distinct_values(1), 2);
        assert_eq!(h.distinct_values(2), 1);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![0, 2], vec![1, 2, 3]];
        let err = Hierarchy::from_rows("zip", &rows).unwrap_err();
        assert!(matches!(err, VeilError::InvalidHierarchy { .. }));
    }

    #[test]
    fn test_missing_code_rejected() {
        // code 1 never appears
        let rows = vec![vec![0, 2], vec![0, 2]];
        assert!(Hierarchy::from_rows("zip", &rows).is_err());

        let rows = vec![vec![0, 2], vec![2, 2]];
        assert!(Hierarchy::from_rows("zip", &rows).is_err());
    }
}
