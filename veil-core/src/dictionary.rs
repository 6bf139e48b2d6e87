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

//! Per-attribute value dictionary
//!
//! Interns every distinct string of an attribute (input values and all
//! generalized representations from its hierarchy) to a dense `u32` code.
//! Codes are assigned in first-seen order, so level-0 input codes are
//! stable across re-encoding of the same column.

use std::collections::HashMap;

/// Monotonic string interner assigning dense `u32` codes.
#[derive(Debug, Default, Clone)]
pub struct Dictionary {
    index: HashMap<String, u32>,
    values: Vec<String>,
    finalized: bool,
}

impl Dictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the code for `value`, interning it if missing.
    ///
    /// Panics if the dictionary has been finalized; registration after
    /// finalization is a programming error, not a data error.
    pub fn register(&mut self, value: &str) -> u32 {
        assert!(!self.finalized, "register() on finalized dictionary");
        if let Some(&code) = self.index.get(value) {
            return code;
        }
        let code = self.values.len() as u32;
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), code);
        code
    }

    /// Returns the code for `value` if it has been registered.
    pub fn probe(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Resolves a code back to its string.
    pub fn resolve(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    /// Freezes the dictionary; further `register` calls panic.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Number of distinct registered values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values are registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut dict = Dictionary::new();
        let a = dict.register("alpha");
        let b = dict.register("beta");
        let a2 = dict.register("alpha");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_resolve_round_trip() {
        let mut dict = Dictionary::new();
        let code = dict.register("42-50");
        assert_eq!(dict.resolve(code), Some("42-50"));
        assert_eq!(dict.resolve(99), None);
        assert_eq!(dict.probe("42-50"), Some(code));
        assert_eq!(dict.probe("51-60"), None);
    }

    #[test]
    #[should_panic(expected = "finalized")]
    fn test_register_after_finalize_panics() {
        let mut dict = Dictionary::new();
        dict.register("a");
        dict.finalize();
        dict.register("b");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_register_resolve_round_trip(
                values in prop::collection::vec("[a-z0-9*]{1,8}", 1..50)
            ) {
                let mut dict = Dictionary::new();
                let codes: Vec<u32> = values.iter().map(|v| dict.register(v)).collect();
                for (value, &code) in values.iter().zip(codes.iter()) {
                    prop_assert_eq!(dict.resolve(code), Some(value.as_str()));
                    prop_assert_eq!(dict.probe(value), Some(code));
                }
                // Codes are dense: one per distinct value.
                let distinct: std::collections::HashSet<&String> = values.iter().collect();
                prop_assert_eq!(dict.len(), distinct.len());
            }
        }
    }
}
