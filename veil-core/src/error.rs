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

//! Error types for the anonymization engine
//!
//! Configuration errors are fatal and reported before the search starts;
//! they indicate a malformed request, not a runtime failure, and are
//! never retried inside the engine.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, VeilError>;

/// Errors that can occur while configuring or running an anonymization
#[derive(Debug, Error)]
pub enum VeilError {
    // Configuration errors
    #[error("Quasi-identifying attribute '{0}' has no generalization hierarchy")]
    MissingHierarchy(String),

    #[error("Invalid hierarchy for attribute '{attribute}': {reason}")]
    InvalidHierarchy { attribute: String, reason: String },

    #[error("Criterion '{criterion}' requires a sensitive attribute, but none is defined")]
    MissingSensitiveAttribute { criterion: &'static str },

    #[error("Criterion '{criterion}' requires parameter '{parameter}' to be set")]
    ParameterNotSet {
        criterion: &'static str,
        parameter: &'static str,
    },

    #[error("d-presence requires a research subset, but none was provided")]
    MissingResearchSubset,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Lattice errors
    #[error("Lattice has {0} bottom nodes, expected exactly one")]
    InvalidBottomNode(usize),

    #[error("Lattice size {size} exceeds the configured maximum of {max}")]
    LatticeTooLarge { size: u128, max: u64 },

    // Data errors
    #[error("Value '{value}' of attribute '{attribute}' is not covered by its hierarchy")]
    ValueNotCovered { attribute: String, value: String },

    #[error("Row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        actual: usize,
        expected: usize,
    },

    #[error("Research subset row {0} is out of bounds for a dataset of {1} rows")]
    SubsetRowOutOfBounds(usize, usize),

    // Runtime invariant violations
    #[error("Numeric instability while computing {context} for transformation {transformation:?}")]
    NumericInstability {
        context: &'static str,
        transformation: Vec<u32>,
    },

    #[error("Reference count underflow in interned array dictionary")]
    RefCountUnderflow,

    // Cooperative cancellation
    #[error("Anonymization was cancelled after {checked} checks")]
    Cancelled { checked: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = VeilError::MissingHierarchy("age".into());
        assert!(err.to_string().contains("age"));

        let err = VeilError::LatticeTooLarge {
            size: 10_000_000,
            max: 1_000_000,
        };
        assert!(err.to_string().contains("10000000"));

        let err = VeilError::NumericInstability {
            context: "entropy l-diversity",
            transformation: vec![1, 0, 2],
        };
        assert!(err.to_string().contains("entropy l-diversity"));
    }
}
