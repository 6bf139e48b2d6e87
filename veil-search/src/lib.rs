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

//! Veil Search
//!
//! The combinatorial layer of the anonymization engine: the
//! generalization lattice with per-node anonymity state, the FLASH
//! traversal that resolves the whole lattice with as few checks as
//! possible, loss-bound propagation, and the top-level [`Anonymizer`]
//! API.

pub mod anonymizer;
pub mod estimate;
pub mod flash;
pub mod lattice;
pub mod strategy;

pub use anonymizer::{
    AnonymizationResult, Anonymizer, CancellationToken, OptimalTransformation,
    ProcessStatistics,
};
pub use flash::{FlashAlgorithm, NoopListener, ProgressListener};
pub use lattice::{AnonymityState, Lattice, Node, NodeId};
pub use strategy::StrategyKey;
