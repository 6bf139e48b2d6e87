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

//! Veil Engine
//!
//! The per-transformation machinery of the search: equivalence-class
//! grouping, sensitive-value distributions, reference-counted array
//! interning, compressed row masks, the snapshot history cache and the
//! node checker that ties them together.
//!
//! One [`Checker`] serves one run. It owns the [`History`] cache, so a
//! check can roll up from the nearest cached ancestor snapshot instead
//! of rescanning the raw dataset.

pub mod bitset;
pub mod checker;
pub mod distribution;
pub mod groupify;
pub mod history;
pub mod intern;
pub mod metrics;
pub mod snapshot;

pub use bitset::CompressedBitSet;
pub use checker::{Checker, CheckerStats, NodeCheck, RowClassification};
pub use distribution::Distribution;
pub use groupify::{ClassEntry, HashGroupify};
pub use history::{History, RetentionPolicy, SnapshotTags};
pub use intern::{ArrayDictionary, ArrayHandle};
pub use metrics::MetricEvaluator;
pub use snapshot::{DistributionHandles, Snapshot, SnapshotClass};
