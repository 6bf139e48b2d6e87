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

//! Veil Core
//!
//! Fundamental data structures for the Veil anonymization engine:
//! value dictionaries, the encoded data matrix, generalization
//! hierarchies, attribute roles, privacy criteria and run configuration.
//!
//! Everything downstream of the encoding step operates on dense `u32`
//! codes. Strings exist only at the boundary (input encoding and output
//! materialization).

pub mod attribute;
pub mod config;
pub mod criteria;
pub mod data;
pub mod dictionary;
pub mod error;
pub mod hierarchy;
pub mod metric;

pub use attribute::{Attribute, AttributeRole};
pub use config::{AnonymizationConfig, HistoryConfig, DEFAULT_MAX_LATTICE_SIZE};
pub use criteria::{LDiversityVariant, PrivacyCriterion, TClosenessVariant};
pub use data::{Dataset, DatasetBuilder, DataMatrix};
pub use dictionary::Dictionary;
pub use error::{Result, VeilError};
pub use hierarchy::Hierarchy;
pub use metric::Metric;
